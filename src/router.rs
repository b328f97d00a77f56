use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::backend::{BackendClient, BroadcastHub};
use crate::config::Config;
use crate::error::GarnerError;
use crate::handlers::{callback, dashboard, login};
use crate::service::ViewRegistry;

/// Manual `POST /dashboard/sync` calls allowed per user and minute.
const SYNC_PER_MINUTE: u32 = 10;

/// Shared state for every route.
#[derive(Clone)]
pub struct GarnerState {
    pub backend: BackendClient,
    pub hub: BroadcastHub,
    pub views: ViewRegistry,
    pub oauth_provider: Arc<str>,
    pub app_url: Option<Url>,
    pub sync_limiter: Arc<DefaultKeyedRateLimiter<String>>,
    key: Key,
}

impl GarnerState {
    pub fn new(cfg: &Config) -> Result<Self, GarnerError> {
        let backend = BackendClient::new(cfg)?;
        let hub = if cfg.relay_broadcasts {
            info!("relaying broadcasts to the backend realtime endpoint");
            BroadcastHub::with_relay(backend.clone())
        } else {
            BroadcastHub::new()
        };
        Ok(Self {
            backend,
            hub,
            views: ViewRegistry::new(),
            oauth_provider: Arc::from(cfg.oauth_provider.as_str()),
            app_url: cfg.app_url.clone(),
            sync_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(SYNC_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
            ))),
            key: cfg.cookie_key(),
        })
    }
}

impl FromRef<GarnerState> for Key {
    fn from_ref(state: &GarnerState) -> Self {
        state.key.clone()
    }
}

pub fn garner_router(state: GarnerState) -> Router {
    Router::new()
        .route("/", get(login::landing))
        .route("/login", get(login::login))
        .route("/callback", get(callback::auth_callback))
        .route("/dashboard", get(dashboard::dashboard_shell))
        .route("/dashboard/live", get(dashboard::dashboard_live))
        .route("/dashboard/sync", post(dashboard::publish_sync))
        .route(
            "/dashboard/live/{view}/bookmarks",
            post(dashboard::add_bookmark),
        )
        .route(
            "/dashboard/live/{view}/bookmarks/{id}/delete",
            post(dashboard::delete_bookmark),
        )
        .route(
            "/dashboard/live/{view}/dismiss",
            post(dashboard::dismiss_banner),
        )
        .route("/dashboard/live/{view}/sign-out", post(dashboard::sign_out))
        .with_state(state)
}
