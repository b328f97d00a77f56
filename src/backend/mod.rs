//! Client for the backend platform: auth, the bookmarks table and broadcast.
//!
//! Layout:
//! - `auth.rs`: OAuth sign-in, code exchange, user lookup, refresh, sign-out
//! - `table.rs`: select/insert/delete on the `bookmarks` table
//! - `realtime.rs`: topic-keyed broadcast hub with optional backend relay
//! - `cookies.rs`: cookie capability and session cookie encoding

pub mod auth;
pub mod cookies;
pub mod realtime;
pub mod table;

pub use cookies::{CookieStore, CookieWrite, JarCookies, SessionCookies};
pub use realtime::{BroadcastEvent, BroadcastHub, Subscription};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::Config;
use crate::error::GarnerError;

const APIKEY_HEADER: HeaderName = HeaderName::from_static("apikey");

/// Shared HTTP client bound to one backend project.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    cookies: SessionCookies,
}

impl BackendClient {
    pub fn new(cfg: &Config) -> Result<Self, GarnerError> {
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(&cfg.anon_key)
            .map_err(|e| GarnerError::Config(format!("anon_key is not a valid header: {e}")))?;
        headers.insert(APIKEY_HEADER, apikey);

        let http = reqwest::Client::builder()
            .user_agent(concat!("garner/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(cfg.connect_timeout())
            .default_headers(headers)
            .build()?;

        let mut base = cfg.backend_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self {
            http,
            base,
            anon_key: cfg.anon_key.clone(),
            cookies: SessionCookies::new(cfg.storage_key(), !cfg.insecure_cookie),
        })
    }

    pub fn session_cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Resolve `path` (no leading slash) against the backend base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, GarnerError> {
        Ok(self.base.join(path)?)
    }
}

/// Turn a non-success response into [`GarnerError::Backend`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GarnerError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(GarnerError::from_response(resp).await)
    }
}
