use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::backend::{CookieStore, JarCookies};
use crate::error::GarnerError;
use crate::router::GarnerState;
use crate::types::Session;

/// Session read from the request cookies, refreshed when expired.
///
/// Handlers must return `cookies` with their response so refreshed or
/// cleared session cookies reach the browser.
pub struct SessionContext {
    pub session: Option<Session>,
    pub cookies: JarCookies,
}

impl SessionContext {
    pub fn user_id(&self) -> Result<&str, GarnerError> {
        self.session
            .as_ref()
            .map(|s| s.user.id.as_str())
            .ok_or(GarnerError::MissingSession)
    }

    /// Remove every session cookie from the response.
    pub fn clear(&mut self, state: &GarnerState) {
        let writes = state
            .backend
            .session_cookies()
            .clear(&self.cookies.read());
        self.cookies.write(writes);
        self.session = None;
    }
}

impl FromRequestParts<GarnerState> for SessionContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GarnerState,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = SessionContext {
            session: None,
            cookies: JarCookies::new(CookieJar::from_headers(&parts.headers)),
        };
        let codec = state.backend.session_cookies();

        let session = match codec.decode(&ctx.cookies.read()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding unreadable session cookie");
                ctx.clear(state);
                return Ok(ctx);
            }
        };

        ctx.session = match session {
            Some(expired) if expired.is_expired() => {
                match state.backend.refresh_session(&expired.refresh_token).await {
                    Ok(fresh) => match codec.encode(&fresh, &ctx.cookies.read()) {
                        Ok(writes) => {
                            ctx.cookies.write(writes);
                            debug!(user_id = %fresh.user.id, "expired session refreshed");
                            Some(fresh)
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to encode refreshed session");
                            None
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "session refresh failed; signing out");
                        ctx.clear(state);
                        None
                    }
                }
            }
            other => other,
        };
        Ok(ctx)
    }
}
