use axum::{
    extract::{RawQuery, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};
use tracing::{error, info};

use super::{FLASH_SIGN_IN_FAILED, flash_cookie};
use crate::backend::JarCookies;
use crate::middleware::RequestOrigin;
use crate::router::GarnerState;

/// First non-empty `code` parameter. Repeated or malformed parameters never
/// reject the request.
fn first_code(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| *name == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

/// GET /callback -> exchanges the code for a session, then always lands on
/// `{origin}/dashboard`. Session cookies are written only on success.
pub async fn auth_callback(
    State(state): State<GarnerState>,
    RawQuery(query): RawQuery,
    RequestOrigin(origin): RequestOrigin,
    jar: CookieJar,
    flash: PrivateCookieJar,
) -> impl IntoResponse {
    let target = format!("{origin}/dashboard");
    let mut cookies = JarCookies::new(jar);
    let mut flash = flash;

    if let Some(code) = first_code(query.as_deref()) {
        match state
            .backend
            .exchange_code_for_session(&code, &mut cookies)
            .await
        {
            Ok(session) => {
                info!(user_id = %session.user.id, "exchangeCodeForSession success");
            }
            Err(e) => {
                error!(error = %e, "exchangeCodeForSession error");
                flash = flash.add(flash_cookie(FLASH_SIGN_IN_FAILED));
            }
        }
    }

    (flash, cookies.into_jar(), Redirect::temporary(&target))
}
