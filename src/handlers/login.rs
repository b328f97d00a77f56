use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};
use tracing::info;

use super::FLASH_COOKIE;
use super::pages::landing_page;
use crate::backend::JarCookies;
use crate::middleware::RequestOrigin;
use crate::{GarnerError, router::GarnerState};

/// GET / -> landing page; shows and consumes a pending flash message.
pub async fn landing(jar: PrivateCookieJar) -> Result<impl IntoResponse, GarnerError> {
    let flash = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned());
    let jar = match flash {
        Some(_) => jar.remove(super::clear_flash_cookie()),
        None => jar,
    };
    Ok((jar, Html(landing_page(flash.as_deref())?)))
}

/// GET /login -> redirects to the identity provider through the backend.
pub async fn login(
    State(state): State<GarnerState>,
    RequestOrigin(origin): RequestOrigin,
    jar: CookieJar,
) -> Result<impl IntoResponse, GarnerError> {
    let base = state
        .app_url
        .as_ref()
        .map(|u| u.as_str().trim_end_matches('/').to_string())
        .unwrap_or(origin);
    let redirect_to = format!("{base}/callback");

    let mut cookies = JarCookies::new(jar);
    let authorize_url =
        state
            .backend
            .sign_in_with_oauth(&state.oauth_provider, &redirect_to, &mut cookies)?;

    info!(provider = %state.oauth_provider, %redirect_to, "Dispatching OAuth redirect");
    Ok((
        cookies.into_jar(),
        Redirect::temporary(authorize_url.as_str()),
    ))
}
