pub mod callback;
pub mod dashboard;
pub mod login;
pub mod pages;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Private cookie carrying a one-shot message for the landing page.
pub const FLASH_COOKIE: &str = "garner_flash";
pub const FLASH_SIGN_IN_FAILED: &str = "Sign-in failed. Please try again.";

fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(FLASH_COOKIE, message.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(5))
        .build()
}

fn clear_flash_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(FLASH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
