use oauth2::PkceCodeChallenge;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::cookies::CookieStore;
use super::{BackendClient, check_status};
use crate::error::GarnerError;
use crate::types::{Session, User};

impl BackendClient {
    /// Build the provider authorize URL and remember the PKCE verifier in a cookie.
    pub fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
        cookies: &mut impl CookieStore,
    ) -> Result<Url, GarnerError> {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        cookies.write(vec![self.cookies.write_verifier(verifier.secret())]);

        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", challenge.as_str())
            .append_pair("code_challenge_method", "s256");
        debug!(provider, redirect_to, "built OAuth authorize URL");
        Ok(url)
    }

    /// Trade a one-time authorization code for a session.
    ///
    /// Session cookies are written to `cookies` only when the exchange succeeds.
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &mut impl CookieStore,
    ) -> Result<Session, GarnerError> {
        let verifier = cookies
            .get(&self.cookies.verifier_key())
            .filter(|v| !v.is_empty())
            .ok_or(GarnerError::MissingCodeVerifier)?;

        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");

        let resp = self
            .http()
            .post(url)
            .json(&json!({ "auth_code": code, "code_verifier": verifier }))
            .send()
            .await?;
        let session = check_status(resp).await?.json::<Session>().await?.with_expiry();

        let mut writes = self.cookies.encode(&session, &cookies.read())?;
        writes.push(self.cookies.clear_verifier());
        cookies.write(writes);

        info!(user_id = %session.user.id, "code exchanged for session");
        Ok(session)
    }

    /// Trade a refresh token for a fresh session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, GarnerError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let resp = self
            .http()
            .post(url)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let session = check_status(resp).await?.json::<Session>().await?.with_expiry();
        debug!(user_id = %session.user.id, "session refreshed");
        Ok(session)
    }

    /// Look up the user behind `session`. No session means no user.
    pub async fn get_user(&self, session: Option<&Session>) -> Result<Option<User>, GarnerError> {
        let Some(session) = session else {
            return Ok(None);
        };
        let resp = self
            .http()
            .get(self.endpoint("auth/v1/user")?)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let user = check_status(resp).await?.json::<User>().await?;
        Ok(Some(user))
    }

    /// Revoke the session on the backend. A session the backend no longer
    /// knows counts as signed out.
    pub async fn sign_out(&self, session: &Session) -> Result<(), GarnerError> {
        let resp = self
            .http()
            .post(self.endpoint("auth/v1/logout")?)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                warn!(status = %resp.status(), "sign-out on an already invalid session");
                Ok(())
            }
            _ => Err(GarnerError::from_response(resp).await),
        }
    }
}
