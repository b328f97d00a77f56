use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, Uri, request::Parts};
use headers::{HeaderMapExt, Host};
use std::convert::Infallible;

/// Scheme and authority the client used to reach us, e.g. `https://garner.app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(pub String);

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(origin_from(&parts.headers, &parts.uri)))
    }
}

/// Proxy headers win over `Host`, which wins over the request URI.
pub fn origin_from(headers: &HeaderMap, uri: &Uri) -> String {
    let scheme = first_forwarded(headers, "x-forwarded-proto")
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());

    let host = first_forwarded(headers, "x-forwarded-host")
        .or_else(|| headers.typed_get::<Host>().map(|h| h.to_string()))
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    format!("{scheme}://{host}")
}

fn first_forwarded(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
