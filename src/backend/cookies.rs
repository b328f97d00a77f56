//! Request-scoped cookie access for the auth flow.
//!
//! Handlers never touch the cookie jar directly from backend code; they hand a
//! [`CookieStore`] to whatever needs to read or persist session state and
//! attach the resulting jar to the response.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::Duration;

use crate::error::GarnerError;
use crate::types::Session;

/// Longest value stored in a single cookie before the session is split.
pub const MAX_CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";
const SESSION_MAX_AGE_DAYS: i64 = 400;

/// Attributes applied to a written cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    pub path: String,
    /// `Some(0)` removes the cookie.
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    pub fn session(secure: bool) -> Self {
        Self {
            path: "/".to_string(),
            max_age: Some(Duration::days(SESSION_MAX_AGE_DAYS)),
            http_only: false,
            secure,
            same_site: SameSite::Lax,
        }
    }

    pub fn removal(secure: bool) -> Self {
        Self {
            max_age: Some(Duration::ZERO),
            ..Self::session(secure)
        }
    }

    pub fn is_removal(&self) -> bool {
        self.max_age == Some(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CookieWrite {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

/// Capability over the cookies of one request/response pair.
pub trait CookieStore {
    /// Every cookie the request carried, plus writes applied so far.
    fn read(&self) -> Vec<(String, String)>;
    /// Apply a batch of writes to the outgoing response.
    fn write(&mut self, batch: Vec<CookieWrite>);

    fn get(&self, name: &str) -> Option<String> {
        self.read()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// [`CookieStore`] backed by an axum-extra [`CookieJar`].
#[derive(Debug, Default)]
pub struct JarCookies {
    jar: CookieJar,
}

impl JarCookies {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl CookieStore for JarCookies {
    fn read(&self) -> Vec<(String, String)> {
        self.jar
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect()
    }

    fn write(&mut self, batch: Vec<CookieWrite>) {
        for item in batch {
            let jar = std::mem::take(&mut self.jar);
            self.jar = if item.options.is_removal() {
                jar.remove(build_cookie(item.name, String::new(), &item.options))
            } else {
                jar.add(build_cookie(item.name, item.value, &item.options))
            };
        }
    }
}

fn build_cookie(name: String, value: String, opts: &CookieOptions) -> Cookie<'static> {
    let mut builder = Cookie::build(Cookie::new(name, value))
        .path(opts.path.clone())
        .http_only(opts.http_only)
        .secure(opts.secure)
        .same_site(opts.same_site);
    if let Some(max_age) = opts.max_age
        && !max_age.is_zero()
    {
        builder = builder.max_age(max_age);
    }
    builder.build()
}

/// Encodes sessions (and the PKCE verifier) into cookies under one storage key.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    key: String,
    secure: bool,
}

impl SessionCookies {
    pub fn new(key: impl Into<String>, secure: bool) -> Self {
        Self {
            key: key.into(),
            secure,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn verifier_key(&self) -> String {
        format!("{}-code-verifier", self.key)
    }

    /// Writes persisting `session`, including removal of chunks left over
    /// from a previous, differently sized session.
    pub fn encode(
        &self,
        session: &Session,
        existing: &[(String, String)],
    ) -> Result<Vec<CookieWrite>, GarnerError> {
        let json = serde_json::to_vec(session)?;
        let value = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json));

        let mut writes: Vec<CookieWrite> = if value.len() <= MAX_CHUNK_SIZE {
            vec![self.cookie(self.key.clone(), value)]
        } else {
            chunk(&value)
                .enumerate()
                .map(|(i, part)| self.cookie(format!("{}.{i}", self.key), part.to_string()))
                .collect()
        };

        let stale: Vec<CookieWrite> = existing
            .iter()
            .filter(|(name, _)| self.is_session_cookie(name))
            .filter(|(name, _)| !writes.iter().any(|w| &w.name == name))
            .map(|(name, _)| self.removal(name.clone()))
            .collect();
        writes.extend(stale);
        Ok(writes)
    }

    /// Reassemble the session from a single cookie or its chunks.
    pub fn decode(&self, cookies: &[(String, String)]) -> Result<Option<Session>, GarnerError> {
        let lookup = |name: &str| {
            cookies
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        let raw = match lookup(&self.key) {
            Some(v) => v.to_string(),
            None => {
                let mut joined = String::new();
                for i in 0.. {
                    match lookup(&format!("{}.{i}", self.key)) {
                        Some(part) => joined.push_str(part),
                        None => break,
                    }
                }
                joined
            }
        };
        if raw.is_empty() {
            return Ok(None);
        }

        let json = match raw.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => URL_SAFE_NO_PAD.decode(encoded)?,
            None => raw.into_bytes(),
        };
        let session: Session = serde_json::from_slice(&json)
            .map_err(|e| GarnerError::InvalidSessionCookie(e.to_string()))?;
        Ok(Some(session))
    }

    /// Removal writes for every session cookie present.
    pub fn clear(&self, existing: &[(String, String)]) -> Vec<CookieWrite> {
        existing
            .iter()
            .filter(|(name, _)| self.is_session_cookie(name))
            .map(|(name, _)| self.removal(name.clone()))
            .collect()
    }

    pub fn write_verifier(&self, verifier: &str) -> CookieWrite {
        self.cookie(self.verifier_key(), verifier.to_string())
    }

    pub fn clear_verifier(&self) -> CookieWrite {
        self.removal(self.verifier_key())
    }

    fn is_session_cookie(&self, name: &str) -> bool {
        name == self.key
            || name
                .strip_prefix(self.key.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
    }

    fn cookie(&self, name: String, value: String) -> CookieWrite {
        CookieWrite {
            name,
            value,
            options: CookieOptions::session(self.secure),
        }
    }

    fn removal(&self, name: String) -> CookieWrite {
        CookieWrite {
            name,
            value: String::new(),
            options: CookieOptions::removal(self.secure),
        }
    }
}

fn chunk(value: &str) -> impl Iterator<Item = &str> {
    // base64url and the prefix are ASCII, so byte offsets are char boundaries
    value
        .as_bytes()
        .chunks(MAX_CHUNK_SIZE)
        .filter_map(|c| std::str::from_utf8(c).ok())
}
