use axum_extra::extract::cookie::Key;
use figment::{Figment, providers::Env};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::GarnerError;

/// Broadcast topic shared by every open dashboard.
pub const SYNC_TOPIC: &str = "dashboard-sync";
/// Event name on [`SYNC_TOPIC`] that asks dashboards to reload.
pub const SYNC_EVENT: &str = "sync";
/// Remote table holding bookmark rows.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

const ENV_PREFIX: &str = "GARNER_";
const MIN_COOKIE_SECRET_LEN: usize = 64;

/// Process-wide settings, built once in `main` and handed to whoever needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the backend platform (auth, rest and realtime live below it).
    pub backend_url: Url,
    /// Public API key sent as `apikey` on every backend call.
    pub anon_key: String,
    /// Public origin override used to build the OAuth redirect target.
    #[serde(default)]
    pub app_url: Option<Url>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,
    /// Master secret for the private flash cookie; random per process when absent.
    #[serde(default)]
    pub cookie_secret: Option<String>,
    #[serde(default)]
    pub insecure_cookie: bool,
    /// Also forward published broadcasts to the backend realtime endpoint.
    /// Publish-only: signals from the backend channel are not received.
    #[serde(default)]
    pub relay_broadcasts: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_oauth_provider() -> String {
    "google".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Config with every optional key at its default.
    pub fn new(backend_url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            backend_url,
            anon_key: anon_key.into(),
            app_url: None,
            listen_addr: default_listen_addr(),
            loglevel: default_loglevel(),
            oauth_provider: default_oauth_provider(),
            cookie_secret: None,
            insecure_cookie: false,
            relay_broadcasts: false,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Load from `GARNER_*` environment variables.
    pub fn load() -> Result<Self, GarnerError> {
        Self::from_figment(Figment::new().merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, GarnerError> {
        let cfg: Config = figment
            .extract()
            .map_err(|e| GarnerError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), GarnerError> {
        if self.anon_key.trim().is_empty() {
            return Err(GarnerError::Config("anon_key must not be empty".to_string()));
        }
        if self.backend_url.host_str().is_none() {
            return Err(GarnerError::Config(format!(
                "backend_url has no host: {}",
                self.backend_url
            )));
        }
        Ok(())
    }

    /// First DNS label of the backend host, e.g. `abcd` for `abcd.supabase.co`.
    pub fn project_ref(&self) -> &str {
        self.backend_url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or("local")
    }

    /// Cookie name the session is stored under.
    pub fn storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Signing/encryption key for private cookies.
    pub fn cookie_key(&self) -> Key {
        let Some(secret) = self.cookie_secret.as_deref() else {
            return Key::generate();
        };
        match Key::try_from(secret.as_bytes()) {
            Ok(key) => key,
            Err(_) => {
                warn!(
                    min_len = MIN_COOKIE_SECRET_LEN,
                    "cookie_secret too short; using a random key for this process"
                );
                Key::generate()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn base() -> Config {
        Config::new(
            Url::parse("https://abcd.supabase.co").unwrap(),
            "anon-key",
        )
    }

    #[test]
    fn storage_key_uses_first_host_label() {
        assert_eq!(base().storage_key(), "sb-abcd-auth-token");

        let local = Config::new(Url::parse("http://localhost:54321").unwrap(), "k");
        assert_eq!(local.storage_key(), "sb-localhost-auth-token");
    }

    #[test]
    fn optional_keys_fall_back_to_defaults() {
        let figment = Figment::new()
            .merge(Serialized::default("backend_url", "https://abcd.supabase.co"))
            .merge(Serialized::default("anon_key", "anon"));
        let cfg = Config::from_figment(figment).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.oauth_provider, "google");
        assert!(cfg.app_url.is_none());
        assert!(!cfg.relay_broadcasts);
    }

    #[test]
    fn long_cookie_secret_gives_a_stable_key() {
        let mut cfg = base();
        cfg.cookie_secret = Some("s".repeat(MIN_COOKIE_SECRET_LEN));
        assert_eq!(cfg.cookie_key().master(), cfg.cookie_key().master());

        cfg.cookie_secret = Some("too-short".to_string());
        assert_ne!(cfg.cookie_key().master(), cfg.cookie_key().master());
    }

    #[test]
    fn empty_anon_key_is_rejected() {
        let figment = Figment::new()
            .merge(Serialized::default("backend_url", "https://abcd.supabase.co"))
            .merge(Serialized::default("anon_key", "  "));
        assert!(matches!(
            Config::from_figment(figment),
            Err(GarnerError::Config(_))
        ));
    }
}
