use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Identity attached to a session. Only `id` and `email` are read here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Token pair issued by the auth service, persisted in cookies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Sessions this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the backend left it out.
    pub fn with_expiry(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Expired, or expiring within [`EXPIRY_MARGIN_SECS`].
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at - EXPIRY_MARGIN_SECS <= Utc::now().timestamp())
    }
}
