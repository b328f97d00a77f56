use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A row of the remote `bookmarks` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Insert payload; `id` and `created_at` are assigned by the backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// The create form as the user typed it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl BookmarkForm {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() || self.url.trim().is_empty()
    }

    /// Only absolute `http`/`https` links are stored; anything else would end
    /// up as a clickable `href`.
    pub fn has_web_url(&self) -> bool {
        Url::parse(self.url.trim())
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
    }

    /// Trimmed insert payload for `user_id`.
    pub fn to_new_bookmark(&self, user_id: &str) -> NewBookmark {
        NewBookmark {
            title: self.title.trim().to_string(),
            url: self.url.trim().to_string(),
            user_id: user_id.to_string(),
        }
    }
}
