use reqwest::header::HeaderValue;
use tracing::debug;

use super::{BackendClient, check_status};
use crate::config::BOOKMARKS_TABLE;
use crate::error::GarnerError;
use crate::types::{Bookmark, NewBookmark, Session};

const PREFER_MINIMAL: HeaderValue = HeaderValue::from_static("return=minimal");

impl BackendClient {
    /// All bookmarks visible to `session`, newest first.
    pub async fn list_bookmarks(&self, session: &Session) -> Result<Vec<Bookmark>, GarnerError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");

        let resp = self
            .http()
            .get(url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let rows = check_status(resp).await?.json::<Vec<Bookmark>>().await?;
        debug!(count = rows.len(), "fetched bookmarks");
        Ok(rows)
    }

    pub async fn insert_bookmark(
        &self,
        session: &Session,
        bookmark: &NewBookmark,
    ) -> Result<(), GarnerError> {
        let resp = self
            .http()
            .post(self.table_url()?)
            .bearer_auth(&session.access_token)
            .header("Prefer", PREFER_MINIMAL)
            .json(&[bookmark])
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    pub async fn delete_bookmark(&self, session: &Session, id: &str) -> Result<(), GarnerError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let resp = self
            .http()
            .delete(url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    fn table_url(&self) -> Result<url::Url, GarnerError> {
        self.endpoint(&format!("rest/v1/{BOOKMARKS_TABLE}"))
    }
}
