//! AniList API client
//!
//! Typed wrappers around the fixed documents in [`crate::queries`]. Every
//! call goes through the shared [`RequestExecutor`], so they all draw from the
//! same rate-limit budget.

use crate::error::{ProviderError, RemoteError, Result};
use crate::executor::RequestExecutor;
use crate::queries::{
    media_page_variables, user_variables, LAST_UPDATED_ENTRY_QUERY, LIST_COLLECTION_QUERY,
    MEDIA_PAGE_QUERY, VIEWER_QUERY,
};
use crate::types::{
    LastUpdatedData, LastUpdatedEntry, ListCollectionData, MediaPageData, RemoteMedia,
    ViewerData, ViewerProfile,
};
use bridge_traits::credentials::CredentialProvider;
use core_library::models::{LoginId, MediaId};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct AniListClient {
    executor: Arc<RequestExecutor>,
    credentials: Arc<dyn CredentialProvider>,
}

impl AniListClient {
    pub fn new(executor: Arc<RequestExecutor>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            executor,
            credentials,
        }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    async fn token(&self, login: LoginId) -> Result<Option<String>> {
        Ok(self.credentials.access_token(login.0).await?)
    }

    /// Profile of the user behind `login`'s token
    #[instrument(skip(self), fields(login_id = %login))]
    pub async fn fetch_viewer(&self, login: LoginId) -> Result<ViewerProfile> {
        let token = self.token(login).await?.ok_or_else(|| {
            ProviderError::Credentials(format!("No access token for login {}", login))
        })?;

        let data: ViewerData = self
            .executor
            .query(VIEWER_QUERY, &json!({}), Some(token.as_str()))
            .await?;

        data.viewer
            .ok_or_else(|| ProviderError::InvalidResponse("Viewer was null".to_string()))
    }

    /// The login's entire anime list, as delivered
    ///
    /// Validation (viewer identity, `hasNextChunk`) is left to the caller.
    #[instrument(skip(self), fields(login_id = %login))]
    pub async fn fetch_list_collection(&self, login: LoginId) -> Result<ListCollectionData> {
        let token = self.token(login).await?;
        self.executor
            .query(
                LIST_COLLECTION_QUERY,
                &user_variables(login.0),
                token.as_deref(),
            )
            .await
    }

    /// Full media nodes for `ids`, in wire order, with null nodes dropped
    ///
    /// Anonymous: catalog data is public and identical for every user.
    ///
    /// # Errors
    ///
    /// `ProviderError::InvalidResponse` if the page is missing or reports a
    /// next page.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn fetch_media_page(&self, ids: &[MediaId]) -> Result<Vec<RemoteMedia>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let data: MediaPageData = self
            .executor
            .query(MEDIA_PAGE_QUERY, &media_page_variables(&raw_ids), None)
            .await?;

        let page = data.page.ok_or_else(|| {
            ProviderError::InvalidResponse("Bulk media fetch returned no page".to_string())
        })?;

        if page
            .page_info
            .and_then(|info| info.has_next_page)
            .unwrap_or(false)
        {
            return Err(ProviderError::InvalidResponse(
                "Bulk media fetching should not paginate".to_string(),
            ));
        }

        let media = page.media.ok_or_else(|| {
            ProviderError::InvalidResponse("Expected bulk fetch to return media".to_string())
        })?;

        let media: Vec<RemoteMedia> = media.into_iter().flatten().collect();
        debug!(requested = ids.len(), returned = media.len(), "Fetched media page");
        Ok(media)
    }

    /// Most recently updated entry on the login's list, if the list has any
    #[instrument(skip(self), fields(login_id = %login))]
    pub async fn fetch_last_updated_entry(
        &self,
        login: LoginId,
    ) -> Result<Option<LastUpdatedEntry>> {
        let token = self.token(login).await?;
        let result: Result<LastUpdatedData> = self
            .executor
            .query(
                LAST_UPDATED_ENTRY_QUERY,
                &user_variables(login.0),
                token.as_deref(),
            )
            .await;

        match result {
            Ok(data) => Ok(data.media_list),
            // An empty list is reported as a 404 on the single-entry lookup.
            Err(ProviderError::Remote(RemoteError::Multi(multi)))
                if !multi.errors.is_empty()
                    && multi.errors.iter().all(|e| e.status() == Some(404)) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for AniListClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AniListClient")
            .field("executor", &self.executor)
            .finish()
    }
}
