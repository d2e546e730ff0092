//! reqwest implementation of [`DraftStore`].
//!
//! Routes, relative to the configured base URL:
//! `POST /drafts`, `PATCH /drafts/{id}`, `DELETE /drafts/{id}`,
//! `GET /drafts?key=...` returning `{"drafts": [...]}`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::model::RemoteDraft;
use super::remote::{DraftAck, DraftApiError, DraftStore, DraftUpdate, NewDraft};
use crate::config::DraftsConfig;

#[derive(Deserialize)]
struct DraftList {
    #[serde(default)]
    drafts: Vec<RemoteDraft>,
}

pub struct HttpDraftStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDraftStore {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, DraftApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DraftApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `None` when no API base URL is configured.
    pub fn from_config(config: &DraftsConfig) -> Result<Option<Self>, DraftApiError> {
        config
            .api_base_url
            .as_deref()
            .map(|base| Self::new(base, config.request_timeout()))
            .transpose()
    }

    fn drafts_url(&self) -> String {
        format!("{}/drafts", self.base_url)
    }

    fn draft_url(&self, id: &str) -> String {
        format!("{}/drafts/{}", self.base_url, urlencoding::encode(id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, DraftApiError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(DraftApiError::Status {
            status: status.as_u16(),
            message: message.chars().take(500).collect(),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, DraftApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| DraftApiError::Decode(e.to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> DraftApiError {
    if e.is_timeout() {
        DraftApiError::Timeout
    } else {
        DraftApiError::Network(e.to_string())
    }
}

#[async_trait]
impl DraftStore for HttpDraftStore {
    async fn create_draft(&self, draft: &NewDraft) -> Result<DraftAck, DraftApiError> {
        self.send_json(self.client.post(self.drafts_url()).json(draft))
            .await
    }

    async fn update_draft(
        &self,
        id: &str,
        update: &DraftUpdate,
    ) -> Result<DraftAck, DraftApiError> {
        self.send_json(self.client.patch(self.draft_url(id)).json(update))
            .await
    }

    async fn delete_draft(&self, id: &str) -> Result<(), DraftApiError> {
        self.send(self.client.delete(self.draft_url(id))).await?;
        Ok(())
    }

    async fn get_drafts(&self, key: &str) -> Result<Vec<RemoteDraft>, DraftApiError> {
        let list: DraftList = self
            .send_json(self.client.get(self.drafts_url()).query(&[("key", key)]))
            .await?;
        Ok(list.drafts)
    }
}
