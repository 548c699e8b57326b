use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::traits::ConversationBackend;
use super::types::*;
use crate::config::BackendConfig;
use crate::models::{Conversation, HistoryMessage};

const USER_HEADER: &str = "X-User-ID";

/// REST client for the conversations API, bound to one principal.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    user_id: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig, user_id: impl Into<String>) -> Result<Self, BackendError> {
        if config.base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidResponse(format!(
                "Backend URL cannot be used as a base: {}",
                config.base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            user_id: user_id.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidResponse("Backend URL has no path".to_string()))?
            .pop_if_empty()
            .extend(["api", "conversations"])
            .extend(segments);
        Ok(url)
    }

    fn scoped(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_HEADER, &self.user_id)
            .header("content-type", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .scoped(request)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;
        Self::check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = Self::parse_error_detail(status, &body);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(detail),
            StatusCode::NOT_FOUND => BackendError::NotFound(detail),
            _ => BackendError::Rejected {
                status: status.as_u16(),
                detail,
            },
        })
    }

    fn parse_error_detail(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            if let Some(message) = parsed.detail.or(parsed.error) {
                return match message {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                };
            }
        }
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    }
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
        let url = self.endpoint(&[])?;
        let body: ListResponse = self.send_json(self.client.get(url)).await?;
        Ok(body.conversations)
    }

    async fn create_conversation(
        &self,
        title: Option<&str>,
    ) -> Result<Conversation, BackendError> {
        let url = self.endpoint(&[])?;
        let body: CreateResponse = self
            .send_json(self.client.post(url).json(&TitleBody { title }))
            .await?;
        Ok(body.conversation)
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&[id])?;
        self.send(self.client.put(url).json(&TitleBody { title: Some(title) }))
            .await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&[id])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn delete_conversations(&self, ids: &[String]) -> Result<u64, BackendError> {
        let url = self.endpoint(&[])?;
        let body: BatchDeleteResponse = self
            .send_json(
                self.client
                    .delete(url)
                    .json(&BatchDeleteBody { conversation_ids: ids }),
            )
            .await?;
        Ok(body.deleted_count)
    }

    async fn touch_conversation(&self, id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&[id, "touch"])?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn generate_title(
        &self,
        id: &str,
        message: &str,
    ) -> Result<GeneratedTitle, BackendError> {
        let url = self.endpoint(&[id, "generate-title"])?;
        self.send_json(self.client.post(url).json(&GenerateTitleBody { message }))
            .await
    }

    async fn history(&self, id: &str) -> Result<Vec<HistoryMessage>, BackendError> {
        let url = self.endpoint(&[id, "history"])?;
        let body: HistoryResponse = self.send_json(self.client.get(url)).await?;
        Ok(body.messages)
    }
}
