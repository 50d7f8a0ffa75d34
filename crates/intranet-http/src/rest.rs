use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use intranet_chat::{AuthSession, MessageService, ServiceError};
use intranet_types::api::{CreateMessageRequest, MessageQuery, PageBound};
use intranet_types::models::{Channel, Message, MessageType};

/// Persistence service over the REST API. Every request carries the
/// session's bearer token.
#[derive(Clone)]
pub struct RestMessageService {
    http: Client,
    base: Url,
    auth: Arc<dyn AuthSession>,
}

impl RestMessageService {
    pub fn new(http: Client, base: Url, auth: Arc<dyn AuthSession>) -> Self {
        Self {
            http,
            base: with_trailing_slash(base),
            auth,
        }
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base
            .join(path)
            .map_err(|e| ServiceError::Transport(format!("bad endpoint {path}: {e}")))
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ServiceError> {
        let token = self.auth.access_token().ok_or(ServiceError::Unauthenticated)?;
        Ok(req.bearer_auth(token))
    }

    fn messages_request(
        &self,
        channel_id: Uuid,
        before: Option<PageBound>,
        limit: usize,
    ) -> Result<RequestBuilder, ServiceError> {
        let url = self.endpoint(&format!("channels/{channel_id}/messages"))?;
        Ok(self.http.get(url).query(&MessageQuery::new(limit, before)))
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ServiceError> {
        let resp = self.authorized(req)?.send().await.map_err(transport)?;
        check(resp)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MessageService for RestMessageService {
    async fn list_channels(&self) -> Result<Vec<Channel>, ServiceError> {
        let url = self.endpoint("channels")?;
        self.fetch(self.http.get(url)).await
    }

    async fn list_messages(
        &self,
        channel_id: Uuid,
        before: Option<PageBound>,
        limit: usize,
    ) -> Result<Vec<Message>, ServiceError> {
        trace!(channel_id = %channel_id, ?before, limit, "GET messages");
        self.fetch(self.messages_request(channel_id, before, limit)?)
            .await
    }

    async fn create_message(
        &self,
        channel_id: Uuid,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, ServiceError> {
        let url = self.endpoint(&format!("channels/{channel_id}/messages"))?;
        let body = CreateMessageRequest {
            content: content.to_string(),
            message_type,
        };
        self.fetch(self.http.post(url).json(&body)).await
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Message, ServiceError> {
        let url = self.endpoint(&format!("messages/{message_id}"))?;
        self.fetch(self.http.get(url)).await
    }

    async fn mark_read(&self, channel_id: Uuid) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("channels/{channel_id}/read"))?;
        let resp = self
            .authorized(self.http.post(url))?
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        debug!(channel_id = %channel_id, "Read marker stored");
        Ok(())
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
pub(crate) fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

/// Pass successful responses through; turn the rest into a [`ServiceError`].
pub(crate) async fn check(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

pub(crate) fn status_error(status: StatusCode, body: String) -> ServiceError {
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound,
        StatusCode::UNAUTHORIZED => ServiceError::Unauthenticated,
        _ => ServiceError::Status {
            status: status.as_u16(),
            body,
        },
    }
}
