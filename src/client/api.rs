//! HTTP transport for the task API.

use super::ClientError;
use crate::tasks::Task;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Task operations as seen by the synchronization layer.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Task>, ClientError>;
    async fn create(&self, text: &str) -> Result<Task, ClientError>;
    async fn toggle(&self, id: i64) -> Result<Task, ClientError>;
    async fn delete(&self, id: i64) -> Result<(), ClientError>;
    async fn reorder(&self, ordered_ids: &[i64]) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// `reqwest`-backed client. Holds the bearer token once logged in.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::POST, "/api/register")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let response = self
            .request(Method::POST, "/api/login")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }
}

/// Turn any non-success status into `ClientError::Status`, using the
/// server's `{"error": ...}` message when there is one.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    tracing::debug!(status = status.as_u16(), %message, "API call failed");
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list(&self) -> Result<Vec<Task>, ClientError> {
        let response = self.authed(Method::GET, "/api/todos")?.send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create(&self, text: &str) -> Result<Task, ClientError> {
        let response = self
            .authed(Method::POST, "/api/todos")?
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn toggle(&self, id: i64) -> Result<Task, ClientError> {
        let response = self
            .authed(Method::PATCH, &format!("/api/todos/{id}"))?
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let response = self
            .authed(Method::DELETE, &format!("/api/todos/{id}"))?
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn reorder(&self, ordered_ids: &[i64]) -> Result<(), ClientError> {
        let response = self
            .authed(Method::PATCH, "/api/todos/reorder")?
            .json(&serde_json::json!({ "orderedIds": ordered_ids }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
