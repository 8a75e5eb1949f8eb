use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;

use crate::common::{Failure, OutgoingMessage};
use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {status}{}", detail(.message))]
    Status { status: u16, message: Option<String> },
    #[error("invalid auth cookie: {0}")]
    InvalidCookie(#[from] reqwest::header::InvalidHeaderValue),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

impl FetchError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            FetchError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<&FetchError> for Failure {
    fn from(err: &FetchError) -> Self {
        Failure::Network {
            server_message: err.server_message().map(str::to_owned),
        }
    }
}

/// REST collaborator serving the peer list and conversation history.
///
/// Responses come back as raw JSON; the client owns shape normalisation.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn fetch_peers(&self) -> Result<Value, FetchError>;
    async fn fetch_history(&self, peer_id: &str) -> Result<Value, FetchError>;
    async fn create_message(
        &self,
        peer_id: &str,
        draft: &OutgoingMessage,
    ) -> Result<Value, FetchError>;
}

/// `HistoryFetcher` over the chat server's `/messages` routes.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.auth_cookie.as_deref() {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl HistoryFetcher for HttpFetcher {
    async fn fetch_peers(&self) -> Result<Value, FetchError> {
        let response = self.client.get(self.url("messages/users")).send().await?;
        read_body(response).await
    }

    async fn fetch_history(&self, peer_id: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(self.url(&format!("messages/{peer_id}")))
            .send()
            .await?;
        read_body(response).await
    }

    async fn create_message(
        &self,
        peer_id: &str,
        draft: &OutgoingMessage,
    ) -> Result<Value, FetchError> {
        let response = self
            .client
            .post(self.url(&format!("messages/send/{peer_id}")))
            .json(draft)
            .send()
            .await?;
        read_body(response).await
    }
}

async fn read_body(response: Response) -> Result<Value, FetchError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    // Non-JSON bodies are kept as strings and normalised to empty later.
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

/// `message` field of a JSON error body, if there is one.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_server_error_message() {
        assert_eq!(
            error_message(r#"{"message":"Internal server error"}"#).as_deref(),
            Some("Internal server error")
        );
        assert_eq!(error_message(r#"{"error":"nope"}"#), None);
        assert_eq!(error_message("Bad Gateway"), None);
    }

    #[test]
    fn status_error_maps_to_network_failure() {
        let err = FetchError::Status {
            status: 401,
            message: Some("Unauthorized".into()),
        };
        assert_eq!(err.to_string(), "server answered 401: Unauthorized");
        assert_eq!(
            Failure::from(&err),
            Failure::Network {
                server_message: Some("Unauthorized".into())
            }
        );
    }

    #[test]
    fn builds_urls_without_double_slash() {
        let config = AppConfig {
            api_base_url: "http://localhost:5001/api/".into(),
            ..AppConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.url("messages/users"), "http://localhost:5001/api/messages/users");
    }

    #[test]
    fn rejects_cookie_with_control_characters() {
        let config = AppConfig {
            auth_cookie: Some("jwt=abc\n".into()),
            ..AppConfig::default()
        };
        assert!(matches!(
            HttpFetcher::new(&config),
            Err(FetchError::InvalidCookie(_))
        ));
    }
}
