use std::time::Duration;

use async_trait::async_trait;
use dt_core::config::CoachConfig;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::stream::{ChatStream, Utf8Decoder};
use crate::types::ChatRequest;
use crate::{CoachError, Result};

// ─── ChatTransport ────────────────────────────────────────────────────────

/// The language-model collaborator: one request in, a text stream out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream>;
}

// ─── HttpTransport ────────────────────────────────────────────────────────

/// POSTs the request as JSON and streams the response body as UTF-8 text.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::build(endpoint.into(), None, None)
    }

    pub fn from_config(config: &CoachConfig) -> Result<Self> {
        let timeout =
            (config.timeout_seconds > 0).then(|| Duration::from_secs(config.timeout_seconds));
        Self::build(config.endpoint.clone(), config.api_key(), timeout)
    }

    fn build(endpoint: String, api_key: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint,
            api_key,
        })
    }

    /// Replace the endpoint, e.g. from an environment override.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream> {
        tracing::info!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            "coach request"
        );
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "coach endpoint returned an error");
            return Err(CoachError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = resp.bytes_stream();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut decoder = Utf8Decoder::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(b) => {
                        let text = decoder.push(&b);
                        if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                            return; // receiver dropped
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                }
            }
            let tail = decoder.finish();
            if !tail.is_empty() {
                let _ = tx.send(Ok(tail)).await;
            }
        });

        Ok(ChatStream::from_channel(rx))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::drain;
    use dt_core::project::{ChatMessage, ProjectState};
    use mockito::Matcher;
    use tokio_util::sync::CancellationToken;

    fn request() -> ChatRequest {
        let mut state = ProjectState::new("Commute", "");
        state.push_message(ChatMessage::user("Buses are always late"));
        ChatRequest::from_state(&state)
    }

    #[tokio::test]
    async fn streams_body_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "messages": [{"role": "user", "content": "Buses are always late"}],
                "projectState": {"name": "Commute", "currentStage": "empathize"}
            })))
            .with_status(200)
            .with_body("What happens when the bus is late? 🚌")
            .create_async()
            .await;

        let transport = HttpTransport::new(format!("{}/api/chat", server.url())).unwrap();
        let stream = transport.open(&request()).await.unwrap();
        let text = drain(stream, &CancellationToken::new()).await.unwrap();
        assert_eq!(text, "What happens when the bus is late? 🚌");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let transport = HttpTransport::new(format!("{}/api/chat", server.url())).unwrap();
        let err = transport.open(&request()).await.err().unwrap();
        match err {
            CoachError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let transport = HttpTransport::build(
            format!("{}/api/chat", server.url()),
            Some("sk-test".into()),
            None,
        )
        .unwrap();
        let stream = transport.open(&request()).await.unwrap();
        assert_eq!(drain(stream, &CancellationToken::new()).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let transport = HttpTransport::new("http://127.0.0.1:9/api/chat").unwrap();
        let err = transport.open(&request()).await.err().unwrap();
        assert!(matches!(err, CoachError::Http(_)));
    }
}
