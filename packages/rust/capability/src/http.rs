//! Chat-completions capability backend (OpenRouter and compatible APIs).
//!
//! Each handle sends one `POST {base_url}/chat/completions` per transform:
//! the stage context goes in the system message, the input text in the user
//! message. The request is raced against the cancellation token so an
//! aborted run stops waiting on the network immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use learnkit_shared::{CapabilityConfig, LearnkitError};

use crate::{
    Availability, CapabilityError, CapabilityHandle, CapabilityKind, CapabilityOptions,
    CapabilityRegistry,
};

/// User-Agent string for capability requests.
const USER_AGENT: &str = concat!("LearnKit/", env!("CARGO_PKG_VERSION"));

/// How much of an error body is kept in [`CapabilityError::Status`].
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolved connection settings for [`HttpCapabilityRegistry`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub endpoint: Url,
    /// `None` makes every kind report [`Availability::Unavailable`].
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_input_chars: usize,
}

impl HttpSettings {
    /// Resolve settings from config, reading the API key from the environment.
    pub fn from_config(config: &CapabilityConfig) -> learnkit_shared::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            endpoint: config.endpoint()?,
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_input_chars: config.max_input_chars,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpCapabilityRegistry {
    client: Client,
    settings: HttpSettings,
}

impl HttpCapabilityRegistry {
    pub fn new(settings: HttpSettings) -> learnkit_shared::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LearnkitError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.endpoint.as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CapabilityRegistry for HttpCapabilityRegistry {
    async fn availability(&self, kind: CapabilityKind) -> Availability {
        if self.settings.api_key.is_some() {
            Availability::Ready
        } else {
            debug!(%kind, "no API key configured");
            Availability::Unavailable
        }
    }

    async fn create(
        &self,
        kind: CapabilityKind,
        options: &CapabilityOptions,
    ) -> Result<Box<dyn CapabilityHandle>, CapabilityError> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(CapabilityError::Unavailable { kind })?;

        Ok(Box::new(HttpCapabilityHandle {
            client: self.client.clone(),
            url: self.completions_url(),
            api_key,
            model: self.settings.model.clone(),
            max_input_chars: self.settings.max_input_chars,
            options: options.clone(),
            kind,
        }))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

struct HttpCapabilityHandle {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_input_chars: usize,
    options: CapabilityOptions,
    kind: CapabilityKind,
}

impl HttpCapabilityHandle {
    async fn complete(&self, input: &str, context: &str) -> Result<String, CapabilityError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: context,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: self.options.temperature,
            max_tokens: self.options.max_output_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(CapabilityError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(CapabilityError::InputTooLarge {
                limit: None,
                actual: input.chars().count(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            if status.is_server_error() {
                return Err(CapabilityError::Transport(format!("HTTP {status}: {message}")));
            }
            return Err(CapabilityError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityError::Malformed("response has no choices".into()))
    }
}

#[async_trait]
impl CapabilityHandle for HttpCapabilityHandle {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    #[instrument(skip_all, fields(kind = %self.kind, input_chars = input.len()))]
    async fn transform(
        &mut self,
        input: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CapabilityError> {
        let actual = input.chars().count();
        if actual > self.max_input_chars {
            return Err(CapabilityError::InputTooLarge {
                limit: Some(self.max_input_chars),
                actual,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("capability request cancelled in flight");
                Err(CapabilityError::Cancelled)
            }
            result = self.complete(input, context) => result,
        }
    }

    async fn dispose(self: Box<Self>) {
        debug!(kind = %self.kind, "http capability handle disposed");
    }
}

fn map_transport(e: reqwest::Error) -> CapabilityError {
    if e.is_timeout() {
        CapabilityError::Timeout
    } else {
        CapabilityError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, api_key: Option<&str>) -> HttpSettings {
        HttpSettings {
            endpoint: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
            api_key: api_key.map(String::from),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
            max_input_chars: 1_000,
        }
    }

    async fn handle(server: &MockServer) -> Box<dyn CapabilityHandle> {
        let registry = HttpCapabilityRegistry::new(settings(server, Some("sk-test"))).unwrap();
        registry
            .create(CapabilityKind::Summarize, &CapabilityOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn availability_depends_on_api_key() {
        let server = MockServer::start().await;
        let without = HttpCapabilityRegistry::new(settings(&server, None)).unwrap();
        assert_eq!(
            without.availability(CapabilityKind::Rewrite).await,
            Availability::Unavailable
        );
        assert!(matches!(
            without
                .create(CapabilityKind::Rewrite, &CapabilityOptions::default())
                .await,
            Err(CapabilityError::Unavailable { .. })
        ));

        let with = HttpCapabilityRegistry::new(settings(&server, Some("sk-test"))).unwrap();
        assert_eq!(
            with.availability(CapabilityKind::Rewrite).await,
            Availability::Ready
        );
    }

    #[tokio::test]
    async fn transform_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "- point one\n- point two"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let out = h
            .transform("some text", "summarize this", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "- point one\n- point two");
        h.dispose().await;
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let err = h
            .transform("text", "ctx", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CapabilityError::RateLimited {
                retry_after_secs: Some(30)
            }
        );
    }

    #[tokio::test]
    async fn status_codes_map_to_failure_nature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(413))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let cancel = CancellationToken::new();
        assert!(matches!(
            h.transform("t", "c", &cancel).await,
            Err(CapabilityError::InputTooLarge { limit: None, .. })
        ));
        assert!(matches!(
            h.transform("t", "c", &cancel).await,
            Err(CapabilityError::Transport(msg)) if msg.contains("overloaded")
        ));
        assert!(matches!(
            h.transform("t", "c", &cancel).await,
            Err(CapabilityError::Status { code: 400, .. })
        ));
    }

    #[tokio::test]
    async fn oversized_input_is_rejected_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let err = h
            .transform(&"x".repeat(1_001), "ctx", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CapabilityError::InputTooLarge {
                limit: Some(1_000),
                actual: 1_001
            }
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = h.transform("text", "ctx", &cancel).await.unwrap_err();
        assert_eq!(err, CapabilityError::Cancelled);
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let mut h = handle(&server).await;
        let err = h
            .transform("text", "ctx", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Malformed(_)));
    }
}
