use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vdlab_core::context::{PredictionContext, PredictionOutcome, UserInput};
use vdlab_core::conversation::Turn;
use vdlab_core::error::ChatGatewayError;
use vdlab_core::metrics::ModelMetrics;

/// Result of a credential test against the chat proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCheck {
    pub accepted: bool,
    /// Upstream rejection reason, passed through verbatim when present.
    pub reason: Option<String>,
}

/// The chat-proxy boundary. Three single-shot operations, no retries — a
/// failed call is surfaced to the conversation and the user re-issues it.
#[async_trait]
pub trait ChatGateway {
    async fn test_credential(&self, key: &str) -> Result<KeyCheck, ChatGatewayError>;

    /// One-shot explanation of the current prediction. The context plus
    /// its model metrics is the sole payload.
    async fn explain(&self, key: &str, context: &PredictionContext)
    -> Result<String, ChatGatewayError>;

    /// One conversational exchange. `history` is the full prior turn
    /// sequence, replayed in order.
    async fn exchange(
        &self,
        key: &str,
        message: &str,
        context: &PredictionContext,
        history: &[Turn],
    ) -> Result<String, ChatGatewayError>;
}

#[derive(Serialize)]
struct TestKeyRequest<'a> {
    api_key: &'a str,
}

#[derive(Deserialize)]
struct TestKeyEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ExplainRequest<'a> {
    api_key: &'a str,
    user_input: &'a UserInput,
    prediction: &'a PredictionOutcome,
    model_name: &'a str,
}

#[derive(Deserialize)]
struct ExplainEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Prediction context as the chat proxy expects it on `/chat/message`.
/// That endpoint takes camelCase context keys; `/chat/explain` does not.
#[derive(Serialize)]
struct WireContext<'a> {
    #[serde(rename = "userInput")]
    user_input: &'a UserInput,
    prediction: &'a PredictionOutcome,
    #[serde(rename = "modelMetrics")]
    model_metrics: &'a ModelMetrics,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    api_key: &'a str,
    message: &'a str,
    context: WireContext<'a>,
    conversation_history: &'a [Turn],
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn unwrap_explanation(envelope: ExplainEnvelope) -> Result<String, ChatGatewayError> {
    match (envelope.success, envelope.explanation) {
        (true, Some(explanation)) => Ok(explanation),
        _ => Err(ChatGatewayError::Upstream(
            envelope
                .error
                .unwrap_or_else(|| "failed to get explanation".to_string()),
        )),
    }
}

fn unwrap_reply(envelope: MessageEnvelope) -> Result<String, ChatGatewayError> {
    match (envelope.success, envelope.response) {
        (true, Some(response)) => Ok(response),
        _ => Err(ChatGatewayError::Upstream(
            envelope
                .error
                .unwrap_or_else(|| "failed to get response".to_string()),
        )),
    }
}

/// reqwest-backed gateway against the backend chat proxy. The credential
/// travels in request bodies to these three endpoints and nowhere else.
#[derive(Debug, Clone)]
pub struct HttpChatGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/chat/{path}", self.base_url)
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ChatGatewayError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ChatGatewayError::Transport(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ChatGatewayError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn test_credential(&self, key: &str) -> Result<KeyCheck, ChatGatewayError> {
        let envelope: TestKeyEnvelope = self
            .post_json("test-key", &TestKeyRequest { api_key: key })
            .await?;
        Ok(KeyCheck {
            accepted: envelope.success,
            reason: envelope.message,
        })
    }

    async fn explain(
        &self,
        key: &str,
        context: &PredictionContext,
    ) -> Result<String, ChatGatewayError> {
        let envelope: ExplainEnvelope = self
            .post_json(
                "explain",
                &ExplainRequest {
                    api_key: key,
                    user_input: &context.user_input,
                    prediction: &context.prediction,
                    model_name: &context.prediction.model_name,
                },
            )
            .await?;
        unwrap_explanation(envelope)
    }

    async fn exchange(
        &self,
        key: &str,
        message: &str,
        context: &PredictionContext,
        history: &[Turn],
    ) -> Result<String, ChatGatewayError> {
        let envelope: MessageEnvelope = self
            .post_json(
                "message",
                &MessageRequest {
                    api_key: key,
                    message,
                    context: WireContext {
                        user_input: &context.user_input,
                        prediction: &context.prediction,
                        model_metrics: &context.model_metrics,
                    },
                    conversation_history: history,
                },
            )
            .await?;
        unwrap_reply(envelope)
    }
}
