use vdlab_core::context::PredictionContext;

use crate::controller::{AssistantController, Effect, Event, Phase};
use crate::gateway::chat::ChatGateway;
use crate::store::CredentialStore;

/// Controller plus the gateway that runs its effects.
///
/// Methods take `&mut self`, so on one event loop every action runs to
/// completion before the next starts: the cooperative single-threaded model
/// — the conversation `locked` flag is the only chat-path mutual exclusion,
/// and credential validation does not share it. There is no cancellation;
/// a resolution that outlives its conversation is discarded inside the
/// controller by generation comparison.
pub struct Assistant<G: ChatGateway, S: CredentialStore> {
    controller: AssistantController<S>,
    gateway: G,
}

impl<G: ChatGateway, S: CredentialStore> Assistant<G, S> {
    pub fn new(gateway: G, store: S) -> Self {
        Self {
            controller: AssistantController::new(store),
            gateway,
        }
    }

    /// Read-only view for rendering code.
    pub fn controller(&self) -> &AssistantController<S> {
        &self.controller
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub async fn submit_credential(&mut self, key: impl Into<String>) {
        self.dispatch(Event::SubmitCredential(key.into())).await;
    }

    /// Hand the controller a freshly built prediction context. The identity
    /// comparison inside decides whether anything resets.
    pub async fn observe_prediction(&mut self, context: PredictionContext) {
        self.dispatch(Event::PredictionCompleted(context)).await;
    }

    pub async fn accept_explanation(&mut self) {
        self.dispatch(Event::AcceptExplanation).await;
    }

    pub async fn decline_explanation(&mut self) {
        self.dispatch(Event::DeclineExplanation).await;
    }

    pub async fn send(&mut self, text: impl Into<String>) {
        self.dispatch(Event::Send(text.into())).await;
    }

    pub async fn clear_conversation(&mut self) {
        self.dispatch(Event::ClearConversation).await;
    }

    pub async fn remove_credential(&mut self) {
        self.dispatch(Event::RemoveCredential).await;
    }

    pub async fn set_visible(&mut self, visible: bool) {
        self.dispatch(Event::SetVisible(visible)).await;
    }

    async fn dispatch(&mut self, event: Event) {
        let effects = self.controller.handle(event);
        for effect in effects {
            let resolution = self.execute(effect).await;
            // Resolution events never request further remote work, so one
            // pass is enough.
            let leftover = self.controller.handle(resolution);
            debug_assert!(leftover.is_empty());
        }
    }

    async fn execute(&mut self, effect: Effect) -> Event {
        match effect {
            Effect::TestCredential { key } => {
                let verdict = self.gateway.test_credential(&key).await;
                match verdict {
                    Ok(check) => Event::CredentialVerdict {
                        key,
                        accepted: check.accepted,
                        reason: check.reason,
                    },
                    Err(err) => Event::CredentialVerdict {
                        key,
                        accepted: false,
                        reason: Some(err.to_string()),
                    },
                }
            }
            Effect::RequestExplanation {
                generation,
                key,
                context,
            } => {
                let result = self.gateway.explain(&key, &context).await;
                Event::ExplanationResolved { generation, result }
            }
            Effect::SendExchange {
                generation,
                key,
                message,
                context,
                history,
            } => {
                let result = self
                    .gateway
                    .exchange(&key, &message, &context, &history)
                    .await;
                Event::ExchangeResolved { generation, result }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use vdlab_core::context::{PredictionContext, UserInput};
    use vdlab_core::conversation::{ChatRole, Turn};
    use vdlab_core::error::ChatGatewayError;

    use super::*;
    use crate::gateway::chat::KeyCheck;
    use crate::store::MemoryCredentialStore;

    #[derive(Default)]
    struct FakeGateway {
        key_checks: Mutex<VecDeque<Result<KeyCheck, ChatGatewayError>>>,
        explanations: Mutex<VecDeque<Result<String, ChatGatewayError>>>,
        replies: Mutex<VecDeque<Result<String, ChatGatewayError>>>,
        seen_histories: Mutex<Vec<Vec<Turn>>>,
    }

    impl FakeGateway {
        fn accepting() -> Self {
            let fake = Self::default();
            fake.key_checks.lock().unwrap().push_back(Ok(KeyCheck {
                accepted: true,
                reason: None,
            }));
            fake
        }

        fn push_reply(&self, reply: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Ok(reply.to_string()));
        }
    }

    #[async_trait]
    impl ChatGateway for FakeGateway {
        async fn test_credential(&self, _key: &str) -> Result<KeyCheck, ChatGatewayError> {
            self.key_checks
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ChatGatewayError::Transport("no scripted check".into())))
        }

        async fn explain(
            &self,
            _key: &str,
            _context: &PredictionContext,
        ) -> Result<String, ChatGatewayError> {
            self.explanations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ChatGatewayError::Transport("no scripted explanation".into())))
        }

        async fn exchange(
            &self,
            _key: &str,
            _message: &str,
            _context: &PredictionContext,
            history: &[Turn],
        ) -> Result<String, ChatGatewayError> {
            self.seen_histories.lock().unwrap().push(history.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ChatGatewayError::Transport("no scripted reply".into())))
        }
    }

    fn prediction() -> PredictionContext {
        let mut input = UserInput::new();
        input.insert("ESTADO_DEPTO".into(), json!("Meta"));
        input.insert("SEXO".into(), json!("M"));
        PredictionContext::from_response(
            input,
            serde_json::from_value(json!({
                "model": "XGBoost",
                "prediction": 1,
                "confidence": 0.88,
                "label": "Desplazamiento Forzado",
                "match_type": "no_match"
            }))
            .expect("raw response"),
        )
    }

    #[tokio::test]
    async fn validate_predict_explain_and_chat_end_to_end() {
        let gateway = FakeGateway::accepting();
        gateway
            .explanations
            .lock()
            .unwrap()
            .push_back(Ok("El modelo favorece EVENTOS.".to_string()));
        gateway.push_reply("La confianza viene del histórico.");

        let mut assistant = Assistant::new(gateway, MemoryCredentialStore::new());

        assistant.submit_credential("AIza123").await;
        assert_eq!(assistant.phase(), Phase::Ready);

        assistant.observe_prediction(prediction()).await;
        assert_eq!(assistant.phase(), Phase::ExplainPrompt);

        assistant.accept_explanation().await;
        let turns = assistant.controller().conversation().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, ChatRole::Assistant);

        assistant.send("¿De dónde sale la confianza?").await;
        let turns = assistant.controller().conversation().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, ChatRole::User);
        assert_eq!(turns[2].role, ChatRole::Assistant);
        assert!(!assistant.controller().conversation().is_locked());
    }

    #[tokio::test]
    async fn exchange_history_replays_prior_turns_in_order() {
        let gateway = FakeGateway::accepting();
        gateway.push_reply("primera respuesta");
        gateway.push_reply("segunda respuesta");

        let mut assistant = Assistant::new(gateway, MemoryCredentialStore::new());
        assistant.submit_credential("AIza123").await;
        assistant.observe_prediction(prediction()).await;
        assistant.decline_explanation().await;

        assistant.send("primera pregunta").await;
        assistant.send("segunda pregunta").await;

        let histories = assistant.gateway.seen_histories.lock().unwrap();
        assert!(histories[0].is_empty());
        assert_eq!(histories[1].len(), 2);
        assert_eq!(histories[1][0].content, "primera pregunta");
        assert_eq!(histories[1][1].content, "primera respuesta");
    }

    #[tokio::test]
    async fn transport_failure_during_validation_reads_as_rejection() {
        let gateway = FakeGateway::default();
        gateway
            .key_checks
            .lock()
            .unwrap()
            .push_back(Err(ChatGatewayError::Transport("connection refused".into())));

        let mut assistant = Assistant::new(gateway, MemoryCredentialStore::new());
        assistant.submit_credential("AIza123").await;

        assert_eq!(assistant.phase(), Phase::NoCredential);
        assert!(assistant.controller().notice().is_some());
    }

    #[tokio::test]
    async fn remove_credential_clears_store_and_conversation() {
        let gateway = FakeGateway::accepting();
        gateway.push_reply("hola");

        let mut assistant = Assistant::new(gateway, MemoryCredentialStore::new());
        assistant.submit_credential("AIza123").await;
        assistant.observe_prediction(prediction()).await;
        assistant.decline_explanation().await;
        assistant.send("hola").await;

        assistant.remove_credential().await;
        assert_eq!(assistant.phase(), Phase::NoCredential);
        assert!(assistant.controller().conversation().turns().is_empty());
    }
}
