use vdlab_core::context::PredictionContext;
use vdlab_core::conversation::Turn;
use vdlab_core::credential::{self, CredentialState};
use vdlab_core::error::{AssistantError, ChatGatewayError};

use crate::store::CredentialStore;

/// Provisional turn shown while an explanation request is in flight.
const EXPLANATION_PLACEHOLDER: &str = "Generando explicación automática...";
/// Shown when the explanation request fails. The exchange path keeps the
/// upstream error text; the explanation path uses this fixed message.
const EXPLANATION_FAILED: &str =
    "Error generando explicación. Por favor verifica tu API key o intenta de nuevo.";

/// Where the assistant currently stands. Session-scoped — there is no
/// terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No usable credential; the setup prompt is shown.
    NoCredential,
    /// A candidate key is being validated against the proxy.
    CredentialPending,
    /// Credential present, no prediction yet.
    Ready,
    /// A fresh prediction exists and the user has not yet answered the
    /// "explain this?" offer.
    ExplainPrompt,
    /// Open chat surface.
    Chatting,
}

/// Everything that can happen to the controller. Remote-call resolutions
/// arrive as events carrying the generation of the request that produced
/// them, so stale responses can be told apart from current ones.
#[derive(Debug)]
pub enum Event {
    SubmitCredential(String),
    CredentialVerdict {
        key: String,
        accepted: bool,
        reason: Option<String>,
    },
    PredictionCompleted(PredictionContext),
    AcceptExplanation,
    DeclineExplanation,
    ExplanationResolved {
        generation: u64,
        result: Result<String, ChatGatewayError>,
    },
    Send(String),
    ExchangeResolved {
        generation: u64,
        result: Result<String, ChatGatewayError>,
    },
    ClearConversation,
    RemoveCredential,
    SetVisible(bool),
}

/// Remote work a transition requested. The driver executes these against
/// the chat gateway and feeds the outcomes back as resolution events.
#[derive(Debug, Clone)]
pub enum Effect {
    TestCredential {
        key: String,
    },
    RequestExplanation {
        generation: u64,
        key: String,
        context: PredictionContext,
    },
    SendExchange {
        generation: u64,
        key: String,
        message: String,
        context: PredictionContext,
        history: Vec<Turn>,
    },
}

/// The ordered conversation plus its bookkeeping flags. Owned by the
/// controller; rendering code only reads it.
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
    pending_prompt: bool,
    locked: bool,
    generation: u64,
}

impl ConversationState {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn pending_prompt(&self) -> bool {
        self.pending_prompt
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate the conversation. Bumping the generation orphans any
    /// outstanding call; its resolution will no longer match and is
    /// dropped on arrival.
    fn reset(&mut self, arm_prompt: bool) {
        self.turns.clear();
        self.pending_prompt = arm_prompt;
        self.locked = false;
        self.generation += 1;
    }
}

/// The prediction-to-chat synchronization state machine.
///
/// All transition rules live in [`handle`](Self::handle): explicit
/// `(state, event) -> effects` functions rather than framework
/// subscriptions, so every rule is unit-testable without I/O. The injected
/// [`CredentialStore`] is the only side channel; remote calls are returned
/// as [`Effect`]s for the driver to run.
pub struct AssistantController<S: CredentialStore> {
    store: S,
    phase: Phase,
    credential: CredentialState,
    /// Candidate key awaiting a verdict. Verdicts for any other key are
    /// ignored.
    pending_key: Option<String>,
    context: Option<PredictionContext>,
    conversation: ConversationState,
    /// Identity of the last prediction that triggered a reset. The
    /// new-prediction transition fires once per distinct value.
    last_identity: Option<String>,
    visible: bool,
    notice: Option<AssistantError>,
}

impl<S: CredentialStore> AssistantController<S> {
    /// Restore from the store: a persisted key was validated when saved and
    /// is trusted without a fresh round-trip.
    pub fn new(store: S) -> Self {
        let (credential, phase) = match store.load() {
            Some(key) => {
                tracing::debug!(key = %credential::key_preview(&key), "restored stored credential");
                (CredentialState::restored(key), Phase::Ready)
            }
            None => (CredentialState::default(), Phase::NoCredential),
        };
        Self {
            store,
            phase,
            credential,
            pending_key: None,
            context: None,
            conversation: ConversationState::default(),
            last_identity: None,
            visible: false,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn context(&self) -> Option<&PredictionContext> {
        self.context.as_ref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_validated()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Inline error for the credential surface: a local format error or
    /// the upstream rejection reason (displayed verbatim).
    pub fn notice(&self) -> Option<&AssistantError> {
        self.notice.as_ref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Apply one event and return the remote work it requested.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::SubmitCredential(key) => self.on_submit_credential(key),
            Event::CredentialVerdict {
                key,
                accepted,
                reason,
            } => self.on_credential_verdict(key, accepted, reason),
            Event::PredictionCompleted(context) => self.on_prediction(context),
            Event::AcceptExplanation => self.on_accept_explanation(),
            Event::DeclineExplanation => self.on_decline_explanation(),
            Event::ExplanationResolved { generation, result } => {
                self.on_explanation_resolved(generation, result)
            }
            Event::Send(text) => self.on_send(text),
            Event::ExchangeResolved { generation, result } => {
                self.on_exchange_resolved(generation, result)
            }
            Event::ClearConversation => self.on_clear(),
            Event::RemoveCredential => self.on_remove_credential(),
            Event::SetVisible(visible) => {
                // Purely presentational: hiding the panel must not touch
                // turns, prompt arming, or identity tracking.
                self.visible = visible;
                Vec::new()
            }
        }
    }

    fn on_submit_credential(&mut self, key: String) -> Vec<Effect> {
        let key = key.trim().to_string();
        if let Err(err) = credential::check_format(&key) {
            self.notice = Some(err);
            return Vec::new();
        }
        tracing::debug!(key = %credential::key_preview(&key), "validating credential");
        self.notice = None;
        self.pending_key = Some(key.clone());
        self.phase = Phase::CredentialPending;
        vec![Effect::TestCredential { key }]
    }

    fn on_credential_verdict(
        &mut self,
        key: String,
        accepted: bool,
        reason: Option<String>,
    ) -> Vec<Effect> {
        if self.pending_key.as_deref() != Some(key.as_str()) {
            tracing::debug!("verdict for a superseded candidate key, ignoring");
            return Vec::new();
        }
        self.pending_key = None;

        if accepted {
            if let Err(err) = self.store.save(&key) {
                // The key still works for this session; only persistence
                // across restarts is lost.
                tracing::warn!(error = %err, "failed to persist credential");
            }
            tracing::info!(key = %credential::key_preview(&key), "credential accepted");
            self.credential = CredentialState::validated(key);
            self.notice = None;
            self.phase = if self.context.is_some() {
                if self.conversation.turns.is_empty() {
                    self.conversation.pending_prompt = true;
                    Phase::ExplainPrompt
                } else {
                    Phase::Chatting
                }
            } else {
                Phase::Ready
            };
        } else {
            let reason = reason.unwrap_or_else(|| "Invalid API key".to_string());
            tracing::info!(reason = %reason, "credential rejected");
            self.notice = Some(AssistantError::CredentialRejected { reason });
            // A previously validated key survives a failed change attempt.
            self.phase = self.resume_phase();
        }
        Vec::new()
    }

    fn on_prediction(&mut self, context: PredictionContext) -> Vec<Effect> {
        if self.last_identity.as_deref() == Some(context.identity.as_str()) {
            // Same inputs, same prediction: refresh the snapshot but leave
            // the conversation and prompt arming untouched.
            self.context = Some(context);
            return Vec::new();
        }

        tracing::debug!(identity = %context.identity, "new prediction identity");
        self.last_identity = Some(context.identity.clone());
        self.context = Some(context);
        let armed = self.credential.is_validated();
        self.conversation.reset(armed);
        if armed {
            self.phase = Phase::ExplainPrompt;
        }
        Vec::new()
    }

    fn on_accept_explanation(&mut self) -> Vec<Effect> {
        if self.phase != Phase::ExplainPrompt {
            return Vec::new();
        }
        let (Some(key), Some(context)) = (self.credential.key(), self.context.as_ref()) else {
            return Vec::new();
        };
        self.conversation.pending_prompt = false;
        self.conversation.locked = true;
        self.conversation
            .turns
            .push(Turn::system(EXPLANATION_PLACEHOLDER));
        self.phase = Phase::Chatting;
        vec![Effect::RequestExplanation {
            generation: self.conversation.generation,
            key: key.to_string(),
            context: context.clone(),
        }]
    }

    fn on_decline_explanation(&mut self) -> Vec<Effect> {
        if self.phase == Phase::ExplainPrompt {
            self.conversation.pending_prompt = false;
            self.phase = Phase::Chatting;
        }
        Vec::new()
    }

    fn on_explanation_resolved(
        &mut self,
        generation: u64,
        result: Result<String, ChatGatewayError>,
    ) -> Vec<Effect> {
        if generation != self.conversation.generation {
            tracing::debug!(
                stale = generation,
                current = self.conversation.generation,
                "dropping stale explanation"
            );
            return Vec::new();
        }
        self.conversation.locked = false;
        if self
            .conversation
            .turns
            .last()
            .is_some_and(|turn| turn.content == EXPLANATION_PLACEHOLDER)
        {
            self.conversation.turns.pop();
        }
        match result {
            Ok(explanation) => self.conversation.turns.push(Turn::assistant(explanation)),
            Err(cause) => {
                tracing::warn!(error = %AssistantError::Explanation(cause), "appending error turn");
                self.conversation.turns.push(Turn::system(EXPLANATION_FAILED));
            }
        }
        Vec::new()
    }

    fn on_send(&mut self, text: String) -> Vec<Effect> {
        let message = text.trim();
        if message.is_empty() {
            return Vec::new();
        }
        if self.context.is_none() {
            // Prevented here at the boundary; never reaches the remote.
            tracing::debug!(error = %AssistantError::MissingContext, "send rejected");
            return Vec::new();
        }
        let (Some(key), Some(context)) = (self.credential.key(), self.context.as_ref()) else {
            return Vec::new();
        };
        if self.conversation.locked {
            return Vec::new();
        }

        // Typing a question straight into the prompt dismisses the offer.
        if self.phase == Phase::ExplainPrompt {
            self.conversation.pending_prompt = false;
        }
        self.phase = Phase::Chatting;

        // History is the conversation as it stood before this message;
        // the user turn is appended optimistically right after.
        let history = self.conversation.turns.clone();
        let effect = Effect::SendExchange {
            generation: self.conversation.generation,
            key: key.to_string(),
            message: message.to_string(),
            context: context.clone(),
            history,
        };
        self.conversation.turns.push(Turn::user(message));
        self.conversation.locked = true;
        vec![effect]
    }

    fn on_exchange_resolved(
        &mut self,
        generation: u64,
        result: Result<String, ChatGatewayError>,
    ) -> Vec<Effect> {
        if generation != self.conversation.generation {
            tracing::debug!(
                stale = generation,
                current = self.conversation.generation,
                "dropping stale exchange reply"
            );
            return Vec::new();
        }
        self.conversation.locked = false;
        match result {
            Ok(reply) => self.conversation.turns.push(Turn::assistant(reply)),
            Err(cause) => {
                self.conversation
                    .turns
                    .push(Turn::system(format!("Error: {cause}")));
                tracing::warn!(error = %AssistantError::Exchange(cause), "appending error turn");
            }
        }
        Vec::new()
    }

    fn on_clear(&mut self) -> Vec<Effect> {
        self.conversation.reset(true);
        self.phase = if self.credential.is_validated() && self.context.is_some() {
            Phase::ExplainPrompt
        } else {
            self.resume_phase()
        };
        Vec::new()
    }

    fn on_remove_credential(&mut self) -> Vec<Effect> {
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear stored credential");
        }
        self.credential.clear();
        self.pending_key = None;
        self.notice = None;
        self.conversation.reset(false);
        self.phase = Phase::NoCredential;
        tracing::info!("credential removed");
        Vec::new()
    }

    /// The interactive phase implied by what the controller currently
    /// holds, used after a failed credential change or a clear without
    /// context.
    fn resume_phase(&self) -> Phase {
        if !self.credential.is_validated() {
            Phase::NoCredential
        } else if self.context.is_none() {
            Phase::Ready
        } else if self.conversation.pending_prompt {
            Phase::ExplainPrompt
        } else {
            Phase::Chatting
        }
    }
}
