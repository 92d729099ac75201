use tracing::{debug, info, warn};

use crate::config::{Credential, SessionConfig};
use crate::error::ChatError;
use crate::history::ConversationHistory;
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSummary {
    pub model: String,
    pub key_prefix_masked: String,
}

/// One user's conversation: owns the transcript and drives the completion
/// client once per submitted message.
pub struct ChatSession {
    config: SessionConfig,
    history: ConversationHistory,
    client: Box<dyn CompletionClient>,
    key_prefix_masked: String,
}

impl ChatSession {
    pub fn new(
        config: SessionConfig,
        credential: &Credential,
        client: Box<dyn CompletionClient>,
    ) -> Self {
        let history = ConversationHistory::new(Some(config.system_prompt.as_str()));
        info!(
            persona = %config.persona_name,
            model = %config.model,
            context_turns = ?config.context_turns,
            "chat session created"
        );
        Self {
            config,
            history,
            client,
            key_prefix_masked: credential.masked_prefix(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.history.all()
    }

    pub fn persona_name(&self) -> &str {
        &self.config.persona_name
    }

    pub fn config_summary(&self) -> ConfigSummary {
        ConfigSummary {
            model: self.config.model.clone(),
            key_prefix_masked: self.key_prefix_masked.clone(),
        }
    }

    /// Appends the user message, asks for one completion and appends the
    /// reply. On failure the user message stays so it is not lost.
    pub fn submit_user_message(&mut self, text: &str) -> Result<ChatMessage, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::validation("message is empty"));
        }

        self.history.append_user(text);

        let payload = self.outbound_messages();
        let request = CompletionRequest::new(&self.config.model, &payload, self.config.temperature);
        debug!(
            turns = self.history.turn_count(),
            sent = payload.len(),
            chars = text.len(),
            "submitting user message"
        );

        match self.client.complete(&request) {
            Ok(reply) => {
                self.history.append_assistant(reply.content.clone());
                Ok(reply)
            }
            Err(err) => {
                warn!(error = %err, "assistant did not respond");
                Err(err)
            }
        }
    }

    pub fn reset(&mut self) {
        info!(dropped_turns = self.history.turn_count(), "conversation reset");
        self.history.reset();
    }

    fn outbound_messages(&self) -> Vec<ChatMessage> {
        let window = self.history.context_window(self.config.context_turns);
        let mut payload = Vec::with_capacity(window.len() + 1);
        if let Some(system) = self.history.system() {
            payload.push(system.clone());
        }
        payload.extend_from_slice(window);
        payload
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::stub::StubClient;
    use crate::llm::Role;

    const PERSONA: &str = "You are OrderBot for Fernando's Pizza.";

    fn config(system_prompt: &str, context_turns: Option<usize>) -> SessionConfig {
        SessionConfig {
            persona_name: "Order a Pizza ChatBot".to_string(),
            system_prompt: system_prompt.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            context_turns,
        }
    }

    fn credential() -> Credential {
        Credential::parse("sk-test-0123456789").unwrap()
    }

    struct Shared(Arc<StubClient>);

    impl CompletionClient for Shared {
        fn complete(&self, request: &CompletionRequest<'_>) -> Result<ChatMessage, ChatError> {
            self.0.complete(request)
        }
    }

    fn session_with(stub: StubClient, cfg: SessionConfig) -> (ChatSession, Arc<StubClient>) {
        let stub = Arc::new(stub);
        let session = ChatSession::new(cfg, &credential(), Box::new(Shared(stub.clone())));
        (session, stub)
    }

    #[test]
    fn test_new_session_holds_only_persona() {
        let (session, _) = session_with(StubClient::replying("hi"), config(PERSONA, None));
        assert_eq!(session.history(), &[ChatMessage::system(PERSONA)]);
    }

    #[test]
    fn test_new_session_without_persona_is_empty() {
        let (session, _) = session_with(StubClient::replying("hi"), config("", None));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_ping_pong() {
        let (mut session, _) = session_with(StubClient::replying("PONG"), config(PERSONA, None));
        let reply = session.submit_user_message("PING").unwrap();

        assert_eq!(reply, ChatMessage::assistant("PONG"));
        let tail = &session.history()[session.history().len() - 2..];
        assert_eq!(tail, &[ChatMessage::user("PING"), ChatMessage::assistant("PONG")]);
    }

    #[test]
    fn test_n_submissions_alternate() {
        for (persona, offset) in [(PERSONA, 1), ("", 0)] {
            let (mut session, _) =
                session_with(StubClient::replying("ok"), config(persona, None));
            let n = 5;
            for i in 0..n {
                session.submit_user_message(&format!("message {i}")).unwrap();
            }

            let history = session.history();
            assert_eq!(history.len(), 2 * n + offset);
            for (i, pair) in history[offset..].chunks(2).enumerate() {
                assert_eq!(pair[0], ChatMessage::user(format!("message {i}")));
                assert_eq!(pair[1].role, Role::Assistant);
            }
        }
    }

    #[test]
    fn test_blank_input_rejected_without_state_change() {
        let (mut session, stub) = session_with(StubClient::replying("ok"), config(PERSONA, None));
        for input in ["", "   ", "\n\t"] {
            let err = session.submit_user_message(input).unwrap_err();
            assert!(matches!(err, ChatError::Validation(_)));
        }
        assert_eq!(session.history().len(), 1);
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_failure_keeps_user_message() {
        let (mut session, _) = session_with(
            StubClient::failing(ChatError::transport("connection refused")),
            config(PERSONA, None),
        );
        let err = session.submit_user_message("hello").unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
        assert_eq!(
            session.history(),
            &[ChatMessage::system(PERSONA), ChatMessage::user("hello")]
        );
    }

    #[test]
    fn test_malformed_response_keeps_user_message() {
        let (mut session, _) = session_with(
            StubClient::failing(ChatError::malformed("no choices")),
            config(PERSONA, None),
        );
        assert!(session.submit_user_message("hello").is_err());
        assert_eq!(session.history().last(), Some(&ChatMessage::user("hello")));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let (mut session, _) = session_with(StubClient::replying("ok"), config(PERSONA, None));
        session.submit_user_message("one").unwrap();
        session.submit_user_message("two").unwrap();

        session.reset();
        assert_eq!(session.history(), &[ChatMessage::system(PERSONA)]);
        session.reset();
        assert_eq!(session.history(), &[ChatMessage::system(PERSONA)]);
    }

    #[test]
    fn test_full_history_sent_in_order() {
        let (mut session, stub) = session_with(StubClient::replying("ok"), config(PERSONA, None));
        session.submit_user_message("first").unwrap();
        session.submit_user_message("second").unwrap();

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            vec![
                ChatMessage::system(PERSONA),
                ChatMessage::user("first"),
                ChatMessage::assistant("ok"),
                ChatMessage::user("second"),
            ]
        );
    }

    #[test]
    fn test_context_window_limits_payload_not_transcript() {
        let (mut session, stub) =
            session_with(StubClient::replying("ok"), config(PERSONA, Some(2)));
        for i in 0..4 {
            session.submit_user_message(&format!("q{i}")).unwrap();
        }

        let seen = stub.seen.lock().unwrap();
        assert_eq!(
            seen[3],
            vec![
                ChatMessage::system(PERSONA),
                ChatMessage::user("q2"),
                ChatMessage::assistant("ok"),
                ChatMessage::user("q3"),
            ]
        );
        assert_eq!(session.history().len(), 9);
    }

    #[test]
    fn test_config_summary_masks_key() {
        let (session, _) = session_with(StubClient::replying("ok"), config(PERSONA, None));
        let summary = session.config_summary();
        assert_eq!(summary.model, "gpt-3.5-turbo");
        assert_eq!(summary.key_prefix_masked, "sk-tes...");
    }
}
