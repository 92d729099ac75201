use crate::llm::{ChatMessage, Role};

/// Ordered transcript of one session. The optional system message is
/// always the first entry and survives `reset`.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    has_system: bool,
}

impl ConversationHistory {
    pub fn new(system_prompt: Option<&str>) -> Self {
        let mut messages = Vec::new();
        let prompt = system_prompt.filter(|p| !p.is_empty());
        if let Some(prompt) = prompt {
            messages.push(ChatMessage::system(prompt));
        }
        Self {
            has_system: prompt.is_some(),
            messages,
        }
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system(&self) -> Option<&ChatMessage> {
        if self.has_system {
            self.messages.first()
        } else {
            None
        }
    }

    /// Drops every turn, keeping the system message if one was configured.
    pub fn reset(&mut self) {
        self.messages.truncate(usize::from(self.has_system));
    }

    pub fn turn_count(&self) -> usize {
        self.turns().iter().filter(|m| m.role == Role::User).count()
    }

    fn turns(&self) -> &[ChatMessage] {
        &self.messages[usize::from(self.has_system)..]
    }

    /// Non-system tail that starts at the `max_turns`-th user message counted
    /// from the end. A trailing user message awaiting its reply counts as a
    /// turn. `None` keeps everything.
    pub fn context_window(&self, max_turns: Option<usize>) -> &[ChatMessage] {
        let turns = self.turns();
        let Some(max_turns) = max_turns else {
            return turns;
        };
        if max_turns == 0 {
            return &turns[turns.len()..];
        }

        let mut seen = 0;
        for (idx, msg) in turns.iter().enumerate().rev() {
            if msg.role == Role::User {
                seen += 1;
                if seen == max_turns {
                    return &turns[idx..];
                }
            }
        }
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_turns(system: Option<&str>, n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new(system);
        for i in 0..n {
            history.append_user(format!("question {i}"));
            history.append_assistant(format!("answer {i}"));
        }
        history
    }

    #[test]
    fn test_new_with_persona() {
        let history = ConversationHistory::new(Some("You are OrderBot"));
        assert_eq!(history.all(), &[ChatMessage::system("You are OrderBot")]);
        assert_eq!(history.system().map(|m| m.content.as_str()), Some("You are OrderBot"));
    }

    #[test]
    fn test_new_without_persona() {
        assert!(ConversationHistory::new(None).all().is_empty());
        assert!(ConversationHistory::new(Some("")).all().is_empty());
    }

    #[test]
    fn test_whitespace_persona_kept_as_given() {
        let history = ConversationHistory::new(Some("   \n"));
        assert_eq!(history.all(), &[ChatMessage::system("   \n")]);
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let history = with_turns(Some("persona"), 2);
        let roles: Vec<Role> = history.all().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(history.all()[3].content, "question 1");
        assert_eq!(history.turn_count(), 2);
    }

    #[test]
    fn test_reset_keeps_system_message() {
        let mut history = with_turns(Some("persona"), 3);
        history.reset();
        assert_eq!(history.all(), &[ChatMessage::system("persona")]);
        history.reset();
        assert_eq!(history.all(), &[ChatMessage::system("persona")]);
    }

    #[test]
    fn test_reset_without_system_clears_all() {
        let mut history = with_turns(None, 2);
        history.reset();
        assert!(history.all().is_empty());
        assert_eq!(history.turn_count(), 0);
    }

    #[test]
    fn test_context_window_unbounded() {
        let history = with_turns(Some("persona"), 3);
        assert_eq!(history.context_window(None).len(), 6);
        assert_eq!(history.context_window(None)[0].role, Role::User);
    }

    #[test]
    fn test_context_window_keeps_last_turns() {
        let mut history = with_turns(Some("persona"), 3);
        history.append_user("pending");

        let window = history.context_window(Some(2));
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["question 2", "answer 2", "pending"]);

        let window = history.context_window(Some(1));
        assert_eq!(window, &[ChatMessage::user("pending")]);
    }

    #[test]
    fn test_context_window_larger_than_history() {
        let history = with_turns(None, 2);
        assert_eq!(history.context_window(Some(10)).len(), 4);
    }

    #[test]
    fn test_context_window_does_not_touch_transcript() {
        let history = with_turns(Some("persona"), 4);
        let _ = history.context_window(Some(1));
        assert_eq!(history.all().len(), 9);
    }
}
