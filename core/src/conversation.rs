use serde::{Deserialize, Serialize};

use crate::error::ChatError;

pub const MAX_TURNS: usize = 30;
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Roles a client may send. System turns are produced server-side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A validated, request-scoped conversation (1..=30 turns, each 1..=4000 chars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(turns: Vec<Turn>) -> Result<Self, ChatError> {
        if turns.is_empty() {
            return Err(ChatError::InvalidConversation("at least one message is required".into()));
        }
        if turns.len() > MAX_TURNS {
            return Err(ChatError::InvalidConversation(format!(
                "at most {MAX_TURNS} messages are allowed, got {}",
                turns.len()
            )));
        }
        for (idx, turn) in turns.iter().enumerate() {
            let chars = turn.content.chars().count();
            if chars == 0 || chars > MAX_CONTENT_CHARS {
                return Err(ChatError::InvalidConversation(format!(
                    "messages[{idx}].content must be 1..={MAX_CONTENT_CHARS} chars, got {chars}"
                )));
            }
        }
        Ok(Self { turns })
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent user turn, if any.
    pub fn last_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(Conversation::new(vec![]).is_err());
        assert!(Conversation::new(vec![Turn::user("")]).is_err());
        assert!(Conversation::new(vec![Turn::user("가".repeat(MAX_CONTENT_CHARS + 1))]).is_err());
        assert!(Conversation::new(vec![Turn::user("hi"); MAX_TURNS + 1]).is_err());
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 4000 Hangul syllables are 12000 bytes but still within bounds.
        let convo = Conversation::new(vec![Turn::user("가".repeat(MAX_CONTENT_CHARS))]);
        assert!(convo.is_ok());
    }

    #[test]
    fn test_last_user_turn() {
        let convo = Conversation::new(vec![
            Turn::user("first"),
            Turn::assistant("reply"),
            Turn::user("second"),
            Turn::assistant("another reply"),
        ])
        .unwrap();
        assert_eq!(convo.last_user_turn().unwrap().content, "second");
    }

    #[test]
    fn test_system_role_does_not_deserialize() {
        let parsed: Result<Turn, _> = serde_json::from_str(r#"{"role":"system","content":"x"}"#);
        assert!(parsed.is_err());
    }
}
