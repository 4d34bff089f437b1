//! Conversation and action types shared by the loop, the dispatcher and the
//! model backends.
//!
//! These types carry no behavior beyond construction and inspection; they must
//! stay independent of any particular model transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

/// An action the model asked us to perform. Untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one action, always textual.
///
/// Failures are carried in `payload` as an error description so the model can
/// read them like any other result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub name: String,
    pub payload: String,
    /// Whether `payload` describes a failure. Backends may use this to pick a
    /// response envelope; the text is the same either way.
    #[serde(default)]
    pub is_error: bool,
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User {
        text: String,
    },
    Agent {
        text: Option<String>,
        actions: Vec<ActionRequest>,
    },
    Tool {
        result: ActionResult,
    },
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Turn::User { .. } => Role::User,
            Turn::Agent { .. } => Role::Agent,
            Turn::Tool { .. } => Role::Tool,
        }
    }
}

/// Append-only conversation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the user's request as the first turn.
    pub fn seeded(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User {
                text: prompt.into(),
            }],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(Turn::role).collect()
    }
}

/// Token accounting reported by the model backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

/// One response from the model: optional text and zero or more action requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub actions: Vec<ActionRequest>,
    pub usage: Usage,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn action(request: ActionRequest) -> Self {
        Self {
            actions: vec![request],
            ..Self::default()
        }
    }

    /// Text with surrounding whitespace removed, or `None` if there is nothing to show.
    pub fn final_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_request_drops_non_object_arguments() {
        let request = ActionRequest::new("read_file", json!(["not", "a", "map"]));
        assert!(request.arguments.is_empty());

        let request = ActionRequest::new("read_file", json!({"file_path": "main.py"}));
        assert_eq!(request.arguments["file_path"], json!("main.py"));
    }

    #[test]
    fn transcript_keeps_insertion_order() {
        let mut transcript = Transcript::seeded("hello");
        transcript.push(Turn::Agent {
            text: Some("hi".to_string()),
            actions: Vec::new(),
        });
        assert_eq!(transcript.roles(), vec![Role::User, Role::Agent]);
    }

    #[test]
    fn final_text_ignores_whitespace_only_text() {
        assert_eq!(ModelReply::text("  \n").final_text(), None);
        assert_eq!(ModelReply::text(" done \n").final_text(), Some("done"));
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.add(Usage {
            prompt_tokens: 10,
            response_tokens: 2,
        });
        total.add(Usage {
            prompt_tokens: 5,
            response_tokens: 1,
        });
        assert_eq!(
            total,
            Usage {
                prompt_tokens: 15,
                response_tokens: 3
            }
        );
    }
}
