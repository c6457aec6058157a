use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TurnRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub role: TurnRole,
    pub text: String,
    pub timestamp: NaiveDateTime,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.to_string(),
            timestamp: Local::now().naive_local(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(TurnRole::Assistant, text)
    }

    /// "User: text" form used in prompts and transcripts.
    pub fn labelled(&self) -> String {
        format!("{}: {}", self.role.label(), self.text)
    }
}
