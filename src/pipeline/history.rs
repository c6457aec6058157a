//! Conversation/History Tracker.
//!
//! `ConversationHistory` backs chat continuity and transcript export.
//! `StructuredHistory` keeps one list of successful exchanges per structured
//! kind plus a debug-only list of rejected model outputs. Both grow without
//! a cap for the life of the session.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::models::ConversationTurn;

use super::types::{RequestKind, StructuredResponse};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first. Fewer when the history is shorter.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// "Role: text" lines for plain-text export.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(ConversationTurn::labelled)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One successful structured request and its parsed reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredExchange {
    pub id: Uuid,
    pub kind: RequestKind,
    pub input: String,
    pub response: StructuredResponse,
    pub timestamp: NaiveDateTime,
}

/// Model output that failed interpretation, kept for debugging only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpretFailure {
    pub kind: RequestKind,
    pub input: String,
    pub raw: String,
    pub reason: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredHistory {
    exchanges: Vec<StructuredExchange>,
    failures: Vec<InterpretFailure>,
}

impl StructuredHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: RequestKind, input: &str, response: StructuredResponse) -> Uuid {
        let exchange = StructuredExchange {
            id: Uuid::new_v4(),
            kind,
            input: input.to_string(),
            response,
            timestamp: Local::now().naive_local(),
        };
        let id = exchange.id;
        self.exchanges.push(exchange);
        id
    }

    pub fn record_failure(&mut self, kind: RequestKind, input: &str, raw: &str, reason: &str) {
        self.failures.push(InterpretFailure {
            kind,
            input: input.to_string(),
            raw: raw.to_string(),
            reason: reason.to_string(),
            timestamp: Local::now().naive_local(),
        });
    }

    /// Successful exchanges of one kind, oldest first.
    pub fn for_kind(&self, kind: RequestKind) -> Vec<&StructuredExchange> {
        self.exchanges.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn exchanges(&self) -> &[StructuredExchange] {
        &self.exchanges
    }

    pub fn failures(&self) -> &[InterpretFailure] {
        &self.failures
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.failures.clear();
    }
}
