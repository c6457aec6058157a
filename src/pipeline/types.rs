use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::enums::str_enum;
use crate::models::ValidationError;

str_enum!(RequestKind {
    Chat => "chat",
    SymptomCheck => "symptom_check",
    TreatmentPlan => "treatment_plan",
    MetricAdvice => "metric_advice",
    TrendSummary => "trend_summary",
});

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        RequestKind::Chat,
        RequestKind::SymptomCheck,
        RequestKind::TreatmentPlan,
        RequestKind::MetricAdvice,
        RequestKind::TrendSummary,
    ];

    /// Structured kinds must come back as a single JSON object;
    /// the rest are free text.
    pub fn expects_json(&self) -> bool {
        matches!(self, RequestKind::SymptomCheck | RequestKind::TreatmentPlan)
    }
}

/// Named context fields for a prompt. Ordered so rendering is deterministic.
pub type PromptContext = BTreeMap<String, String>;

/// One request/response cycle's input. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub kind: RequestKind,
    pub context: PromptContext,
    pub free_text: String,
}

impl PromptRequest {
    pub fn new(kind: RequestKind, context: PromptContext, free_text: &str) -> Self {
        Self {
            kind,
            context,
            free_text: free_text.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Structured model output
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossibleCondition {
    pub condition: String,
    pub likelihood_percent: f64,
    #[serde(default)]
    pub notes: String,
}

/// Reply to a symptom check. Likelihoods are not normalized and need not
/// sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomAssessment {
    pub possible_conditions: Vec<PossibleCondition>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSuggestion {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub medications: Vec<MedicationSuggestion>,
    pub lifestyle_changes: Vec<String>,
    pub follow_up: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "response", rename_all = "snake_case")]
pub enum StructuredResponse {
    SymptomAssessment(SymptomAssessment),
    TreatmentPlan(TreatmentPlan),
}

/// Interpreted model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Structured(StructuredResponse),
    /// Free-text reply. `fallback` is set when the model returned nothing
    /// usable and the fixed fallback message was substituted.
    FreeText { text: String, fallback: bool },
}
