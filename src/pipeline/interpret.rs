//! Turns raw model text into application state.
//!
//! Free-text kinds pass through trimmed. Structured kinds must be exactly one
//! JSON object matching the schema; anything else is `MalformedModelOutput`.
//! Model output is only ever parsed as data. There is no repair step.

use serde::de::DeserializeOwned;

use super::types::{
    Interpretation, RequestKind, StructuredResponse, SymptomAssessment, TreatmentPlan,
};
use super::InterpretError;

/// Shown in place of an empty or failed free-text reply.
pub const FALLBACK_MESSAGE: &str =
    "I'm unable to respond at this time due to technical issues. Please try again later.";

/// Interpret `raw` according to what `kind` asked for.
pub fn interpret(kind: RequestKind, raw: &str) -> Result<Interpretation, InterpretError> {
    match kind {
        RequestKind::SymptomCheck => parse_symptom_assessment(raw)
            .map(|a| Interpretation::Structured(StructuredResponse::SymptomAssessment(a))),
        RequestKind::TreatmentPlan => parse_treatment_plan(raw)
            .map(|p| Interpretation::Structured(StructuredResponse::TreatmentPlan(p))),
        RequestKind::Chat | RequestKind::MetricAdvice | RequestKind::TrendSummary => {
            Ok(interpret_free_text(raw))
        }
    }
}

/// Trimmed text, or the fallback message when nothing is left.
pub fn interpret_free_text(raw: &str) -> Interpretation {
    let text = raw.trim();
    if text.is_empty() {
        Interpretation::FreeText {
            text: FALLBACK_MESSAGE.to_string(),
            fallback: true,
        }
    } else {
        Interpretation::FreeText {
            text: text.to_string(),
            fallback: false,
        }
    }
}

pub fn parse_symptom_assessment(raw: &str) -> Result<SymptomAssessment, InterpretError> {
    let assessment: SymptomAssessment = decode_object(raw)?;
    for (i, entry) in assessment.possible_conditions.iter().enumerate() {
        if entry.condition.trim().is_empty() {
            return Err(malformed(raw, format!("possible_conditions[{i}].condition is blank")));
        }
        let likelihood = entry.likelihood_percent;
        if !likelihood.is_finite() || !(0.0..=100.0).contains(&likelihood) {
            return Err(malformed(
                raw,
                format!("possible_conditions[{i}].likelihood_percent {likelihood} outside 0-100"),
            ));
        }
    }
    Ok(assessment)
}

pub fn parse_treatment_plan(raw: &str) -> Result<TreatmentPlan, InterpretError> {
    let plan: TreatmentPlan = decode_object(raw)?;
    for (i, medication) in plan.medications.iter().enumerate() {
        if medication.name.trim().is_empty() {
            return Err(malformed(raw, format!("medications[{i}].name is blank")));
        }
    }
    Ok(plan)
}

/// Strict decode: the whole trimmed text must be a single JSON object.
fn decode_object<T: DeserializeOwned>(raw: &str) -> Result<T, InterpretError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| malformed(raw, format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(malformed(raw, "top-level value is not a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| malformed(raw, format!("schema mismatch: {e}")))
}

fn malformed(raw: &str, reason: String) -> InterpretError {
    InterpretError::MalformedModelOutput {
        reason,
        raw: raw.to_string(),
    }
}
