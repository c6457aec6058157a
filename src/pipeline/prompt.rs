//! One fixed prompt template per request kind.
//!
//! `build_prompt` is pure and never fails: a missing context field renders
//! as an empty placeholder. User free text is sanitized on the way in.

use crate::metrics::SeriesDigest;
use crate::models::{ConversationTurn, MetricEntry, Profile};

use super::sanitize::sanitize;
use super::types::{PromptContext, PromptRequest, RequestKind};

/// Number of prior turns included in a chat prompt.
pub const CHAT_HISTORY_WINDOW: usize = 6;

/// Marker used in place of the profile when none has been saved.
pub const EMPTY_PROFILE: &str = "{}";

pub const KEY_PROFILE: &str = "profile";
pub const KEY_HISTORY: &str = "history";
pub const KEY_PATIENT: &str = "patient";
pub const KEY_CONDITION: &str = "condition";
pub const KEY_ALLERGIES: &str = "allergies";
pub const KEY_METRIC: &str = "metric";
pub const KEY_READING: &str = "reading";
pub const KEY_DIGEST: &str = "digest";

const CHAT_PREAMBLE: &str = "You are a caring medical assistant helping a patient with health questions.
Guidelines:
- Be empathetic, informative and clear.
- Always state that you are not a substitute for professional medical care.
- When you are unsure, recommend consulting a physician.";

/// Build the prompt for a request.
pub fn build_prompt(request: &PromptRequest) -> String {
    build(request.kind, &request.context, &request.free_text)
}

/// Build the prompt text for `kind` from named context fields and user text.
pub fn build(kind: RequestKind, context: &PromptContext, user_text: &str) -> String {
    let text = sanitize(user_text);
    match kind {
        RequestKind::Chat => chat_prompt(context, &text),
        RequestKind::SymptomCheck => symptom_prompt(context, &text),
        RequestKind::TreatmentPlan => treatment_prompt(context, &text),
        RequestKind::MetricAdvice => metric_advice_prompt(context, &text),
        RequestKind::TrendSummary => trend_prompt(context, &text),
    }
}

fn field<'a>(context: &'a PromptContext, key: &str) -> &'a str {
    context.get(key).map(String::as_str).unwrap_or("")
}

fn chat_prompt(context: &PromptContext, question: &str) -> String {
    let profile = match field(context, KEY_PROFILE) {
        "" => EMPTY_PROFILE,
        p => p,
    };
    let history = field(context, KEY_HISTORY);

    format!(
        "{CHAT_PREAMBLE}

Patient Profile: {profile}
Chat History:
{history}
User Question: \"{question}\"

Answer:"
    )
}

fn symptom_prompt(context: &PromptContext, symptoms: &str) -> String {
    let patient = field(context, KEY_PATIENT);
    format!(
        r#"You are a medical triage assistant. Assess the symptoms below and list possible conditions.

Patient: {patient}
Symptoms: {symptoms}

Reply ONLY with a single JSON object. No text before or after it, no code fences.
Schema:
- "possible_conditions": array of objects, each with
    - "condition": string, name of the condition
    - "likelihood_percent": number from 0 to 100
    - "notes": string, short explanation
- "next_steps": array of strings, recommended actions in priority order

Example:
{{"possible_conditions":[{{"condition":"Common cold","likelihood_percent":60,"notes":"runny nose and mild fever"}}],"next_steps":["Rest and drink fluids","See a doctor if fever lasts more than 3 days"]}}

JSON:"#
    )
}

fn treatment_prompt(context: &PromptContext, details: &str) -> String {
    let condition = field(context, KEY_CONDITION);
    let allergies = field(context, KEY_ALLERGIES);
    format!(
        r#"You are a medical assistant drafting a treatment plan for discussion with a physician.

Condition: {condition}
Patient details: {details}
Known allergies: {allergies}

Reply ONLY with a single JSON object. No text before or after it, no code fences.
Schema:
- "medications": array of objects, each with
    - "name": string
    - "dosage": string
    - "frequency": string
    - "notes": string
- "lifestyle_changes": array of strings
- "follow_up": string, when and with whom to follow up
- "duration": string, expected length of treatment

Example:
{{"medications":[{{"name":"Paracetamol","dosage":"500 mg","frequency":"every 6 hours as needed","notes":"do not exceed 4 g per day"}}],"lifestyle_changes":["Rest","Stay hydrated"],"follow_up":"GP in one week if not improving","duration":"5-7 days"}}

JSON:"#
    )
}

fn metric_advice_prompt(context: &PromptContext, note: &str) -> String {
    let metric = field(context, KEY_METRIC);
    let reading = field(context, KEY_READING);
    let note_line = if note.is_empty() {
        String::new()
    } else {
        format!("Patient note: {note}\n")
    };
    format!(
        "You are a clinical assistant. Interpret the following health reading in two or three plain sentences.
Say whether it is in a typical range and what the patient could do next. Do not answer in JSON.

Metric: {metric}
Reading: {reading}
{note_line}
Interpretation:"
    )
}

fn trend_prompt(context: &PromptContext, note: &str) -> String {
    let digest = field(context, KEY_DIGEST);
    let note_line = if note.is_empty() {
        String::new()
    } else {
        format!("Patient note: {note}\n")
    };
    format!(
        "You are a health analytics assistant. Based on the summary statistics below, give short, actionable insights about the trend.
Mention when a physician should review the values. Do not answer in JSON.

Summary: {digest}
{note_line}
Insights:"
    )
}

// ──────────────────────────────────────────────
// Context assembly from session data
// ──────────────────────────────────────────────

/// Context for a chat prompt: serialized profile (or `{}`) and the most
/// recent turns, role-labelled, oldest first.
pub fn chat_context(profile: Option<&Profile>, recent_turns: &[ConversationTurn]) -> PromptContext {
    let mut context = PromptContext::new();
    let profile_json = profile
        .and_then(|p| serde_json::to_string(p).ok())
        .unwrap_or_else(|| EMPTY_PROFILE.to_string());
    context.insert(KEY_PROFILE.into(), profile_json);

    let start = recent_turns.len().saturating_sub(CHAT_HISTORY_WINDOW);
    let history = recent_turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), sanitize(&turn.text)))
        .collect::<Vec<_>>()
        .join("\n");
    context.insert(KEY_HISTORY.into(), history);
    context
}

/// Short demographic line, e.g. "34-year-old female, BMI 24.2".
pub fn patient_summary(profile: &Profile) -> String {
    let mut summary = format!(
        "{}-year-old {}, BMI {:.1}",
        profile.age(),
        profile.gender(),
        profile.bmi()
    );
    if !profile.allergies().is_empty() {
        summary.push_str(&format!(", allergies: {}", profile.allergies()));
    }
    if !profile.medical_history().is_empty() {
        summary.push_str(&format!(", history: {}", profile.medical_history()));
    }
    summary
}

pub fn symptom_context(profile: Option<&Profile>) -> PromptContext {
    let mut context = PromptContext::new();
    if let Some(profile) = profile {
        context.insert(KEY_PATIENT.into(), patient_summary(profile));
    }
    context
}

pub fn treatment_context(condition: &str, profile: Option<&Profile>) -> PromptContext {
    let mut context = PromptContext::new();
    context.insert(KEY_CONDITION.into(), sanitize(condition));
    if let Some(profile) = profile {
        context.insert(KEY_ALLERGIES.into(), profile.allergies().to_string());
    }
    context
}

pub fn metric_context(entry: &MetricEntry) -> PromptContext {
    let mut context = PromptContext::new();
    context.insert(KEY_METRIC.into(), entry.kind().label().to_string());
    context.insert(KEY_READING.into(), sanitize(&entry.reading()));
    context
}

pub fn trend_context(digest: &SeriesDigest) -> PromptContext {
    let mut context = PromptContext::new();
    context.insert(KEY_DIGEST.into(), digest.describe());
    context
}
