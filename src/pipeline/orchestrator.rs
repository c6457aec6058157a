use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use super::client::{CompletionClient, GenerationParams};
use super::interpret::{
    interpret_free_text, parse_symptom_assessment, parse_treatment_plan, FALLBACK_MESSAGE,
};
use super::prompt::{
    build_prompt, chat_context, metric_context, symptom_context, treatment_context,
    trend_context, CHAT_HISTORY_WINDOW,
};
use super::types::{
    Interpretation, PromptRequest, RequestKind, StructuredResponse, SymptomAssessment,
    TreatmentPlan,
};
use super::{AssistantError, CompletionError, InterpretError};
use crate::config::ModelMap;
use crate::models::{ConversationTurn, MetricEntry, MetricKind, Profile, ProfileForm, ValidationError};
use crate::report;
use crate::session::SessionContext;

/// Reply to a chat question. `persisted` is false when the fallback message
/// was returned and no assistant turn was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub persisted: bool,
}

/// Free-text advice for a reading or a trend.
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub text: String,
    pub fallback: bool,
}

impl Advice {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_MESSAGE.to_string(),
            fallback: true,
        }
    }
}

/// Runs every request kind through the same pipeline:
/// validate → context → prompt → completion → interpret → history.
pub struct HealthAssistant<C: CompletionClient> {
    client: C,
    models: ModelMap,
    params: GenerationParams,
}

impl<C: CompletionClient> HealthAssistant<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            models: ModelMap::default(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_models(mut self, models: ModelMap) -> Self {
        self.models = models;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // ──────────────────────────────────────────────
    // Profile and metrics
    // ──────────────────────────────────────────────

    /// Validate and replace the whole profile. An invalid form leaves the
    /// previous profile in place.
    pub fn save_profile(
        &self,
        session: &mut SessionContext,
        form: ProfileForm,
    ) -> Result<(), AssistantError> {
        let profile = Profile::from_form(form)?;
        tracing::info!(bmi = profile.bmi(), category = %profile.bmi_category(), "Profile saved");
        session.set_profile(profile);
        Ok(())
    }

    pub fn log_glucose(
        &self,
        session: &mut SessionContext,
        value: f64,
        recorded_at: Option<NaiveDateTime>,
    ) -> Result<(), AssistantError> {
        let entry = MetricEntry::glucose(value, recorded_at.unwrap_or_else(now))?;
        session.metrics.append(entry);
        Ok(())
    }

    pub fn log_blood_pressure(
        &self,
        session: &mut SessionContext,
        systolic: u16,
        diastolic: u16,
        recorded_at: Option<NaiveDateTime>,
    ) -> Result<(), AssistantError> {
        let entry =
            MetricEntry::blood_pressure(systolic, diastolic, recorded_at.unwrap_or_else(now))?;
        session.metrics.append(entry);
        Ok(())
    }

    pub fn log_asthma(
        &self,
        session: &mut SessionContext,
        triggers: &str,
        severity: u8,
        recorded_at: Option<NaiveDateTime>,
    ) -> Result<(), AssistantError> {
        let entry =
            MetricEntry::asthma_episode(triggers, severity, recorded_at.unwrap_or_else(now))?;
        session.metrics.append(entry);
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Model-backed requests
    // ──────────────────────────────────────────────

    /// Answer a chat question using the profile and the last few turns.
    ///
    /// The user turn is always recorded. A completion failure or empty reply
    /// yields the fallback message and records no assistant turn.
    pub fn chat(
        &self,
        session: &mut SessionContext,
        question: &str,
    ) -> Result<ChatReply, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::Required("question").into());
        }

        let context = chat_context(
            session.profile(),
            session.conversation.recent(CHAT_HISTORY_WINDOW),
        );
        let request = PromptRequest::new(RequestKind::Chat, context, question);
        session.conversation.append(ConversationTurn::user(question));

        let raw = match self.call_model(&request) {
            Ok(raw) => raw,
            Err(_) => {
                return Ok(ChatReply {
                    text: FALLBACK_MESSAGE.to_string(),
                    persisted: false,
                })
            }
        };

        match interpret_free_text(&raw) {
            Interpretation::FreeText {
                text,
                fallback: false,
            } => {
                session.conversation.append(ConversationTurn::assistant(&text));
                Ok(ChatReply {
                    text,
                    persisted: true,
                })
            }
            _ => {
                tracing::warn!("Chat completion was empty, returning fallback");
                Ok(ChatReply {
                    text: FALLBACK_MESSAGE.to_string(),
                    persisted: false,
                })
            }
        }
    }

    pub fn check_symptoms(
        &self,
        session: &mut SessionContext,
        symptoms: &str,
    ) -> Result<SymptomAssessment, AssistantError> {
        let symptoms = symptoms.trim();
        if symptoms.is_empty() {
            return Err(ValidationError::Required("symptoms").into());
        }

        let request = PromptRequest::new(
            RequestKind::SymptomCheck,
            symptom_context(session.profile()),
            symptoms,
        );
        self.structured(
            session,
            &request,
            symptoms,
            parse_symptom_assessment,
            StructuredResponse::SymptomAssessment,
        )
    }

    pub fn plan_treatment(
        &self,
        session: &mut SessionContext,
        condition: &str,
        details: &str,
    ) -> Result<TreatmentPlan, AssistantError> {
        let condition = condition.trim();
        if condition.is_empty() {
            return Err(ValidationError::Required("condition").into());
        }
        let details = details.trim();

        let request = PromptRequest::new(
            RequestKind::TreatmentPlan,
            treatment_context(condition, session.profile()),
            details,
        );
        let input = if details.is_empty() {
            condition.to_string()
        } else {
            format!("{condition}: {details}")
        };
        self.structured(
            session,
            &request,
            &input,
            parse_treatment_plan,
            StructuredResponse::TreatmentPlan,
        )
    }

    /// Short interpretation of one reading. Falls back to the fixed message
    /// when the service fails or returns nothing.
    pub fn metric_advice(&self, entry: &MetricEntry) -> Advice {
        self.free_text(&PromptRequest::new(
            RequestKind::MetricAdvice,
            metric_context(entry),
            "",
        ))
    }

    /// Insight over the whole series of `kind`. An empty series is rejected
    /// before any request is made.
    pub fn trend_summary(
        &self,
        session: &SessionContext,
        kind: MetricKind,
    ) -> Result<Advice, AssistantError> {
        let digest = session
            .metrics
            .digest(kind)
            .ok_or(ValidationError::EmptySeries(kind.as_str()))?;
        Ok(self.free_text(&PromptRequest::new(
            RequestKind::TrendSummary,
            trend_context(&digest),
            "",
        )))
    }

    /// Render the session report. No model call is made.
    pub fn export_report(
        &self,
        session: &SessionContext,
        summary: Option<&str>,
    ) -> Result<Vec<u8>, AssistantError> {
        let bytes = report::render(session.profile(), &session.latest_metrics(), summary)?;
        tracing::info!(bytes = bytes.len(), "Report exported");
        Ok(bytes)
    }

    // ──────────────────────────────────────────────
    // Internals
    // ──────────────────────────────────────────────

    /// One completion call. A trailing stop sequence echoed by the service
    /// is removed from the returned text.
    fn call_model(&self, request: &PromptRequest) -> Result<String, CompletionError> {
        let model = self.models.model_for(request.kind);
        let span = tracing::info_span!("completion", kind = %request.kind, model = %model);
        let _guard = span.enter();

        let prompt = build_prompt(request);
        let start = Instant::now();
        match self.client.complete(model, &prompt, &self.params) {
            Ok(raw) => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    chars = raw.len(),
                    "Completion received"
                );
                Ok(self.params.strip_stop_sequence(&raw).to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Completion failed");
                Err(e)
            }
        }
    }

    fn free_text(&self, request: &PromptRequest) -> Advice {
        let Ok(raw) = self.call_model(request) else {
            return Advice::fallback();
        };
        match interpret_free_text(&raw) {
            Interpretation::FreeText { text, fallback } => Advice { text, fallback },
            Interpretation::Structured(_) => Advice::fallback(),
        }
    }

    /// Completion plus strict parse. Success is recorded in the per-kind
    /// history; rejected output only goes to the failure audit. A blank reply
    /// counts as a service failure and records nothing.
    fn structured<T: Clone>(
        &self,
        session: &mut SessionContext,
        request: &PromptRequest,
        input: &str,
        parse: impl Fn(&str) -> Result<T, InterpretError>,
        wrap: impl Fn(T) -> StructuredResponse,
    ) -> Result<T, AssistantError> {
        let kind = request.kind;
        let raw = self.call_model(request)?;
        if raw.trim().is_empty() {
            tracing::warn!(kind = %kind, "Completion was empty");
            return Err(CompletionError::EmptyResults.into());
        }
        match parse(&raw) {
            Ok(parsed) => {
                let id = session.structured.record(kind, input, wrap(parsed.clone()));
                tracing::info!(kind = %kind, exchange_id = %id, "Structured response recorded");
                Ok(parsed)
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Model output rejected");
                session
                    .structured
                    .record_failure(kind, input, e.raw(), &e.to_string());
                Err(e.into())
            }
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::test_profile;
    use crate::models::TurnRole;
    use crate::pipeline::client::MockCompletionClient;

    const ASSESSMENT: &str = r#"{"possible_conditions":[{"condition":"Flu","likelihood_percent":70,"notes":"fever"}],"next_steps":["rest"]}"#;
    const PLAN: &str = r#"{"medications":[{"name":"Salbutamol","dosage":"100 mcg","frequency":"as needed","notes":"inhaler"}],"lifestyle_changes":["Avoid smoke"],"follow_up":"Pulmonologist in 1 month","duration":"ongoing"}"#;

    fn assistant(reply: &str) -> HealthAssistant<MockCompletionClient> {
        HealthAssistant::new(MockCompletionClient::new(reply))
    }

    fn session_with_profile() -> SessionContext {
        let mut session = SessionContext::new();
        session.set_profile(test_profile());
        session
    }

    #[test]
    fn chat_success_records_both_turns() {
        let bot = assistant("  Stay hydrated and rest.  ");
        let mut session = session_with_profile();

        let reply = bot.chat(&mut session, "I feel tired").unwrap();
        assert_eq!(reply.text, "Stay hydrated and rest.");
        assert!(reply.persisted);

        let turns = session.conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].text, "Stay hydrated and rest.");

        let prompt = &bot.client().prompts()[0];
        assert!(prompt.contains("I feel tired"));
        assert!(prompt.contains("Ana Lima"));
    }

    #[test]
    fn chat_failure_keeps_user_turn_only() {
        let bot = HealthAssistant::new(MockCompletionClient::failing(CompletionError::Timeout(120)));
        let mut session = SessionContext::new();

        let reply = bot.chat(&mut session, "Is 140 mg/dL high?").unwrap();
        assert_eq!(reply.text, FALLBACK_MESSAGE);
        assert!(!reply.persisted);
        assert_eq!(session.conversation.len(), 1);
        assert_eq!(session.conversation.turns()[0].text, "Is 140 mg/dL high?");
    }

    #[test]
    fn chat_empty_output_is_not_persisted() {
        let bot = assistant("   ");
        let mut session = SessionContext::new();
        let reply = bot.chat(&mut session, "hello").unwrap();
        assert!(!reply.persisted);
        assert_eq!(session.conversation.len(), 1);
    }

    #[test]
    fn chat_blank_question_rejected_before_request() {
        let bot = assistant("unused");
        let mut session = SessionContext::new();
        let err = bot.chat(&mut session, "  ").unwrap_err();
        assert!(matches!(err, AssistantError::Validation(ValidationError::Required("question"))));
        assert!(session.conversation.is_empty());
        assert!(bot.client().prompts().is_empty());
    }

    #[test]
    fn chat_without_profile_uses_empty_marker() {
        let bot = assistant("ok");
        let mut session = SessionContext::new();
        bot.chat(&mut session, "hi").unwrap();
        assert!(bot.client().prompts()[0].contains("Patient Profile: {}"));
    }

    #[test]
    fn chat_prompt_carries_only_recent_prior_turns() {
        let bot = assistant("noted");
        let mut session = SessionContext::new();
        for i in 1..=4 {
            bot.chat(&mut session, &format!("question {i}")).unwrap();
        }
        bot.chat(&mut session, "question 5").unwrap();

        let last_prompt = bot.client().prompts().pop().unwrap();
        assert!(!last_prompt.contains("User: question 1"));
        assert!(last_prompt.contains("User: question 2"));
        assert!(last_prompt.contains("User: question 4"));
        assert!(!last_prompt.contains("User: question 5"));
        assert!(last_prompt.contains("User Question: \"question 5\""));
    }

    #[test]
    fn symptom_check_records_exchange() {
        let bot = assistant(ASSESSMENT);
        let mut session = session_with_profile();

        let assessment = bot.check_symptoms(&mut session, "fever and cough").unwrap();
        assert_eq!(assessment.possible_conditions[0].condition, "Flu");

        let recorded = session.structured.for_kind(RequestKind::SymptomCheck);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].input, "fever and cough");
        assert!(session.structured.failures().is_empty());
    }

    #[test]
    fn malformed_symptom_reply_goes_to_audit_only() {
        let bot = assistant("Sure! {condition: Flu}");
        let mut session = SessionContext::new();

        let err = bot.check_symptoms(&mut session, "fever").unwrap_err();
        assert!(matches!(err, AssistantError::MalformedModelOutput(_)));
        assert_eq!(err.to_string(), "Could not understand the AI response");
        assert!(session.structured.exchanges().is_empty());
        assert_eq!(session.structured.failures().len(), 1);
        assert_eq!(session.structured.failures()[0].raw, "Sure! {condition: Flu}");
    }

    #[test]
    fn blank_structured_reply_is_service_failure() {
        let bot = assistant("  \n ");
        let mut session = session_with_profile();

        let err = bot.check_symptoms(&mut session, "fever").unwrap_err();
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable(CompletionError::EmptyResults)
        ));
        let err = bot.plan_treatment(&mut session, "Asthma", "").unwrap_err();
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable(CompletionError::EmptyResults)
        ));

        assert!(session.structured.exchanges().is_empty());
        assert!(session.structured.failures().is_empty());
    }

    #[test]
    fn echoed_stop_sequence_is_not_stored() {
        let bot = assistant("Rest and drink fluids.\nUser:");
        let mut session = SessionContext::new();

        let reply = bot.chat(&mut session, "I have a cold").unwrap();
        assert_eq!(reply.text, "Rest and drink fluids.");
        assert_eq!(session.conversation.turns()[1].text, "Rest and drink fluids.");
    }

    #[test]
    fn service_failure_records_nothing() {
        let bot = HealthAssistant::new(MockCompletionClient::failing(CompletionError::Status {
            status: 503,
            body: "busy".into(),
        }));
        let mut session = SessionContext::new();

        let err = bot.check_symptoms(&mut session, "headache").unwrap_err();
        assert!(matches!(err, AssistantError::ServiceUnavailable(_)));
        assert!(session.structured.exchanges().is_empty());
        assert!(session.structured.failures().is_empty());
    }

    #[test]
    fn treatment_plan_uses_allergies_and_records() {
        let bot = assistant(PLAN);
        let mut session = session_with_profile();

        let plan = bot
            .plan_treatment(&mut session, "Asthma", "worse at night")
            .unwrap();
        assert_eq!(plan.medications[0].name, "Salbutamol");

        let prompt = &bot.client().prompts()[0];
        assert!(prompt.contains("Condition: Asthma"));
        assert!(prompt.contains("Known allergies: penicillin"));

        let recorded = session.structured.for_kind(RequestKind::TreatmentPlan);
        assert_eq!(recorded[0].input, "Asthma: worse at night");
    }

    #[test]
    fn treatment_plan_requires_condition() {
        let bot = assistant(PLAN);
        let mut session = SessionContext::new();
        assert!(bot.plan_treatment(&mut session, "", "details").is_err());
        assert!(bot.client().prompts().is_empty());
    }

    #[test]
    fn metric_advice_returns_text_or_fallback() {
        let entry = MetricEntry::blood_pressure(150, 95, now()).unwrap();

        let advice = assistant("Slightly elevated. Recheck tomorrow.").metric_advice(&entry);
        assert_eq!(advice.text, "Slightly elevated. Recheck tomorrow.");
        assert!(!advice.fallback);

        let failing = HealthAssistant::new(MockCompletionClient::failing(
            CompletionError::Connection("https://x".into()),
        ));
        let advice = failing.metric_advice(&entry);
        assert_eq!(advice.text, FALLBACK_MESSAGE);
        assert!(advice.fallback);
    }

    #[test]
    fn trend_summary_requires_readings() {
        let bot = assistant("Stable.");
        let session = SessionContext::new();
        let err = bot.trend_summary(&session, MetricKind::Glucose).unwrap_err();
        assert!(matches!(
            err,
            AssistantError::Validation(ValidationError::EmptySeries("glucose"))
        ));
        assert!(bot.client().prompts().is_empty());
    }

    #[test]
    fn trend_summary_embeds_digest() {
        let bot = assistant("Glucose is stable.");
        let mut session = SessionContext::new();
        session
            .metrics
            .backfill_glucose(&[90.0, 105.0, 88.0], now())
            .unwrap();

        let advice = bot.trend_summary(&session, MetricKind::Glucose).unwrap();
        assert_eq!(advice.text, "Glucose is stable.");
        assert!(bot.client().prompts()[0].contains("3 readings"));
    }

    #[test]
    fn invalid_profile_keeps_previous() {
        let bot = assistant("unused");
        let mut session = session_with_profile();
        let form = ProfileForm {
            name: "".into(),
            age: 40,
            height_cm: 180.0,
            weight_kg: 80.0,
            ..ProfileForm::default()
        };
        assert!(bot.save_profile(&mut session, form).is_err());
        assert_eq!(session.profile().map(Profile::name), Some("Ana Lima"));
    }

    #[test]
    fn invalid_reading_not_logged() {
        let bot = assistant("unused");
        let mut session = SessionContext::new();
        assert!(bot.log_blood_pressure(&mut session, 80, 120, None).is_err());
        assert!(bot.log_glucose(&mut session, -5.0, None).is_err());
        assert!(session.metrics.is_empty());

        bot.log_asthma(&mut session, "dust", 4, None).unwrap();
        assert_eq!(session.metrics.len(), 1);
    }

    #[test]
    fn export_report_renders_pdf() {
        let bot = assistant("unused");
        let mut session = session_with_profile();
        bot.log_glucose(&mut session, 98.0, None).unwrap();
        let bytes = bot.export_report(&session, Some("All good.")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bot.client().prompts().is_empty());
    }
}
