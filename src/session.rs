//! Per-session state: profile, metric log, conversation and structured
//! history. Created at session start and passed explicitly to every
//! operation; nothing is shared between sessions.

use crate::metrics::MetricLog;
use crate::models::{MetricEntry, MetricKind, Profile};
use crate::pipeline::history::{ConversationHistory, StructuredHistory};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    profile: Option<Profile>,
    pub metrics: MetricLog,
    pub conversation: ConversationHistory,
    pub structured: StructuredHistory,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_profile_complete(&self) -> bool {
        self.profile.is_some()
    }

    /// Replace the whole profile. Only validated profiles reach this point.
    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
    }

    /// Latest reading of each tracked metric, in display order.
    pub fn latest_metrics(&self) -> Vec<(MetricKind, Option<&MetricEntry>)> {
        [MetricKind::Glucose, MetricKind::BloodPressure, MetricKind::Asthma]
            .into_iter()
            .map(|kind| (kind, self.metrics.latest(kind)))
            .collect()
    }

    /// Clear profile, metrics and all history. Idempotent.
    pub fn reset(&mut self) {
        self.profile = None;
        self.metrics.clear();
        self.conversation.clear();
        self.structured.clear();
        tracing::info!("Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::test_profile;
    use crate::models::ConversationTurn;
    use crate::pipeline::types::{RequestKind, StructuredResponse, SymptomAssessment};
    use chrono::Local;

    fn populated() -> SessionContext {
        let mut session = SessionContext::new();
        session.set_profile(test_profile());
        let now = Local::now().naive_local();
        session.metrics.append(MetricEntry::glucose(98.0, now).unwrap());
        session.metrics.append(MetricEntry::blood_pressure(128, 84, now).unwrap());
        session.conversation.append(ConversationTurn::user("hello"));
        session.structured.record(
            RequestKind::SymptomCheck,
            "cough",
            StructuredResponse::SymptomAssessment(SymptomAssessment {
                possible_conditions: vec![],
                next_steps: vec![],
            }),
        );
        session
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut session = populated();
        assert_ne!(session, SessionContext::new());
        session.reset();
        assert_eq!(session, SessionContext::new());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut session = populated();
        session.reset();
        session.reset();
        assert_eq!(session, SessionContext::new());
        assert!(!session.is_profile_complete());
    }

    #[test]
    fn latest_metrics_reports_missing_kinds() {
        let session = populated();
        let latest = session.latest_metrics();
        assert_eq!(latest.len(), 3);
        assert!(latest[0].1.is_some());
        assert!(latest[1].1.is_some());
        assert_eq!(latest[2].0, MetricKind::Asthma);
        assert!(latest[2].1.is_none());
    }
}
