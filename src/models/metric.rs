use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::MetricKind;
use super::{check_range, ValidationError};

pub const GLUCOSE_RANGE: (f64, f64) = (1.0, 1000.0);
pub const SYSTOLIC_RANGE: (u16, u16) = (50, 250);
pub const DIASTOLIC_RANGE: (u16, u16) = (30, 150);
pub const SEVERITY_RANGE: (u8, u8) = (1, 10);

/// A single logged health reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricEntry {
    Glucose {
        value: f64,
        recorded_at: NaiveDateTime,
    },
    BloodPressure {
        systolic: u16,
        diastolic: u16,
        recorded_at: NaiveDateTime,
    },
    AsthmaEpisode {
        triggers: String,
        severity: u8,
        recorded_at: NaiveDateTime,
    },
}

impl MetricEntry {
    pub fn glucose(value: f64, recorded_at: NaiveDateTime) -> Result<Self, ValidationError> {
        check_range("glucose", value, GLUCOSE_RANGE.0, GLUCOSE_RANGE.1)?;
        Ok(MetricEntry::Glucose { value, recorded_at })
    }

    pub fn blood_pressure(
        systolic: u16,
        diastolic: u16,
        recorded_at: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        check_range(
            "systolic",
            f64::from(systolic),
            f64::from(SYSTOLIC_RANGE.0),
            f64::from(SYSTOLIC_RANGE.1),
        )?;
        check_range(
            "diastolic",
            f64::from(diastolic),
            f64::from(DIASTOLIC_RANGE.0),
            f64::from(DIASTOLIC_RANGE.1),
        )?;
        if systolic <= diastolic {
            return Err(ValidationError::PressureInverted {
                systolic,
                diastolic,
            });
        }
        Ok(MetricEntry::BloodPressure {
            systolic,
            diastolic,
            recorded_at,
        })
    }

    pub fn asthma_episode(
        triggers: &str,
        severity: u8,
        recorded_at: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        check_range(
            "severity",
            f64::from(severity),
            f64::from(SEVERITY_RANGE.0),
            f64::from(SEVERITY_RANGE.1),
        )?;
        Ok(MetricEntry::AsthmaEpisode {
            triggers: triggers.trim().to_string(),
            severity,
            recorded_at,
        })
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricEntry::Glucose { .. } => MetricKind::Glucose,
            MetricEntry::BloodPressure { .. } => MetricKind::BloodPressure,
            MetricEntry::AsthmaEpisode { .. } => MetricKind::Asthma,
        }
    }

    pub fn recorded_at(&self) -> NaiveDateTime {
        match self {
            MetricEntry::Glucose { recorded_at, .. }
            | MetricEntry::BloodPressure { recorded_at, .. }
            | MetricEntry::AsthmaEpisode { recorded_at, .. } => *recorded_at,
        }
    }

    /// Primary numeric value used for trend statistics
    /// (glucose value, systolic pressure, asthma severity).
    pub fn primary_value(&self) -> f64 {
        match self {
            MetricEntry::Glucose { value, .. } => *value,
            MetricEntry::BloodPressure { systolic, .. } => f64::from(*systolic),
            MetricEntry::AsthmaEpisode { severity, .. } => f64::from(*severity),
        }
    }

    /// Short human-readable reading, e.g. "120/80 mmHg".
    pub fn reading(&self) -> String {
        match self {
            MetricEntry::Glucose { value, .. } => format!("{value} mg/dL"),
            MetricEntry::BloodPressure {
                systolic,
                diastolic,
                ..
            } => format!("{systolic}/{diastolic} mmHg"),
            MetricEntry::AsthmaEpisode {
                triggers, severity, ..
            } => {
                if triggers.is_empty() {
                    format!("severity {severity}/10")
                } else {
                    format!("severity {severity}/10, triggers: {triggers}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn glucose_in_range_accepted() {
        let entry = MetricEntry::glucose(105.0, at()).unwrap();
        assert_eq!(entry.kind(), MetricKind::Glucose);
        assert_eq!(entry.reading(), "105 mg/dL");
    }

    #[test]
    fn glucose_zero_rejected() {
        assert!(MetricEntry::glucose(0.0, at()).is_err());
        assert!(MetricEntry::glucose(f64::INFINITY, at()).is_err());
    }

    #[test]
    fn blood_pressure_reading() {
        let entry = MetricEntry::blood_pressure(120, 80, at()).unwrap();
        assert_eq!(entry.reading(), "120/80 mmHg");
        assert!((entry.primary_value() - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_pressure_rejected() {
        let err = MetricEntry::blood_pressure(80, 120, at()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::PressureInverted {
                systolic: 80,
                diastolic: 120
            }
        );
    }

    #[test]
    fn asthma_severity_bounds() {
        assert!(MetricEntry::asthma_episode("pollen", 0, at()).is_err());
        assert!(MetricEntry::asthma_episode("pollen", 11, at()).is_err());
        let entry = MetricEntry::asthma_episode("  pollen ", 6, at()).unwrap();
        assert_eq!(entry.reading(), "severity 6/10, triggers: pollen");
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = MetricEntry::blood_pressure(130, 85, at()).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "blood_pressure");
        assert_eq!(json["systolic"], 130);
    }
}
