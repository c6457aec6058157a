//! Append-only health readings and trend digests.
//!
//! Readings are kept in insertion order, which is also chronological order.
//! Nothing is ever reordered, deduplicated, edited or removed individually;
//! the only bulk operation is `clear()` on session reset.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::{MetricEntry, MetricKind, ValidationError};

/// Append-only log of every reading in the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricLog {
    entries: Vec<MetricEntry>,
}

impl MetricLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: MetricEntry) {
        tracing::debug!(kind = %entry.kind(), "Metric appended");
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MetricEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All readings of one kind, in insertion order.
    pub fn series(&self, kind: MetricKind) -> Vec<&MetricEntry> {
        self.entries.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Most recent reading of one kind.
    pub fn latest(&self, kind: MetricKind) -> Option<&MetricEntry> {
        self.entries.iter().rev().find(|e| e.kind() == kind)
    }

    /// Seed a glucose series with synthetic dates, oldest first, the last
    /// value landing on `now`.
    pub fn backfill_glucose(
        &mut self,
        values: &[f64],
        now: NaiveDateTime,
    ) -> Result<(), ValidationError> {
        let stamps = backfill_timestamps(values.len(), now);
        // Validate the whole batch before appending anything.
        let entries = values
            .iter()
            .zip(stamps)
            .map(|(value, at)| MetricEntry::glucose(*value, at))
            .collect::<Result<Vec<_>, _>>()?;
        for entry in entries {
            self.append(entry);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Statistical digest of one series. `None` when nothing is logged.
    pub fn digest(&self, kind: MetricKind) -> Option<SeriesDigest> {
        let values: Vec<f64> = self
            .series(kind)
            .iter()
            .map(|e| e.primary_value())
            .collect();
        SeriesDigest::from_values(kind, &values)
    }
}

/// `now - (count - 1 - i)` days for i in 0..count.
pub fn backfill_timestamps(count: usize, now: NaiveDateTime) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|i| now - Duration::days((count - 1 - i) as i64))
        .collect()
}

/// Count / mean / min / max summary of a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDigest {
    pub kind: MetricKind,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
}

impl SeriesDigest {
    pub fn from_values(kind: MetricKind, values: &[f64]) -> Option<Self> {
        let latest = *values.last()?;
        let count = values.len();
        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            kind,
            count,
            mean: sum / count as f64,
            min,
            max,
            latest,
        })
    }

    /// Text digest embedded in trend prompts.
    pub fn describe(&self) -> String {
        let unit = self.kind.unit();
        format!(
            "{label}: {count} readings, mean {mean:.1} {unit}, min {min:.1} {unit}, max {max:.1} {unit}, latest {latest:.1} {unit}",
            label = self.kind.label(),
            count = self.count,
            mean = self.mean,
            min = self.min,
            max = self.max,
            latest = self.latest,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn glucose_values(log: &MetricLog) -> Vec<f64> {
        log.series(MetricKind::Glucose)
            .iter()
            .map(|e| e.primary_value())
            .collect()
    }

    #[test]
    fn append_preserves_order_without_dedup() {
        let mut log = MetricLog::new();
        for v in [90.0, 105.0, 88.0] {
            log.append(MetricEntry::glucose(v, now()).unwrap());
        }
        assert_eq!(log.len(), 3);
        assert_eq!(glucose_values(&log), vec![90.0, 105.0, 88.0]);

        log.append(MetricEntry::glucose(90.0, now()).unwrap());
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn latest_per_kind() {
        let mut log = MetricLog::new();
        log.append(MetricEntry::glucose(90.0, now()).unwrap());
        log.append(MetricEntry::blood_pressure(120, 80, now()).unwrap());
        log.append(MetricEntry::glucose(101.0, now()).unwrap());

        let latest = log.latest(MetricKind::Glucose).unwrap();
        assert!((latest.primary_value() - 101.0).abs() < f64::EPSILON);
        assert!(log.latest(MetricKind::Asthma).is_none());
    }

    #[test]
    fn backfill_dates_are_chronological() {
        let stamps = backfill_timestamps(3, now());
        assert_eq!(stamps[2], now());
        assert_eq!(stamps[0], now() - Duration::days(2));
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn backfill_rejects_batch_atomically() {
        let mut log = MetricLog::new();
        let result = log.backfill_glucose(&[95.0, -4.0, 100.0], now());
        assert!(result.is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn backfill_appends_in_order() {
        let mut log = MetricLog::new();
        log.backfill_glucose(&[95.0, 110.0], now()).unwrap();
        assert_eq!(glucose_values(&log), vec![95.0, 110.0]);
        assert_eq!(log.entries()[1].recorded_at(), now());
    }

    #[test]
    fn digest_statistics() {
        let digest = SeriesDigest::from_values(MetricKind::Glucose, &[90.0, 105.0, 88.0]).unwrap();
        assert_eq!(digest.count, 3);
        assert!((digest.mean - 94.333_333).abs() < 1e-4);
        assert!((digest.min - 88.0).abs() < f64::EPSILON);
        assert!((digest.max - 105.0).abs() < f64::EPSILON);
        assert!((digest.latest - 88.0).abs() < f64::EPSILON);
        assert!(digest.describe().contains("3 readings, mean 94.3 mg/dL"));
    }

    #[test]
    fn digest_of_empty_series_is_none() {
        assert!(MetricLog::new().digest(MetricKind::Glucose).is_none());
    }

    #[test]
    fn clear_empties_log() {
        let mut log = MetricLog::new();
        log.append(MetricEntry::glucose(90.0, now()).unwrap());
        log.clear();
        assert!(log.is_empty());
    }
}
