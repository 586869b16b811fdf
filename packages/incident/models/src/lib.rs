#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident record types and danger weight definitions.
//!
//! This crate defines the canonical incident representation used across the
//! saferoute system, the coarse time-of-day buckets, and the category /
//! time-of-day weight tables that every danger computation draws from. The
//! weight tables are the single place these constants live; nothing else in
//! the workspace hardcodes a category name or a severity value.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Coarse time-of-day bucket derived from the hour of an event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeBucket {
    /// 06:00–11:59
    Morning,
    /// 12:00–17:59
    Afternoon,
    /// 18:00–21:59
    Evening,
    /// 22:00–05:59
    Night,
}

impl TimeBucket {
    /// Fixed ordering used wherever buckets are one-hot encoded. The encoder
    /// vocabulary at inference must match training exactly, so this array is
    /// the only source of the ordering.
    pub const ALL: [Self; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    /// Maps an hour of day (0–23) to its bucket. Total over all hours, so an
    /// out-of-vocabulary bucket cannot occur downstream.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Position of this bucket within [`Self::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|b| *b == self).unwrap_or(0)
    }
}

/// One historical incident with its temporal fields derived at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at: NaiveDateTime,
    /// Open category string; unknown values resolve to the default weight.
    pub category: String,
    /// Hour of day, 0–23.
    pub hour: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub day_of_week: u32,
    /// Month, 1–12.
    pub month: u32,
    pub bucket: TimeBucket,
}

impl Incident {
    /// Builds an incident, deriving the temporal fields from `occurred_at`
    /// once so per-query code never recomputes them.
    #[must_use]
    pub fn new(
        latitude: f64,
        longitude: f64,
        occurred_at: NaiveDateTime,
        category: String,
    ) -> Self {
        let hour = occurred_at.hour();
        Self {
            latitude,
            longitude,
            category,
            hour,
            day_of_week: occurred_at.weekday().num_days_from_monday(),
            month: occurred_at.month(),
            bucket: TimeBucket::from_hour(hour),
            occurred_at,
        }
    }
}

/// Categories counted as violent for aggregate tables and evaluation.
///
/// One configuration constant; no other module carries its own list.
pub const VIOLENT_CATEGORIES: [&str; 6] = [
    "Murder",
    "Rape",
    "Robbery",
    "Molestation",
    "Kidnapping",
    "Assault",
];

/// Returns whether a category belongs to the violent set.
#[must_use]
pub fn is_violent(category: &str) -> bool {
    VIOLENT_CATEGORIES.contains(&category)
}

/// Per-category severity weights in [0, 1]. Categories absent from the table
/// fall back to [`SeverityWeights::default_weight`], never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    weights: BTreeMap<String, f64>,
    default_weight: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        let weights = [
            ("Theft", 0.5),
            ("Robbery", 0.8),
            ("Assault", 0.9),
            ("Murder", 1.0),
            ("Harassment", 0.6),
            ("Vehicle Theft", 0.7),
            ("Burglary", 0.7),
            ("Drug Related", 0.6),
            ("Fraud", 0.4),
            ("Molestation", 0.9),
            ("Kidnapping", 0.9),
            ("Rape", 1.0),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            weights,
            default_weight: 0.5,
        }
    }
}

impl SeverityWeights {
    /// Weight for a category, falling back to the default for unknown names.
    #[must_use]
    pub fn weight(&self, category: &str) -> f64 {
        self.weights
            .get(category)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// The fallback weight applied to categories outside the table.
    #[must_use]
    pub const fn default_weight(&self) -> f64 {
        self.default_weight
    }
}

/// Per-bucket time-of-day weights; night carries the most danger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWeights {
    pub morning: f64,
    pub afternoon: f64,
    pub evening: f64,
    pub night: f64,
}

impl Default for TimeWeights {
    fn default() -> Self {
        Self {
            morning: 0.6,
            afternoon: 0.4,
            evening: 0.7,
            night: 1.0,
        }
    }
}

impl TimeWeights {
    /// Weight for a bucket.
    #[must_use]
    pub const fn weight(&self, bucket: TimeBucket) -> f64 {
        match bucket {
            TimeBucket::Morning => self.morning,
            TimeBucket::Afternoon => self.afternoon,
            TimeBucket::Evening => self.evening,
            TimeBucket::Night => self.night,
        }
    }
}

/// The canonical continuous training target for one incident:
/// category severity times time-of-day weight. Both factors are in [0, 1] so
/// the product is too, which is what lets it compose with the local-influence
/// blend without recalibration.
#[must_use]
pub fn danger_target(incident: &Incident, severity: &SeverityWeights, time: &TimeWeights) -> f64 {
    severity.weight(&incident.category) * time.weight(incident.bucket)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    #[test]
    fn buckets_cover_every_hour() {
        assert_eq!(TimeBucket::from_hour(6), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_hour(11), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_hour(12), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::from_hour(18), TimeBucket::Evening);
        assert_eq!(TimeBucket::from_hour(21), TimeBucket::Evening);
        assert_eq!(TimeBucket::from_hour(22), TimeBucket::Night);
        assert_eq!(TimeBucket::from_hour(0), TimeBucket::Night);
        assert_eq!(TimeBucket::from_hour(5), TimeBucket::Night);
    }

    #[test]
    fn bucket_index_matches_all_ordering() {
        for (i, bucket) in TimeBucket::ALL.iter().enumerate() {
            assert_eq!(bucket.index(), i);
        }
    }

    #[test]
    fn derives_temporal_fields_at_construction() {
        // 2024-03-15 is a Friday
        let incident = Incident::new(18.52, 73.85, at(23), "Robbery".to_string());
        assert_eq!(incident.hour, 23);
        assert_eq!(incident.day_of_week, 4);
        assert_eq!(incident.month, 3);
        assert_eq!(incident.bucket, TimeBucket::Night);
    }

    #[test]
    fn unknown_category_gets_default_weight() {
        let weights = SeverityWeights::default();
        assert!((weights.weight("Jaywalking") - weights.default_weight()).abs() < f64::EPSILON);
    }

    #[test]
    fn violent_set_matches_severity_table() {
        let weights = SeverityWeights::default();
        for category in VIOLENT_CATEGORIES {
            assert!(weights.weight(category) >= 0.8, "{category} should be severe");
        }
    }

    #[test]
    fn danger_target_is_bounded() {
        let severity = SeverityWeights::default();
        let time = TimeWeights::default();
        let incident = Incident::new(18.52, 73.85, at(2), "Murder".to_string());
        let target = danger_target(&incident, &severity, &time);
        assert!((0.0..=1.0).contains(&target));
        assert!((target - 1.0).abs() < f64::EPSILON);
    }
}
