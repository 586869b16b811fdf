//! The single feature schema shared by training and inference.
//!
//! Every feature matrix row and every inference-time vector is produced by
//! [`FeatureSchema::encode`]. There is deliberately no second encoding path:
//! a train/infer mismatch in field order or categorical vocabulary is the
//! classic failure mode for this kind of model, and routing both sides
//! through one function makes it structurally impossible.

use chrono::{Datelike, NaiveDateTime, Timelike};
use saferoute_incident_models::TimeBucket;
use serde::{Deserialize, Serialize};

use crate::aggregates::AggregateTables;

/// Version tag for the canonical cluster-joined feature layout. Bumped on
/// any change to the field list, order, or encoding.
pub const SCHEMA_VERSION: &str = "cluster-joined-v1";

/// Ordered feature layout. Stored in the bundle and verified at load time, so
/// a bundle trained against a different layout is rejected before serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    version: String,
    fields: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

impl FeatureSchema {
    /// The canonical schema: raw coordinates, temporal fields, cluster id,
    /// cluster-joined aggregate counts, hotspot distance, and the one-hot
    /// time bucket in [`TimeBucket::ALL`] order.
    #[must_use]
    pub fn canonical() -> Self {
        let mut fields: Vec<String> = [
            "latitude",
            "longitude",
            "hour",
            "day_of_week",
            "month",
            "cluster",
            "cluster_hour_count",
            "cluster_weekday_count",
            "cluster_month_violent",
            "hotspot_distance",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        for bucket in TimeBucket::ALL {
            fields.push(format!("bucket_{bucket}"));
        }

        Self {
            version: SCHEMA_VERSION.to_string(),
            fields,
        }
    }

    /// Number of features per vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Ordered feature names.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Encodes one (point, time) query into a feature vector.
    ///
    /// `cluster` is the point's assigned cluster; the aggregate counts are
    /// joined from that cluster's row. Deterministic pure function of its
    /// inputs.
    #[must_use]
    pub fn encode(
        &self,
        lat: f64,
        lng: f64,
        at: NaiveDateTime,
        cluster: usize,
        aggregates: &AggregateTables,
        hotspot: [f64; 2],
    ) -> Vec<f64> {
        let hour = at.hour();
        let day_of_week = at.weekday().num_days_from_monday();
        let month = at.month();
        let bucket = TimeBucket::from_hour(hour);

        let d_lat = lat - hotspot[0];
        let d_lng = lng - hotspot[1];
        let hotspot_distance = d_lat.mul_add(d_lat, d_lng * d_lng).sqrt();

        let mut features = Vec::with_capacity(self.len());
        features.push(lat);
        features.push(lng);
        features.push(f64::from(hour));
        features.push(f64::from(day_of_week));
        features.push(f64::from(month));
        features.push(cluster as f64);
        features.push(f64::from(aggregates.hour_count(cluster, hour)));
        features.push(f64::from(aggregates.weekday_count(cluster, day_of_week)));
        features.push(f64::from(aggregates.month_violent(cluster, month)));
        features.push(hotspot_distance);
        for candidate in TimeBucket::ALL {
            features.push(if candidate == bucket { 1.0 } else { 0.0 });
        }

        debug_assert_eq!(features.len(), self.len());
        features
    }
}
