//! The atomic, versioned bundle of trained artifacts, and inference over it.
//!
//! The clustering model, scaler, forest, aggregate tables, hotspot reference
//! point, and weight tables are serialized and loaded as one value; loading a
//! partial or mismatched set is impossible by construction, and version or
//! schema drift is rejected before any prediction is served.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use saferoute_incident::{IncidentStore, hour_within_window};
use saferoute_incident_models::{SeverityWeights, TimeWeights, danger_target};
use saferoute_spatial::IncidentIndex;
use serde::{Deserialize, Serialize};

use crate::BundleError;
use crate::aggregates::AggregateTables;
use crate::forest::RandomForestRegressor;
use crate::kmeans::KMeans;
use crate::scaler::StandardScaler;
use crate::schema::FeatureSchema;

/// Bundle format version. Bumped on any breaking change to the artifact set.
pub const BUNDLE_VERSION: u32 = 1;

/// Tunables for the local-influence blend applied on top of the base model
/// prediction. The blend reacts sharply to nearby incident clusters that the
/// global model may under-weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceConfig {
    /// Whether the blend is applied at all.
    pub enabled: bool,
    /// Radius of the neighborhood query, in degrees (~0.005 is 500 m).
    pub radius: f64,
    /// Incidents count only if their hour is within this window of the
    /// query hour (wrapping midnight).
    pub hour_window: u32,
    /// Scaling factor applied to the averaged influence.
    pub scale: f64,
    /// Weight of the base model prediction in the final score.
    pub model_weight: f64,
    /// Weight of the local influence term in the final score.
    pub local_weight: f64,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 0.005,
            hour_window: 2,
            scale: 3.0,
            model_weight: 0.7,
            local_weight: 0.3,
        }
    }
}

/// All trained artifacts as one atomic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub version: u32,
    pub schema: FeatureSchema,
    pub kmeans: KMeans,
    pub scaler: StandardScaler,
    pub forest: RandomForestRegressor,
    pub aggregates: AggregateTables,
    /// Fixed reference coordinate of the densest cluster, used as the
    /// hotspot-distance feature.
    pub hotspot: [f64; 2],
    pub severity_weights: SeverityWeights,
    pub time_weights: TimeWeights,
    pub influence: InfluenceConfig,
}

impl ModelBundle {
    /// Serializes the bundle to MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BundleError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserializes and validates a bundle from MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the bundle's version or feature
    /// schema does not match this build.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        let bundle: Self = rmp_serde::from_slice(bytes)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Writes the bundle to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BundleError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        rmp_serde::encode::write_named(&mut writer, self)?;
        Ok(())
    }

    /// Loads and validates a bundle from a file. Fatal on any mismatch,
    /// before any serving begins.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails, or the version/schema
    /// does not match this build.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path.as_ref())?).read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    fn validate(&self) -> Result<(), BundleError> {
        if self.version != BUNDLE_VERSION {
            return Err(BundleError::VersionMismatch {
                found: self.version,
                expected: BUNDLE_VERSION,
            });
        }
        let canonical = FeatureSchema::canonical();
        if self.schema != canonical {
            return Err(BundleError::SchemaMismatch {
                found: self.schema.version().to_string(),
                expected: canonical.version().to_string(),
            });
        }
        if self.scaler.len() != self.schema.len() {
            return Err(BundleError::SchemaMismatch {
                found: format!("scaler fitted on {} features", self.scaler.len()),
                expected: format!("{} features", self.schema.len()),
            });
        }
        Ok(())
    }

    /// Danger probability in [0, 1] for a (point, time) query.
    ///
    /// Base model prediction blended with the local-influence term, clipped.
    /// Pure and deterministic for a fixed bundle, store, and index.
    #[must_use]
    pub fn predict(
        &self,
        lat: f64,
        lng: f64,
        at: NaiveDateTime,
        store: &IncidentStore,
        index: &IncidentIndex,
    ) -> f64 {
        let cluster = self.kmeans.predict(lat, lng);
        let features = self
            .schema
            .encode(lat, lng, at, cluster, &self.aggregates, self.hotspot);
        let base = self.forest.predict(&self.scaler.transform(&features));

        if !self.influence.enabled {
            return base.clamp(0.0, 1.0);
        }

        let local = self.local_influence(lat, lng, at, store, index);
        (self.influence.model_weight * base + self.influence.local_weight * local).clamp(0.0, 1.0)
    }

    /// Nonparametric neighborhood term: for each incident within the radius
    /// whose hour falls inside the window, proximity (linear decay 1 -> 0
    /// over the radius) times its severity and time-bucket weights, averaged
    /// and scaled.
    fn local_influence(
        &self,
        lat: f64,
        lng: f64,
        at: NaiveDateTime,
        store: &IncidentStore,
        index: &IncidentIndex,
    ) -> f64 {
        let mut total = 0.0_f64;
        let mut count = 0_usize;

        for id in index.query_radius(lat, lng, self.influence.radius) {
            let Some(incident) = store.get(id) else {
                continue;
            };
            if !hour_within_window(incident.hour, at.hour(), self.influence.hour_window) {
                continue;
            }

            let d_lat = incident.latitude - lat;
            let d_lng = incident.longitude - lng;
            let distance = d_lat.mul_add(d_lat, d_lng * d_lng).sqrt();
            let proximity = (1.0 - distance / self.influence.radius).max(0.0);

            total += proximity * danger_target(incident, &self.severity_weights, &self.time_weights);
            count += 1;
        }

        if count == 0 {
            return 0.0;
        }
        (total / count as f64) * self.influence.scale
    }
}
