#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::multiple_crate_versions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

//! The spatial-temporal risk model.
//!
//! Training turns an incident store snapshot into an atomic, versioned
//! [`ModelBundle`]: fitted k-means clustering, per-cluster aggregate tables,
//! a standard scaler, a random-forest regressor over the shared feature
//! schema, and the weight tables. Inference applies the bundle to a
//! (point, time) query and blends a local-influence term computed from
//! nearby incidents, yielding a danger probability in [0, 1].

pub mod aggregates;
pub mod bundle;
pub mod forest;
pub mod kmeans;
pub mod scaler;
pub mod schema;
pub mod train;

pub use aggregates::AggregateTables;
pub use bundle::{BUNDLE_VERSION, InfluenceConfig, ModelBundle};
pub use forest::{ForestConfig, RandomForestRegressor};
pub use kmeans::KMeans;
pub use scaler::StandardScaler;
pub use schema::{FeatureSchema, SCHEMA_VERSION};
pub use train::{Evaluation, TrainConfig, train};

/// Error raised during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// The store has fewer rows than the requested cluster count. Surfaced
    /// before any artifact is produced.
    #[error("insufficient data for requested cluster count: {rows} rows, {clusters} clusters")]
    InsufficientData {
        /// Rows available in the store.
        rows: usize,
        /// Requested cluster count.
        clusters: usize,
    },
}

/// Error raised while serializing, deserializing, or validating a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MessagePack encoding failed.
    #[error("bundle encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("bundle decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The bundle was written by an incompatible build.
    #[error("bundle version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found in the serialized bundle.
        found: u32,
        /// Version this build requires.
        expected: u32,
    },

    /// The bundle's feature schema does not match this build's schema.
    #[error("feature schema mismatch: found {found}, expected {expected}")]
    SchemaMismatch {
        /// Schema description found in the bundle.
        found: String,
        /// Schema description this build requires.
        expected: String,
    },
}
