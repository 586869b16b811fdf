#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CSV incident loading and the immutable in-memory incident store.
//!
//! The loader is skip-don't-fail: rows with unparseable timestamps or missing
//! coordinates are counted and dropped, and loading only errors when no valid
//! rows remain. A loaded store never changes; refreshing the dataset means
//! loading a new store and swapping it in at the serving layer.

pub mod parsing;

use std::path::Path;

use saferoute_incident_models::Incident;
use serde::Deserialize;

/// Error raised while loading an incident dataset.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed at the file level.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Every row was dropped; an empty store cannot serve.
    #[error("empty incident store: all {skipped} rows were skipped")]
    Empty {
        /// Number of rows dropped during the load.
        skipped: usize,
    },
}

/// One raw row of the tabular incident export.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Latitude")]
    latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    longitude: Option<f64>,
    #[serde(rename = "Date", default)]
    date: String,
    #[serde(rename = "Time", default)]
    time: String,
    #[serde(rename = "Crime Type", default)]
    crime_type: Option<String>,
}

/// Immutable snapshot of the historical incident dataset.
///
/// Input to clustering, training, and the spatial index. Incident ids are
/// positions in [`Self::all`]; the spatial index and aggregate tables refer
/// to incidents by those ids.
#[derive(Debug, Clone)]
pub struct IncidentStore {
    incidents: Vec<Incident>,
    skipped: usize,
}

impl IncidentStore {
    /// Loads incidents from a CSV file with columns
    /// {Latitude, Longitude, Date, Time, "Crime Type"}.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if no valid rows
    /// remain after skipping malformed ones.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut incidents = Vec::new();
        let mut skipped = 0;

        for row in reader.deserialize::<RawRow>() {
            let Ok(row) = row else {
                skipped += 1;
                continue;
            };

            let Some((latitude, longitude)) = parsing::parse_lat_lng(row.latitude, row.longitude)
            else {
                skipped += 1;
                continue;
            };

            let Some(occurred_at) = parsing::parse_timestamp(&row.date, &row.time) else {
                skipped += 1;
                continue;
            };

            let category = match row.crime_type {
                Some(value) if !value.trim().is_empty() => value.trim().to_string(),
                _ => "Other".to_string(),
            };

            incidents.push(Incident::new(latitude, longitude, occurred_at, category));
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {skipped} malformed incident rows ({} loaded)",
                incidents.len()
            );
        }

        Self::from_incidents(incidents, skipped)
    }

    /// Builds a store from already-constructed incidents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Empty`] if `incidents` is empty.
    pub fn from_incidents(incidents: Vec<Incident>, skipped: usize) -> Result<Self, StoreError> {
        if incidents.is_empty() {
            return Err(StoreError::Empty { skipped });
        }
        Ok(Self { incidents, skipped })
    }

    /// All incidents, in load order. Positions are the incident ids used by
    /// the spatial index.
    #[must_use]
    pub fn all(&self) -> &[Incident] {
        &self.incidents
    }

    /// Incident by id.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Incident> {
        self.incidents.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Number of rows dropped during the load.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Returns whether `hour` falls within `window` hours of `center`, handling
/// the midnight wraparound (23:00 with a 2 hour window spans 21:00–01:00).
#[must_use]
pub const fn hour_within_window(hour: u32, center: u32, window: u32) -> bool {
    let lo = (center + 24 - window) % 24;
    let hi = (center + window) % 24;
    if lo <= hi {
        hour >= lo && hour <= hi
    } else {
        hour >= lo || hour <= hi
    }
}
