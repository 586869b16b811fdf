#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cast_precision_loss)]

//! Route danger scoring and ranking.
//!
//! Candidate routes arrive already decoded from the external routing
//! provider; this crate walks each polyline, predicts a per-point danger via
//! the model bundle, aggregates the points into one route-level score, and
//! orders the candidates safest first. Routes are read-only inputs; scoring
//! never mutates them.

pub mod scorer;
pub mod serving;

pub use scorer::{ScoringOptions, aggregate_mean, aggregate_weighted};
pub use serving::{ServingState, SharedServingState};

use serde::{Deserialize, Serialize};

/// One turn-by-turn step as supplied by the routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub instruction: String,
    pub distance: String,
    /// `(lat, lng)` of the step's end point.
    pub location: (f64, f64),
}

/// A decoded candidate route with its provider metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Ordered `(lat, lng)` pairs along the path.
    pub coordinates: Vec<(f64, f64)>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Per-leg duration breakdown, one entry per coordinate pair, when the
    /// provider supplies it.
    #[serde(default)]
    pub leg_durations: Option<Vec<f64>>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Route {
    /// Haversine length of the polyline in meters. Fallback when the
    /// provider's `distance_meters` metadata is absent (zero).
    #[must_use]
    pub fn path_length_meters(&self) -> f64 {
        use geo::{Distance, Haversine, Point};

        self.coordinates
            .windows(2)
            .map(|pair| {
                let a = Point::new(pair[0].1, pair[0].0);
                let b = Point::new(pair[1].1, pair[1].0);
                Haversine.distance(a, b)
            })
            .sum()
    }
}

/// A route annotated with its danger score, as returned to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRoute {
    /// Position of the route in the original candidate list.
    pub id: usize,
    /// Danger as a percentage, rounded to two decimals (wire convention).
    pub danger: f64,
    /// Raw danger score in [0, 1]; the ranking key.
    pub score: f64,
    #[serde(flatten)]
    pub route: Route,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_length_roughly_matches_known_distance() {
        // ~1.11 km per 0.01 degrees of latitude.
        let route = Route {
            coordinates: vec![(18.50, 73.85), (18.51, 73.85)],
            distance_meters: 0.0,
            duration_seconds: 0.0,
            leg_durations: None,
            steps: vec![],
        };
        let length = route.path_length_meters();
        assert!((1_000.0..1_200.0).contains(&length), "got {length}");
    }

    #[test]
    fn route_deserializes_without_optional_fields() {
        let route: Route = serde_json::from_str(
            r#"{
                "coordinates": [[18.5, 73.85], [18.51, 73.86]],
                "distance_meters": 1500.0,
                "duration_seconds": 900.0
            }"#,
        )
        .unwrap();
        assert_eq!(route.coordinates.len(), 2);
        assert!(route.leg_durations.is_none());
        assert!(route.steps.is_empty());
    }
}
