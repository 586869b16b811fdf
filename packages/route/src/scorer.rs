//! Per-route danger scoring and aggregation policies.

use chrono::{Duration, NaiveDateTime};
use saferoute_incident::IncidentStore;
use saferoute_model::ModelBundle;
use saferoute_spatial::IncidentIndex;

use crate::Route;

/// Aggregation policy for combining per-point scores into one route score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringOptions {
    /// Severity-weighted aggregation (canonical). When false, falls back to
    /// the deprecated plain arithmetic mean.
    pub weighted: bool,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self { weighted: true }
    }
}

/// Danger score in [0, 1] for one route starting at `start_time`.
///
/// Arrival at each coordinate is estimated by linear interpolation over the
/// route's total duration (cumulative leg durations when the provider gives
/// them) — a deliberate constant-speed simplification, since true per-point
/// ETAs are not available. An empty route scores 0.0 by convention.
#[must_use]
pub fn score_route(
    route: &Route,
    start_time: NaiveDateTime,
    bundle: &ModelBundle,
    store: &IncidentStore,
    index: &IncidentIndex,
    options: &ScoringOptions,
) -> f64 {
    let points = route.coordinates.len();
    if points == 0 {
        return 0.0;
    }

    let scores: Vec<f64> = route
        .coordinates
        .iter()
        .enumerate()
        .map(|(i, &(lat, lng))| {
            let at = arrival_time(route, start_time, i);
            bundle.predict(lat, lng, at, store, index)
        })
        .collect();

    let aggregated = if options.weighted {
        aggregate_weighted(&scores)
    } else {
        aggregate_mean(&scores)
    };
    aggregated.clamp(0.0, 1.0)
}

/// Estimated arrival at coordinate `i`.
fn arrival_time(route: &Route, start_time: NaiveDateTime, i: usize) -> NaiveDateTime {
    let elapsed_seconds = match &route.leg_durations {
        Some(legs) if legs.len() + 1 == route.coordinates.len() => legs.iter().take(i).sum(),
        _ => {
            let increment = route.duration_seconds / route.coordinates.len() as f64;
            increment * i as f64
        }
    };
    start_time + Duration::milliseconds((elapsed_seconds * 1000.0) as i64)
}

/// Severity-weighted mean: point scores sorted descending, the i-th highest
/// weighted by `1/(i+1)`, normalized by the weight sum. A single very
/// dangerous segment dominates instead of being diluted by many safe ones.
#[must_use]
pub fn aggregate_weighted(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut weighted_sum = 0.0_f64;
    let mut weight_sum = 0.0_f64;
    for (i, score) in sorted.iter().enumerate() {
        let weight = 1.0 / (i + 1) as f64;
        weighted_sum += score * weight;
        weight_sum += weight;
    }

    weighted_sum / weight_sum
}

/// Plain arithmetic mean; the deprecated aggregation variant.
#[must_use]
pub fn aggregate_mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_aggregation_lets_one_hotspot_dominate() {
        let mut scores = vec![0.0; 9];
        scores.push(0.9);

        let weighted = aggregate_weighted(&scores);
        let mean = aggregate_mean(&scores);

        assert!(weighted > mean, "weighted {weighted} should exceed mean {mean}");
        assert!(weighted > 0.25);
        assert!((mean - 0.09).abs() < 1e-12);
    }

    #[test]
    fn aggregations_agree_on_uniform_scores() {
        let scores = vec![0.4; 5];
        assert!((aggregate_weighted(&scores) - 0.4).abs() < 1e-12);
        assert!((aggregate_mean(&scores) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_scores_aggregate_to_zero() {
        assert_eq!(aggregate_weighted(&[]), 0.0);
        assert_eq!(aggregate_mean(&[]), 0.0);
    }

    #[test]
    fn arrival_time_uses_leg_durations_when_shapes_match() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let route = Route {
            coordinates: vec![(18.5, 73.85), (18.51, 73.86), (18.52, 73.87)],
            distance_meters: 2_000.0,
            duration_seconds: 600.0,
            leg_durations: Some(vec![100.0, 500.0]),
            steps: vec![],
        };

        assert_eq!(arrival_time(&route, start, 0), start);
        assert_eq!(
            arrival_time(&route, start, 1),
            start + Duration::seconds(100)
        );
        assert_eq!(
            arrival_time(&route, start, 2),
            start + Duration::seconds(600)
        );
    }

    #[test]
    fn arrival_time_interpolates_uniformly_without_legs() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let route = Route {
            coordinates: vec![(18.5, 73.85), (18.51, 73.86), (18.52, 73.87)],
            distance_meters: 2_000.0,
            duration_seconds: 600.0,
            leg_durations: None,
            steps: vec![],
        };

        assert_eq!(
            arrival_time(&route, start, 1),
            start + Duration::seconds(200)
        );
    }
}
