//! Frozen serving state and the atomic swap used on reload.
//!
//! One [`ServingState`] owns an incident store snapshot, the spatial index
//! built over it, and the model bundle trained against it. Scoring calls
//! always see one coherent triple; refreshing the dataset or the model means
//! constructing a new state and swapping the shared pointer, never mutating
//! in place.

use std::sync::{Arc, RwLock};

use chrono::NaiveDateTime;
use saferoute_incident::IncidentStore;
use saferoute_model::ModelBundle;
use saferoute_spatial::IncidentIndex;

use crate::scorer::{ScoringOptions, score_route};
use crate::{Route, ScoredRoute};

/// An immutable (store, index, bundle) triple.
pub struct ServingState {
    store: IncidentStore,
    index: IncidentIndex,
    bundle: ModelBundle,
}

impl ServingState {
    /// Builds the state, constructing the spatial index from the store.
    #[must_use]
    pub fn new(store: IncidentStore, bundle: ModelBundle) -> Self {
        let index = IncidentIndex::build(&store);
        Self {
            store,
            index,
            bundle,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &IncidentStore {
        &self.store
    }

    #[must_use]
    pub const fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Danger score in [0, 1] for one route starting at `start_time`.
    #[must_use]
    pub fn score_route(
        &self,
        route: &Route,
        start_time: NaiveDateTime,
        options: &ScoringOptions,
    ) -> f64 {
        score_route(
            route,
            start_time,
            &self.bundle,
            &self.store,
            &self.index,
            options,
        )
    }

    /// Scores and orders candidate routes ascending by danger (safest
    /// first). The sort is stable: routes with equal scores keep their
    /// input order. Pure function of its inputs; the routes themselves are
    /// returned unmodified inside the annotations.
    #[must_use]
    pub fn rank(
        &self,
        routes: &[Route],
        start_time: NaiveDateTime,
        options: &ScoringOptions,
    ) -> Vec<ScoredRoute> {
        let mut scored: Vec<ScoredRoute> = routes
            .iter()
            .enumerate()
            .map(|(id, route)| {
                let score = self.score_route(route, start_time, options);
                ScoredRoute {
                    id,
                    danger: (score * 10_000.0).round() / 100.0,
                    score,
                    route: route.clone(),
                }
            })
            .collect();

        scored.sort_by(|a, b| a.score.total_cmp(&b.score));
        scored
    }
}

/// Process-wide holder of the current serving state.
///
/// Readers grab an `Arc` clone and keep using it for the whole request even
/// if a reload swaps the state mid-flight; they never observe a mix of old
/// store and new bundle.
pub struct SharedServingState {
    current: RwLock<Arc<ServingState>>,
}

impl SharedServingState {
    #[must_use]
    pub fn new(state: ServingState) -> Self {
        Self {
            current: RwLock::new(Arc::new(state)),
        }
    }

    /// The current state. Cheap; clones the pointer, not the state.
    #[must_use]
    pub fn current(&self) -> Arc<ServingState> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically replaces the state. In-flight readers keep the old one.
    pub fn swap(&self, state: ServingState) {
        let state = Arc::new(state);
        match self.current.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
        log::info!("Serving state swapped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use saferoute_incident_models::Incident;
    use saferoute_model::{TrainConfig, train};

    use super::*;

    fn fixture() -> ServingState {
        let incidents: Vec<Incident> = (0..60_u32)
            .map(|i| {
                let at = NaiveDate::from_ymd_opt(2024, 1 + (i % 12), 1 + (i % 28))
                    .unwrap()
                    .and_hms_opt(i % 24, 0, 0)
                    .unwrap();
                Incident::new(
                    18.45 + f64::from(i % 9) * 0.01,
                    73.80 + f64::from(i % 5) * 0.01,
                    at,
                    if i % 4 == 0 { "Robbery" } else { "Theft" }.to_string(),
                )
            })
            .collect();
        let store = IncidentStore::from_incidents(incidents, 0).unwrap();
        let (bundle, _) = train(&store, &TrainConfig::default()).unwrap();
        ServingState::new(store, bundle)
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(22, 30, 0)
            .unwrap()
    }

    fn route(coordinates: Vec<(f64, f64)>) -> Route {
        Route {
            coordinates,
            distance_meters: 1_000.0,
            duration_seconds: 600.0,
            leg_durations: None,
            steps: vec![],
        }
    }

    #[test]
    fn empty_route_scores_zero() {
        let state = fixture();
        let score = state.score_route(&route(vec![]), start(), &ScoringOptions::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn route_scores_stay_in_unit_interval() {
        let state = fixture();
        let options = ScoringOptions::default();
        for coordinates in [
            vec![(18.45, 73.80), (18.47, 73.82), (18.50, 73.84)],
            vec![(18.46, 73.81)],
            vec![(10.0, 60.0), (11.0, 61.0)],
        ] {
            let score = state.score_route(&route(coordinates), start(), &options);
            assert!((0.0..=1.0).contains(&score), "got {score}");
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let state = fixture();
        let options = ScoringOptions::default();
        let r = route(vec![(18.45, 73.80), (18.47, 73.82)]);
        let a = state.score_route(&r, start(), &options);
        let b = state.score_route(&r, start(), &options);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn ranking_is_ascending_and_stable() {
        let state = fixture();
        // Two identical routes (tie) sandwiching distinct ones.
        let near = vec![(18.45, 73.80), (18.46, 73.81)];
        let far = vec![(10.0, 60.0), (10.1, 60.1)];
        let routes = vec![
            route(near.clone()),
            route(far.clone()),
            route(near),
            route(far),
        ];

        let ranked = state.rank(&routes, start(), &ScoringOptions::default());

        for pair in ranked.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
        // Equal-score routes keep their original relative order.
        for pair in ranked.windows(2) {
            if (pair[0].score - pair[1].score).abs() < f64::EPSILON {
                assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn swap_replaces_state_atomically_for_new_readers() {
        let shared = SharedServingState::new(fixture());
        let before = shared.current();
        shared.swap(fixture());
        let after = shared.current();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn danger_percentage_matches_raw_score() {
        let state = fixture();
        let routes = vec![route(vec![(18.45, 73.80), (18.46, 73.81)])];
        let ranked = state.rank(&routes, start(), &ScoringOptions::default());
        let entry = &ranked[0];
        assert!((entry.danger - (entry.score * 10_000.0).round() / 100.0).abs() < f64::EPSILON);
        assert!((0.0..=100.0).contains(&entry.danger));
    }
}
