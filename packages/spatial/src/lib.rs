#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index over incident coordinates.
//!
//! Built once from an [`IncidentStore`] snapshot, then queried per route
//! point at serving time. Radius queries go through the R-tree rather than a
//! linear scan over the incident table, so per-point lookups stay
//! O(log n + k). Any change to the store requires a full rebuild; there is no
//! incremental update.
//!
//! Distances are in degree space (plain Euclidean over lat/lng), matching the
//! 0.005-degree (~500 m) influence threshold used by the risk model.

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use saferoute_incident::IncidentStore;

/// An incident's coordinates stored in the R-tree with its store id.
#[derive(Debug, Clone)]
struct IndexedIncident {
    id: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedIncident {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedIncident {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let d_lat = self.position[0] - point[0];
        let d_lng = self.position[1] - point[1];
        d_lat.mul_add(d_lat, d_lng * d_lng)
    }
}

/// Pre-built R-tree over the incident store's coordinates.
///
/// Constructed once per store snapshot and shared read-only across requests.
pub struct IncidentIndex {
    tree: RTree<IndexedIncident>,
}

impl IncidentIndex {
    /// Bulk-loads the index from a store snapshot.
    #[must_use]
    pub fn build(store: &IncidentStore) -> Self {
        let entries = store
            .all()
            .iter()
            .enumerate()
            .map(|(id, incident)| IndexedIncident {
                id,
                position: [incident.latitude, incident.longitude],
            })
            .collect();

        let tree = RTree::bulk_load(entries);
        log::debug!("Built incident index over {} points", tree.size());
        Self { tree }
    }

    /// Ids of all incidents within `radius` degrees of the point, in
    /// ascending id order.
    #[must_use]
    pub fn query_radius(&self, lat: f64, lng: f64, radius: f64) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_within_distance([lat, lng], radius * radius)
            .map(|entry| entry.id)
            .collect();
        // R-tree iteration order is unspecified; sort so results are stable.
        ids.sort_unstable();
        ids
    }

    /// Number of indexed incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Index of the centroid nearest to a point, ties broken by lowest index.
///
/// Cluster counts are small, so a direct scan over the centroids is the
/// assignment step; the R-tree only serves the per-incident radius queries.
#[must_use]
pub fn nearest_centroid(lat: f64, lng: f64, centroids: &[[f64; 2]]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;

    for (i, centroid) in centroids.iter().enumerate() {
        let d_lat = centroid[0] - lat;
        let d_lng = centroid[1] - lng;
        let distance = d_lat.mul_add(d_lat, d_lng * d_lng);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use saferoute_incident_models::Incident;

    use super::*;

    fn store_at(points: &[(f64, f64)]) -> IncidentStore {
        let at = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        let incidents = points
            .iter()
            .map(|&(lat, lng)| Incident::new(lat, lng, at, "Theft".to_string()))
            .collect();
        IncidentStore::from_incidents(incidents, 0).unwrap()
    }

    fn brute_force(points: &[(f64, f64)], lat: f64, lng: f64, radius: f64) -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|&(_, &(p_lat, p_lng))| {
                let d_lat = p_lat - lat;
                let d_lng = p_lng - lng;
                (d_lat * d_lat + d_lng * d_lng).sqrt() <= radius
            })
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn radius_query_matches_brute_force() {
        let points: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let f = f64::from(i);
                (18.5 + f * 0.001, 73.8 + (f * 0.37).sin() * 0.01)
            })
            .collect();
        let store = store_at(&points);
        let index = IncidentIndex::build(&store);

        for &(q_lat, q_lng, radius) in
            &[(18.52, 73.8, 0.005), (18.5, 73.81, 0.02), (18.55, 73.79, 0.001)]
        {
            assert_eq!(
                index.query_radius(q_lat, q_lng, radius),
                brute_force(&points, q_lat, q_lng, radius),
                "mismatch at ({q_lat}, {q_lng}) r={radius}"
            );
        }
    }

    #[test]
    fn radius_query_excludes_points_beyond_radius() {
        let store = store_at(&[(18.5, 73.8), (18.5, 73.804), (18.5, 73.806)]);
        let index = IncidentIndex::build(&store);
        assert_eq!(index.query_radius(18.5, 73.8, 0.005), vec![0, 1]);
    }

    #[test]
    fn nearest_centroid_breaks_ties_by_lowest_index() {
        let centroids = [[18.5, 73.8], [18.5, 73.8], [18.6, 73.9]];
        assert_eq!(nearest_centroid(18.5, 73.8, &centroids), 0);
        assert_eq!(nearest_centroid(18.61, 73.91, &centroids), 2);
    }
}
