//! Seeded k-means over incident coordinates.
//!
//! Cluster count k is a tunable hyperparameter, not derived from the data.
//! Initialization is k-means++ driven by a seeded rng, followed by Lloyd
//! iterations until the centroids stop moving, so a fixed seed yields the
//! same clustering on every run.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::TrainError;

const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_TOLERANCE: f64 = 1e-9;

/// Fitted k-means model: the frozen centroids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    centroids: Vec<[f64; 2]>,
}

impl KMeans {
    /// Fits k clusters over `(lat, lng)` points.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::InsufficientData`] when there are fewer points
    /// than requested clusters.
    pub fn fit(points: &[[f64; 2]], k: usize, seed: u64) -> Result<Self, TrainError> {
        if points.len() < k || k == 0 {
            return Err(TrainError::InsufficientData {
                rows: points.len(),
                clusters: k,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = plus_plus_init(points, k, &mut rng);

        for _ in 0..MAX_ITERATIONS {
            let assignments: Vec<usize> = points
                .iter()
                .map(|p| saferoute_spatial::nearest_centroid(p[0], p[1], &centroids))
                .collect();

            let mut sums = vec![[0.0_f64; 2]; k];
            let mut counts = vec![0_usize; k];
            for (point, &cluster) in points.iter().zip(&assignments) {
                sums[cluster][0] += point[0];
                sums[cluster][1] += point[1];
                counts[cluster] += 1;
            }

            let mut shift = 0.0_f64;
            for (cluster, centroid) in centroids.iter_mut().enumerate() {
                if counts[cluster] == 0 {
                    // Empty cluster keeps its centroid.
                    continue;
                }
                let n = counts[cluster] as f64;
                let updated = [sums[cluster][0] / n, sums[cluster][1] / n];
                shift += squared_distance(*centroid, updated);
                *centroid = updated;
            }

            if shift < CONVERGENCE_TOLERANCE {
                break;
            }
        }

        Ok(Self { centroids })
    }

    /// Cluster id of the nearest centroid.
    #[must_use]
    pub fn predict(&self, lat: f64, lng: f64) -> usize {
        saferoute_spatial::nearest_centroid(lat, lng, &self.centroids)
    }

    /// Per-point cluster assignments, in point order.
    #[must_use]
    pub fn assign(&self, points: &[[f64; 2]]) -> Vec<usize> {
        points
            .iter()
            .map(|p| self.predict(p[0], p[1]))
            .collect()
    }

    /// Number of clusters.
    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// The frozen centroids.
    #[must_use]
    pub fn centroids(&self) -> &[[f64; 2]] {
        &self.centroids
    }
}

/// k-means++ seeding: each subsequent centroid is drawn with probability
/// proportional to its squared distance from the nearest existing centroid.
fn plus_plus_init(points: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(*p, *c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            // All remaining points coincide with a centroid; duplicate one.
            centroids.push(points[0]);
            continue;
        }

        let mut target = rng.random::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, distance) in distances.iter().enumerate() {
            target -= distance;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen]);
    }

    centroids
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    d0.mul_add(d0, d1 * d1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<[f64; 2]> {
        let mut points = Vec::new();
        for i in 0..20 {
            let f = f64::from(i) * 0.0001;
            points.push([18.50 + f, 73.80 + f]);
            points.push([18.60 + f, 73.95 - f]);
        }
        points
    }

    #[test]
    fn separates_well_separated_blobs() {
        let points = two_blobs();
        let model = KMeans::fit(&points, 2, 42).unwrap();
        let a = model.predict(18.50, 73.80);
        let b = model.predict(18.60, 73.95);
        assert_ne!(a, b);
        // Every point of a blob lands in that blob's cluster.
        for point in &points[..4] {
            let expected = if point[0] < 18.55 { a } else { b };
            assert_eq!(model.predict(point[0], point[1]), expected);
        }
    }

    #[test]
    fn fit_is_deterministic_for_fixed_seed() {
        let points = two_blobs();
        let a = KMeans::fit(&points, 3, 7).unwrap();
        let b = KMeans::fit(&points, 3, 7).unwrap();
        assert_eq!(a.centroids(), b.centroids());
    }

    #[test]
    fn rejects_fewer_points_than_clusters() {
        let err = KMeans::fit(&[[18.5, 73.8]], 5, 42).unwrap_err();
        assert!(matches!(
            err,
            TrainError::InsufficientData {
                rows: 1,
                clusters: 5
            }
        ));
    }
}
