//! Per-cluster temporal aggregate tables.
//!
//! Dense count tables computed once during training and frozen into the
//! bundle: incidents per (cluster, hour), per (cluster, weekday), and violent
//! incidents per (cluster, month). Joined into feature vectors by the schema.

use saferoute_incident::IncidentStore;
use saferoute_incident_models::is_violent;
use serde::{Deserialize, Serialize};

/// Dense per-cluster count tables, indexed `[cluster][slot]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTables {
    hour_counts: Vec<Vec<u32>>,
    weekday_counts: Vec<Vec<u32>>,
    month_violent: Vec<Vec<u32>>,
}

impl AggregateTables {
    /// All-zero tables for `clusters` clusters.
    #[must_use]
    pub fn zeroed(clusters: usize) -> Self {
        Self {
            hour_counts: vec![vec![0; 24]; clusters],
            weekday_counts: vec![vec![0; 7]; clusters],
            month_violent: vec![vec![0; 12]; clusters],
        }
    }

    /// Computes the tables from a store and its per-incident cluster
    /// assignments (`assignments[id]` is the cluster of incident `id`).
    #[must_use]
    pub fn compute(store: &IncidentStore, assignments: &[usize], clusters: usize) -> Self {
        let mut tables = Self::zeroed(clusters);

        for (incident, &cluster) in store.all().iter().zip(assignments) {
            tables.hour_counts[cluster][incident.hour as usize] += 1;
            tables.weekday_counts[cluster][incident.day_of_week as usize] += 1;
            if is_violent(&incident.category) {
                tables.month_violent[cluster][incident.month as usize - 1] += 1;
            }
        }

        tables
    }

    /// Number of clusters the tables were computed for.
    #[must_use]
    pub fn clusters(&self) -> usize {
        self.hour_counts.len()
    }

    /// Incidents observed in `cluster` at `hour` (0–23).
    #[must_use]
    pub fn hour_count(&self, cluster: usize, hour: u32) -> u32 {
        self.hour_counts
            .get(cluster)
            .and_then(|row| row.get(hour as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Incidents observed in `cluster` on `day_of_week` (Monday = 0).
    #[must_use]
    pub fn weekday_count(&self, cluster: usize, day_of_week: u32) -> u32 {
        self.weekday_counts
            .get(cluster)
            .and_then(|row| row.get(day_of_week as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Violent incidents observed in `cluster` during `month` (1–12).
    #[must_use]
    pub fn month_violent(&self, cluster: usize, month: u32) -> u32 {
        self.month_violent
            .get(cluster)
            .and_then(|row| row.get((month as usize).checked_sub(1)?))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use saferoute_incident_models::Incident;

    use super::*;

    fn incident(hour: u32, month: u32, category: &str) -> Incident {
        let at = NaiveDate::from_ymd_opt(2024, month, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        Incident::new(18.52, 73.85, at, category.to_string())
    }

    #[test]
    fn counts_join_on_cluster() {
        let store = IncidentStore::from_incidents(
            vec![
                incident(22, 3, "Robbery"),
                incident(22, 3, "Theft"),
                incident(9, 7, "Murder"),
            ],
            0,
        )
        .unwrap();

        let tables = AggregateTables::compute(&store, &[0, 0, 1], 2);

        assert_eq!(tables.hour_count(0, 22), 2);
        assert_eq!(tables.hour_count(1, 22), 0);
        assert_eq!(tables.hour_count(1, 9), 1);
        // Robbery is violent, Theft is not.
        assert_eq!(tables.month_violent(0, 3), 1);
        assert_eq!(tables.month_violent(1, 7), 1);
    }

    #[test]
    fn out_of_range_cluster_reads_as_zero() {
        let tables = AggregateTables::zeroed(1);
        assert_eq!(tables.hour_count(5, 12), 0);
        assert_eq!(tables.weekday_count(5, 3), 0);
        assert_eq!(tables.month_violent(5, 1), 0);
    }
}
