//! Training procedure: clustering, aggregates, feature matrix, forest fit,
//! and holdout evaluation.
//!
//! Everything is driven by one seed, so the full pipeline is reproducible.
//! Nothing is written anywhere until every artifact has been fitted; an
//! insufficient-data error aborts before any partial bundle can exist.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use saferoute_incident::IncidentStore;
use saferoute_incident_models::{SeverityWeights, TimeWeights, danger_target};
use serde::{Deserialize, Serialize};

use crate::TrainError;
use crate::aggregates::AggregateTables;
use crate::bundle::{BUNDLE_VERSION, InfluenceConfig, ModelBundle};
use crate::forest::{ForestConfig, RandomForestRegressor};
use crate::kmeans::KMeans;
use crate::scaler::StandardScaler;
use crate::schema::FeatureSchema;

/// Threshold on the continuous danger target used for the binarized
/// evaluation metrics.
const EVAL_THRESHOLD: f64 = 0.5;

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of spatial clusters (k).
    pub clusters: usize,
    /// Forest hyperparameters.
    pub forest: ForestConfig,
    /// Seed for clustering init, the holdout shuffle, and forest sampling.
    pub seed: u64,
    /// Fraction of rows held out for evaluation.
    pub test_fraction: f64,
    /// Local-influence tunables frozen into the bundle.
    pub influence: InfluenceConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            clusters: 5,
            forest: ForestConfig::default(),
            seed: 42,
            test_fraction: 0.2,
            influence: InfluenceConfig::default(),
        }
    }
}

/// Holdout metrics, reported but never enforced as a gate.
///
/// The target is continuous, so MAE/RMSE describe it directly; the
/// classification metrics are computed on the target binarized at
/// [`EVAL_THRESHOLD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub mae: f64,
    pub rmse: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

/// Trains the full bundle from an incident store snapshot.
///
/// # Errors
///
/// Returns [`TrainError::InsufficientData`] if the store has fewer rows than
/// the requested cluster count, before any artifact is produced.
pub fn train(
    store: &IncidentStore,
    config: &TrainConfig,
) -> Result<(ModelBundle, Evaluation), TrainError> {
    let severity_weights = SeverityWeights::default();
    let time_weights = TimeWeights::default();
    let schema = FeatureSchema::canonical();

    let points: Vec<[f64; 2]> = store
        .all()
        .iter()
        .map(|i| [i.latitude, i.longitude])
        .collect();

    let kmeans = KMeans::fit(&points, config.clusters, config.seed)?;
    let assignments = kmeans.assign(&points);
    let aggregates = AggregateTables::compute(store, &assignments, kmeans.k());
    let hotspot = densest_centroid(&kmeans, &assignments);

    let targets: Vec<f64> = store
        .all()
        .iter()
        .map(|incident| danger_target(incident, &severity_weights, &time_weights))
        .collect();

    let matrix: Vec<Vec<f64>> = store
        .all()
        .iter()
        .zip(&assignments)
        .map(|(incident, &cluster)| {
            schema.encode(
                incident.latitude,
                incident.longitude,
                incident.occurred_at,
                cluster,
                &aggregates,
                hotspot,
            )
        })
        .collect();

    let (train_ids, test_ids) = stratified_split(&targets, config.test_fraction, config.seed);
    log::info!(
        "Training on {} rows, holding out {} for evaluation",
        train_ids.len(),
        test_ids.len()
    );

    let train_matrix: Vec<Vec<f64>> = train_ids.iter().map(|&i| matrix[i].clone()).collect();
    let scaler = StandardScaler::fit(&train_matrix);
    let scaled_train: Vec<Vec<f64>> = train_matrix.iter().map(|r| scaler.transform(r)).collect();
    let train_targets: Vec<f64> = train_ids.iter().map(|&i| targets[i]).collect();

    let forest_config = ForestConfig {
        seed: config.seed,
        ..config.forest
    };
    let forest = RandomForestRegressor::fit(&scaled_train, &train_targets, &forest_config);

    let predictions: Vec<f64> = test_ids
        .iter()
        .map(|&i| forest.predict(&scaler.transform(&matrix[i])))
        .collect();
    let test_targets: Vec<f64> = test_ids.iter().map(|&i| targets[i]).collect();
    let evaluation = evaluate(&predictions, &test_targets, train_ids.len());

    log::info!(
        "Holdout: mae={:.4} rmse={:.4} accuracy={:.3} precision={:.3} recall={:.3} f1={:.3} roc_auc={:.3}",
        evaluation.mae,
        evaluation.rmse,
        evaluation.accuracy,
        evaluation.precision,
        evaluation.recall,
        evaluation.f1,
        evaluation.roc_auc
    );

    let bundle = ModelBundle {
        version: BUNDLE_VERSION,
        schema,
        kmeans,
        scaler,
        forest,
        aggregates,
        hotspot,
        severity_weights,
        time_weights,
        influence: config.influence,
    };

    Ok((bundle, evaluation))
}

/// Centroid of the cluster holding the most incidents; the data-derived
/// hotspot reference coordinate.
fn densest_centroid(kmeans: &KMeans, assignments: &[usize]) -> [f64; 2] {
    let mut counts = vec![0_usize; kmeans.k()];
    for &cluster in assignments {
        counts[cluster] += 1;
    }
    let densest = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, count)| count)
        .map_or(0, |(cluster, _)| cluster);
    kmeans.centroids()[densest]
}

/// Deterministic stratified holdout: shuffles the above-threshold and
/// below-threshold rows separately and takes `test_fraction` of each.
fn stratified_split(targets: &[f64], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut high: Vec<usize> = Vec::new();
    let mut low: Vec<usize> = Vec::new();
    for (i, &target) in targets.iter().enumerate() {
        if target >= EVAL_THRESHOLD {
            high.push(i);
        } else {
            low.push(i);
        }
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut stratum in [high, low] {
        stratum.shuffle(&mut rng);
        let held_out = (stratum.len() as f64 * test_fraction).floor() as usize;
        test.extend(stratum.drain(..held_out));
        train.extend(stratum);
    }

    (train, test)
}

fn evaluate(predictions: &[f64], targets: &[f64], train_rows: usize) -> Evaluation {
    let n = predictions.len();
    if n == 0 {
        log::warn!("Holdout split is empty; skipping evaluation");
        return Evaluation {
            train_rows,
            test_rows: 0,
            mae: 0.0,
            rmse: 0.0,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            roc_auc: 0.5,
        };
    }

    let mut abs_sum = 0.0_f64;
    let mut sq_sum = 0.0_f64;
    let mut true_pos = 0_usize;
    let mut false_pos = 0_usize;
    let mut false_neg = 0_usize;
    let mut correct = 0_usize;

    for (&p, &t) in predictions.iter().zip(targets) {
        let d = p - t;
        abs_sum += d.abs();
        sq_sum += d * d;

        let predicted = p >= EVAL_THRESHOLD;
        let actual = t >= EVAL_THRESHOLD;
        if predicted == actual {
            correct += 1;
        }
        match (predicted, actual) {
            (true, true) => true_pos += 1,
            (true, false) => false_pos += 1,
            (false, true) => false_neg += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(true_pos, true_pos + false_pos);
    let recall = ratio(true_pos, true_pos + false_neg);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Evaluation {
        train_rows,
        test_rows: n,
        mae: abs_sum / n as f64,
        rmse: (sq_sum / n as f64).sqrt(),
        accuracy: ratio(correct, n),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(predictions, targets),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Rank-based ROC-AUC (Mann-Whitney U) of the continuous predictions against
/// the binarized targets. 0.5 when the holdout contains a single class.
fn roc_auc(predictions: &[f64], targets: &[f64]) -> f64 {
    let mut pairs: Vec<(f64, bool)> = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| (p, t >= EVAL_THRESHOLD))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let positives = pairs.iter().filter(|(_, label)| *label).count();
    let negatives = pairs.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    // Sum of positive ranks, averaging ranks across prediction ties.
    let mut rank_sum = 0.0_f64;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j < pairs.len() && pairs[j].0 == pairs[i].0 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for pair in &pairs[i..j] {
            if pair.1 {
                rank_sum += avg_rank;
            }
        }
        i = j;
    }

    let p = positives as f64;
    let q = negatives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * q)
}
