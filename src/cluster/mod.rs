//! One shape over the clustering algorithms of `linfa-clustering`:
//! a configuration plus a feature matrix go in, one label per row
//! (and algorithm specific extras) come out.
//!
//! Each algorithm is a [`Clusterer`] (its configuration type) that
//! produces a model implementing [`LabeledModel`]. Code that only
//! needs the labels (contingency tables, label columns) uses that
//! trait or [`ClusteringOutcome`] and does not care which algorithm
//! ran. The k-means and mixture models additionally implement
//! [`SelectionCriterion`](crate::sweep::SelectionCriterion) for
//! sweeps over the cluster count.

pub mod dbscan;
pub mod gmm;
pub mod kmeans;

use std::{collections::BTreeMap, fmt::Display};

use kstring::KString;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::{
    data_table::{Column, DataTable},
    error::PipelineError,
};

pub use dbscan::{DbscanConfig, DensityModel};
pub use gmm::{GmmConfig, InformationCriterion, MixtureModel};
pub use kmeans::{CentroidModel, KMeansConfig};

/// The cluster a row was assigned to. `Noise` (DBSCAN outliers)
/// orders before all clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

impl ClusterLabel {
    /// -1 for noise, the cluster index otherwise.
    pub fn as_i64(self) -> i64 {
        match self {
            ClusterLabel::Noise => -1,
            ClusterLabel::Cluster(i) => i as i64,
        }
    }

    pub fn cluster_index(self) -> Option<usize> {
        match self {
            ClusterLabel::Noise => None,
            ClusterLabel::Cluster(i) => Some(i),
        }
    }
}

impl From<Option<usize>> for ClusterLabel {
    fn from(value: Option<usize>) -> Self {
        match value {
            Some(i) => ClusterLabel::Cluster(i),
            None => ClusterLabel::Noise,
        }
    }
}

impl Display for ClusterLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterLabel::Noise => f.write_str("noise"),
            ClusterLabel::Cluster(i) => write!(f, "{i}"),
        }
    }
}

/// The common output of all algorithms.
pub trait LabeledModel {
    /// One label per input row, in input order.
    fn labels(&self) -> &[ClusterLabel];

    /// Number of clusters (not counting noise).
    fn num_clusters(&self) -> usize;
}

/// A configured clustering algorithm.
pub trait Clusterer {
    type Model: LabeledModel;

    fn algorithm_name(&self) -> &'static str;

    /// Fit to the rows of `features` and label them. Zero rows give a
    /// model with zero labels; cluster counts that the rows can't
    /// support are `InvalidConfiguration` errors.
    fn fit(&self, features: ArrayView2<'_, f64>) -> Result<Self::Model, PipelineError>;
}

/// Configuration of any of the algorithms, as it appears in analysis
/// config files (`algorithm: "kmeans"` etc.).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum AlgorithmConfig {
    KMeans(KMeansConfig),
    Gmm(GmmConfig),
    Dbscan(DbscanConfig),
}

impl AlgorithmConfig {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            AlgorithmConfig::KMeans(c) => c.algorithm_name(),
            AlgorithmConfig::Gmm(c) => c.algorithm_name(),
            AlgorithmConfig::Dbscan(c) => c.algorithm_name(),
        }
    }

    /// Whether the algorithm takes the number of clusters as a
    /// parameter (and hence can be swept over it).
    pub fn has_cluster_count(&self) -> bool {
        match self {
            AlgorithmConfig::KMeans(_) | AlgorithmConfig::Gmm(_) => true,
            AlgorithmConfig::Dbscan(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClusteringOutcome {
    Centroid(CentroidModel),
    Mixture(MixtureModel),
    Density(DensityModel),
}

impl LabeledModel for ClusteringOutcome {
    fn labels(&self) -> &[ClusterLabel] {
        match self {
            ClusteringOutcome::Centroid(m) => m.labels(),
            ClusteringOutcome::Mixture(m) => m.labels(),
            ClusteringOutcome::Density(m) => m.labels(),
        }
    }

    fn num_clusters(&self) -> usize {
        match self {
            ClusteringOutcome::Centroid(m) => m.num_clusters(),
            ClusteringOutcome::Mixture(m) => m.num_clusters(),
            ClusteringOutcome::Density(m) => m.num_clusters(),
        }
    }
}

/// Run the configured algorithm on `features`.
pub fn cluster(
    config: &AlgorithmConfig,
    features: ArrayView2<'_, f64>,
) -> Result<ClusteringOutcome, PipelineError> {
    Ok(match config {
        AlgorithmConfig::KMeans(c) => ClusteringOutcome::Centroid(c.fit(features)?),
        AlgorithmConfig::Gmm(c) => ClusteringOutcome::Mixture(c.fit(features)?),
        AlgorithmConfig::Dbscan(c) => ClusteringOutcome::Density(c.fit(features)?),
    })
}

/// Rows per label, noise first.
pub fn label_sizes(labels: &[ClusterLabel]) -> BTreeMap<ClusterLabel, usize> {
    let mut sizes = BTreeMap::new();
    for label in labels {
        *sizes.entry(*label).or_insert(0) += 1;
    }
    sizes
}

impl ClusteringOutcome {
    /// One row per cluster (plus one for noise, if any): label, size,
    /// and for k-means the centroid, for mixtures the weight and mean,
    /// named after `feature_names`.
    pub fn summary_table<S: AsRef<str>>(
        &self,
        feature_names: &[S],
    ) -> Result<DataTable, PipelineError> {
        let sizes = label_sizes(self.labels());
        let mut labels: Vec<ClusterLabel> = (0..self.num_clusters()).map(ClusterLabel::Cluster).collect();
        if sizes.contains_key(&ClusterLabel::Noise) {
            labels.insert(0, ClusterLabel::Noise);
        }
        let mut table = DataTable::with_num_rows(labels.len());
        table.push_labels("cluster", &labels)?;
        table.push_column(
            "size",
            Column::Numeric(
                labels
                    .iter()
                    .map(|label| sizes.get(label).copied().unwrap_or(0) as f64)
                    .collect(),
            ),
        )?;

        let coordinates = match self {
            ClusteringOutcome::Centroid(m) => Some(("centroid", &m.centroids)),
            ClusteringOutcome::Mixture(m) => {
                table.push_column("weight", Column::Numeric(m.weights.to_vec()))?;
                Some(("mean", &m.means))
            }
            ClusteringOutcome::Density(_) => None,
        };
        if let Some((prefix, coordinates)) = coordinates {
            if coordinates.ncols() != feature_names.len() {
                return Err(PipelineError::LengthMismatch {
                    what: "model dimensions vs. feature names",
                    left: coordinates.ncols(),
                    right: feature_names.len(),
                });
            }
            for (j, name) in feature_names.iter().enumerate() {
                table.push_column(
                    KString::from_string(format!("{prefix}_{}", name.as_ref())),
                    Column::Numeric(coordinates.column(j).to_vec()),
                )?;
            }
        }
        Ok(table)
    }
}

/// Rejects non-finite values, which the algorithms would silently
/// turn into garbage.
pub(crate) fn check_finite(
    algorithm: &'static str,
    features: ArrayView2<'_, f64>,
) -> Result<(), PipelineError> {
    if let Some(((i, j), val)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PipelineError::MissingData(format!(
            "{algorithm}: non-finite value {val} at row {i}, feature {j}"
        )));
    }
    Ok(())
}

/// `count` clusters need at least `count` rows, and at least 1
/// cluster must be asked for.
pub(crate) fn check_cluster_count(
    algorithm: &'static str,
    what: &str,
    count: usize,
    num_rows: usize,
) -> Result<(), PipelineError> {
    if count == 0 {
        return Err(PipelineError::InvalidConfiguration(format!(
            "{algorithm}: need at least 1 {what}, got 0"
        )));
    }
    if num_rows > 0 && count > num_rows {
        return Err(PipelineError::InvalidConfiguration(format!(
            "{algorithm}: cannot fit {count} {what}s to {num_rows} rows"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use ndarray::array;

    use super::*;

    #[test]
    fn t_label_order_and_display() {
        let mut labels = vec![
            ClusterLabel::Cluster(1),
            ClusterLabel::Noise,
            ClusterLabel::Cluster(0),
        ];
        labels.sort();
        assert_eq!(
            labels,
            [
                ClusterLabel::Noise,
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(1)
            ]
        );
        assert_eq!(ClusterLabel::Noise.to_string(), "noise");
        assert_eq!(ClusterLabel::Cluster(3).to_string(), "3");
        assert_eq!(ClusterLabel::Noise.as_i64(), -1);
        assert_eq!(ClusterLabel::from(Some(2)), ClusterLabel::Cluster(2));
    }

    #[test]
    fn t_config_from_json5() -> Result<()> {
        let config: AlgorithmConfig =
            serde_json5::from_str(r#"{ algorithm: "kmeans", n_clusters: 3 }"#)?;
        match &config {
            AlgorithmConfig::KMeans(c) => assert_eq!(c.n_clusters, 3),
            _ => panic!("expected kmeans, got {config:?}"),
        }
        assert!(config.has_cluster_count());

        let config: AlgorithmConfig =
            serde_json5::from_str(r#"{ algorithm: "dbscan", radius: 0.5, min_points: 3 }"#)?;
        assert_eq!(config.algorithm_name(), "dbscan");
        assert!(!config.has_cluster_count());
        Ok(())
    }

    #[test]
    fn t_cluster_dispatch_and_summary() -> Result<()> {
        let features = array![[0., 0.], [0.1, 0.], [5., 5.], [5.1, 5.]];
        let outcome = cluster(
            &AlgorithmConfig::KMeans(KMeansConfig::new(2)),
            features.view(),
        )?;
        assert_eq!(outcome.labels().len(), 4);
        assert_eq!(outcome.num_clusters(), 2);
        let summary = outcome.summary_table(&["F1", "F2"])?;
        assert_eq!(summary.num_rows(), 2);
        assert_eq!(summary.numeric("size")?, &[2., 2.]);
        assert!(summary.has_column("centroid_F2"));
        assert!(outcome.summary_table(&["F1"]).is_err());
        Ok(())
    }

    #[test]
    fn t_checks() {
        assert!(check_cluster_count("k-means", "cluster", 0, 5)
            .unwrap_err()
            .is_invalid_configuration());
        assert!(check_cluster_count("k-means", "cluster", 6, 5)
            .unwrap_err()
            .is_invalid_configuration());
        assert!(check_cluster_count("k-means", "cluster", 5, 5).is_ok());
        assert!(check_cluster_count("k-means", "cluster", 5, 0).is_ok());
        let features = array![[0., f64::INFINITY]];
        assert!(check_finite("gmm", features.view())
            .unwrap_err()
            .is_missing_data());
    }
}
