//! k-means via linfa, with centroids and inertia taken from the final
//! assignment.

use linfa::{
    traits::{Fit, Predict},
    DatasetBase,
};
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2, ArrayView2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::{check_cluster_count, check_finite, ClusterLabel, Clusterer, LabeledModel},
    debug,
    error::PipelineError,
    sweep::SelectionCriterion,
};

const ALGORITHM: &str = "k-means";

fn default_seed() -> u64 {
    42
}

fn default_n_runs() -> usize {
    10
}

fn default_max_iterations() -> u64 {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    /// Seed for the centroid initialization (k-means++)
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of initializations; the run with the lowest inertia
    /// wins
    #[serde(default = "default_n_runs")]
    pub n_runs: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl KMeansConfig {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            seed: default_seed(),
            n_runs: default_n_runs(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CentroidModel {
    pub labels: Vec<ClusterLabel>,
    /// clusters x features
    pub centroids: Array2<f64>,
    /// Sum of squared Euclidean distances of every row to the
    /// centroid of its cluster.
    pub inertia: f64,
}

impl LabeledModel for CentroidModel {
    fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    fn num_clusters(&self) -> usize {
        self.centroids.nrows()
    }
}

impl SelectionCriterion for CentroidModel {
    fn criterion_name(&self) -> &'static str {
        "inertia"
    }

    fn selection_criterion(&self) -> f64 {
        self.inertia
    }
}

/// linfa reports a per-row average, hence computed here.
pub fn inertia(features: ArrayView2<'_, f64>, centroids: &Array2<f64>, assigned: &Array1<usize>) -> f64 {
    features
        .rows()
        .into_iter()
        .zip(assigned)
        .map(|(row, cluster)| {
            row.iter()
                .zip(centroids.row(*cluster))
                .map(|(x, c)| (x - c).powi(2))
                .sum::<f64>()
        })
        .sum()
}

/// Replace each centroid by the mean of the rows assigned to it;
/// centroids without rows stay as they are. linfa stops iterating
/// within `tolerance`, so its centroids are only close to the means.
pub fn recenter(
    features: ArrayView2<'_, f64>,
    centroids: &mut Array2<f64>,
    assigned: &Array1<usize>,
) {
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];
    for (row, cluster) in features.rows().into_iter().zip(assigned) {
        let mut sum = sums.row_mut(*cluster);
        sum += &row;
        counts[*cluster] += 1;
    }
    for (k, count) in counts.into_iter().enumerate() {
        if count > 0 {
            let mean = sums.row(k).mapv(|v| v / count as f64);
            centroids.row_mut(k).assign(&mean);
        }
    }
}

impl Clusterer for KMeansConfig {
    type Model = CentroidModel;

    fn algorithm_name(&self) -> &'static str {
        "kmeans"
    }

    fn fit(&self, features: ArrayView2<'_, f64>) -> Result<CentroidModel, PipelineError> {
        let num_rows = features.nrows();
        check_cluster_count(ALGORITHM, "cluster", self.n_clusters, num_rows)?;
        if num_rows == 0 {
            return Ok(CentroidModel {
                labels: Vec::new(),
                centroids: Array2::zeros((0, features.ncols())),
                inertia: 0.,
            });
        }
        check_finite(ALGORITHM, features)?;

        let records = features.to_owned();
        let dataset = DatasetBase::from(records.clone());
        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let model = KMeans::params_with_rng(self.n_clusters, rng)
            .n_runs(self.n_runs)
            .max_n_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| PipelineError::Clustering {
                algorithm: ALGORITHM,
                message: e.to_string(),
            })?;

        let assigned: Array1<usize> = model.predict(&records);
        let mut centroids = model.centroids().to_owned();
        recenter(features, &mut centroids, &assigned);
        let inertia = inertia(features, &centroids, &assigned);
        debug!(
            "{ALGORITHM}: k = {}, {num_rows} rows, inertia {inertia}",
            self.n_clusters
        );
        Ok(CentroidModel {
            labels: assigned.iter().map(|c| ClusterLabel::Cluster(*c)).collect(),
            centroids,
            inertia,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn t_two_groups() -> Result<()> {
        let features = array![
            [500., 300.],
            [520., 310.],
            [480., 290.],
            [900., 700.],
            [910., 690.]
        ];
        let model = KMeansConfig::new(2).fit(features.view())?;
        let l = &model.labels;
        assert_eq!(l.len(), 5);
        assert_eq!(l[0], l[1]);
        assert_eq!(l[0], l[2]);
        assert_eq!(l[3], l[4]);
        assert_ne!(l[0], l[3]);
        assert_eq!(model.num_clusters(), 2);

        // centroids (500, 300) and (905, 695)
        let expected = 400. + 100. + 400. + 100. + 25. + 25. + 25. + 25.;
        assert_abs_diff_eq!(model.inertia, expected, epsilon = 1e-6);
        assert_abs_diff_eq!(model.selection_criterion(), expected, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn t_single_cluster_inertia() -> Result<()> {
        let features = array![[0., 0.], [2., 0.], [0., 2.], [2., 2.]];
        let model = KMeansConfig::new(1).fit(features.view())?;
        assert!(model.labels.iter().all(|l| *l == ClusterLabel::Cluster(0)));
        assert_abs_diff_eq!(model.centroids[[0, 0]], 1., epsilon = 1e-9);
        assert_abs_diff_eq!(model.inertia, 8., epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn t_too_many_clusters() {
        let features = array![[0., 0.], [1., 1.]];
        let e = KMeansConfig::new(3).fit(features.view()).unwrap_err();
        assert!(e.is_invalid_configuration(), "{e}");
        let e = KMeansConfig::new(0).fit(features.view()).unwrap_err();
        assert!(e.is_invalid_configuration(), "{e}");
    }

    #[test]
    fn t_empty_input() -> Result<()> {
        let features = Array2::<f64>::zeros((0, 2));
        let model = KMeansConfig::new(2).fit(features.view())?;
        assert!(model.labels.is_empty());
        assert_eq!(model.centroids.shape(), &[0, 2]);
        Ok(())
    }

    #[test]
    fn t_recenter() {
        let features = array![[0., 0.], [2., 0.], [10., 10.]];
        let mut centroids = array![[0.9, 0.1], [9.5, 9.5], [-1., -1.]];
        recenter(features.view(), &mut centroids, &array![0, 0, 1]);
        assert_eq!(centroids, array![[1., 0.], [10., 10.], [-1., -1.]]);
    }

    #[test]
    fn t_inertia() {
        let features = array![[0., 0.], [3., 4.]];
        let centroids = array![[0., 0.]];
        assert_abs_diff_eq!(
            inertia(features.view(), &centroids, &array![0, 0]),
            25.
        );
    }
}
