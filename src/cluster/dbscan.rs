//! DBSCAN via linfa; rows in no dense region are labelled noise.

use linfa::traits::Transformer;
use linfa_clustering::Dbscan;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    cluster::{check_finite, ClusterLabel, Clusterer, LabeledModel},
    debug,
    error::PipelineError,
};

const ALGORITHM: &str = "DBSCAN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbscanConfig {
    /// Neighborhood radius (Euclidean distance in feature space)
    #[serde(alias = "eps", alias = "tolerance")]
    pub radius: f64,
    /// Minimum number of neighbors within `radius` for a point to be
    /// a core point
    pub min_points: usize,
}

impl DbscanConfig {
    pub fn new(radius: f64, min_points: usize) -> Self {
        Self { radius, min_points }
    }

    fn check(&self) -> Result<(), PipelineError> {
        if !(self.radius > 0.) || !self.radius.is_finite() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "{ALGORITHM}: radius must be a positive number, got {}",
                self.radius
            )));
        }
        if self.min_points < 2 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "{ALGORITHM}: min_points must be at least 2, got {}",
                self.min_points
            )));
        }
        Ok(())
    }
}

/// The number of clusters is determined by the data, there are no
/// centroids.
#[derive(Debug, Clone)]
pub struct DensityModel {
    pub labels: Vec<ClusterLabel>,
    pub num_clusters: usize,
    pub num_noise: usize,
}

impl LabeledModel for DensityModel {
    fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    fn num_clusters(&self) -> usize {
        self.num_clusters
    }
}

impl Clusterer for DbscanConfig {
    type Model = DensityModel;

    fn algorithm_name(&self) -> &'static str {
        "dbscan"
    }

    fn fit(&self, features: ArrayView2<'_, f64>) -> Result<DensityModel, PipelineError> {
        self.check()?;
        if features.nrows() == 0 {
            return Ok(DensityModel {
                labels: Vec::new(),
                num_clusters: 0,
                num_noise: 0,
            });
        }
        check_finite(ALGORITHM, features)?;

        let records = features.to_owned();
        let clusters: Array1<Option<usize>> = Dbscan::params(self.min_points)
            .tolerance(self.radius)
            .transform(&records)
            .map_err(|e| PipelineError::Clustering {
                algorithm: ALGORITHM,
                message: e.to_string(),
            })?;

        let labels: Vec<ClusterLabel> = clusters.iter().map(|c| ClusterLabel::from(*c)).collect();
        let num_clusters = labels
            .iter()
            .filter_map(|l| l.cluster_index())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);
        let num_noise = labels.iter().filter(|l| **l == ClusterLabel::Noise).count();
        debug!(
            "{ALGORITHM}: radius {}, min_points {}: {num_clusters} clusters, {num_noise} noise points",
            self.radius, self.min_points
        );
        Ok(DensityModel {
            labels,
            num_clusters,
            num_noise,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn t_clusters_and_noise() -> Result<()> {
        let features = array![
            [0., 0.],
            [0.1, 0.],
            [0., 0.1],
            [0.1, 0.1],
            [5., 5.],
            [5.1, 5.],
            [5., 5.1],
            [5.1, 5.1],
            [20., -20.],
        ];
        let model = DbscanConfig::new(0.5, 3).fit(features.view())?;
        let l = &model.labels;
        assert_eq!(model.num_clusters, 2);
        assert_eq!(model.num_noise, 1);
        assert_eq!(l[8], ClusterLabel::Noise);
        assert!(l[..4].iter().all(|x| *x == l[0]));
        assert!(l[4..8].iter().all(|x| *x == l[4]));
        assert_ne!(l[0], l[4]);
        assert_ne!(l[0], ClusterLabel::Noise);
        Ok(())
    }

    #[test]
    fn t_invalid_parameters() {
        let features = array![[0., 0.], [1., 1.]];
        for config in [
            DbscanConfig::new(0., 3),
            DbscanConfig::new(-1., 3),
            DbscanConfig::new(f64::NAN, 3),
            DbscanConfig::new(0.5, 1),
        ] {
            let e = config.fit(features.view()).unwrap_err();
            assert!(e.is_invalid_configuration(), "{e}");
        }
    }

    #[test]
    fn t_empty_input() -> Result<()> {
        let model = DbscanConfig::new(0.5, 3).fit(Array2::<f64>::zeros((0, 2)).view())?;
        assert!(model.labels.is_empty());
        assert_eq!(model.num_clusters, 0);
        Ok(())
    }
}
