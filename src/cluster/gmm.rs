//! Gaussian mixtures (full covariances) via linfa's EM
//! implementation. linfa gives us the fitted weights, means and
//! covariances; the posterior probabilities, log-likelihood and
//! information criteria are derived from those here.

use std::f64::consts::PI;

use linfa::{
    traits::{Fit, Predict},
    DatasetBase,
};
use linfa_clustering::GaussianMixtureModel;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::{check_cluster_count, check_finite, ClusterLabel, Clusterer, LabeledModel},
    debug,
    error::PipelineError,
    sweep::SelectionCriterion,
};

const ALGORITHM: &str = "gaussian mixture";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    /// Bayesian information criterion, `-2 ln L + p ln n`
    #[default]
    Bic,
    /// Akaike information criterion, `-2 ln L + 2 p`
    Aic,
}

impl InformationCriterion {
    pub fn name(self) -> &'static str {
        match self {
            InformationCriterion::Bic => "BIC",
            InformationCriterion::Aic => "AIC",
        }
    }

    pub fn value(self, log_likelihood: f64, num_parameters: usize, num_rows: usize) -> f64 {
        let p = num_parameters as f64;
        match self {
            InformationCriterion::Bic => -2. * log_likelihood + p * (num_rows as f64).ln(),
            InformationCriterion::Aic => -2. * log_likelihood + 2. * p,
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_n_runs() -> u64 {
    3
}

fn default_max_iterations() -> u64 {
    100
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_reg_covariance() -> f64 {
    1e-6
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GmmConfig {
    pub n_components: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of EM runs from different initializations; the best
    /// one is kept
    #[serde(default = "default_n_runs")]
    pub n_runs: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Added to the covariance diagonals
    #[serde(default = "default_reg_covariance")]
    pub reg_covariance: f64,
    /// Which criterion `selection_criterion` reports
    #[serde(default)]
    pub criterion: InformationCriterion,
}

impl GmmConfig {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            seed: default_seed(),
            n_runs: default_n_runs(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            reg_covariance: default_reg_covariance(),
            criterion: InformationCriterion::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MixtureModel {
    pub labels: Vec<ClusterLabel>,
    /// Mixing weights, one per component, summing to 1
    pub weights: Array1<f64>,
    /// components x features
    pub means: Array2<f64>,
    /// components x features x features
    pub covariances: Array3<f64>,
    /// rows x components; each row sums to 1
    pub posteriors: Array2<f64>,
    pub log_likelihood: f64,
    pub criterion: InformationCriterion,
    pub criterion_value: f64,
}

impl MixtureModel {
    /// Free parameters of a full-covariance mixture: means,
    /// covariance triangles, and all but one weight.
    pub fn num_parameters(&self) -> usize {
        num_parameters(self.means.nrows(), self.means.ncols())
    }
}

fn num_parameters(num_components: usize, dim: usize) -> usize {
    if num_components == 0 {
        return 0;
    }
    num_components * dim + num_components * dim * (dim + 1) / 2 + num_components - 1
}

impl LabeledModel for MixtureModel {
    fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    fn num_clusters(&self) -> usize {
        self.weights.len()
    }
}

impl SelectionCriterion for MixtureModel {
    fn criterion_name(&self) -> &'static str {
        self.criterion.name()
    }

    fn selection_criterion(&self) -> f64 {
        self.criterion_value
    }
}

/// Lower triangular `l` with `l l^T = a`; None if `a` is not
/// (numerically) positive definite.
fn cholesky(a: ArrayView2<'_, f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0. || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// ln N(x | mean, l l^T), with `l` the Cholesky factor of the
/// covariance.
fn log_density(x: ArrayView1<'_, f64>, mean: ArrayView1<'_, f64>, l: &Array2<f64>) -> f64 {
    let dim = x.len();
    // forward substitution: l y = x - mean
    let mut y = vec![0.; dim];
    for i in 0..dim {
        let mut sum = x[i] - mean[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    let mahalanobis: f64 = y.iter().map(|v| v * v).sum();
    let log_det: f64 = (0..dim).map(|i| l[[i, i]].ln()).sum::<f64>() * 2.;
    -0.5 * (dim as f64 * (2. * PI).ln() + log_det + mahalanobis)
}

/// Posterior probabilities (rows x components) and total
/// log-likelihood of `features` under the given mixture.
pub fn posteriors_and_log_likelihood(
    features: ArrayView2<'_, f64>,
    weights: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &Array3<f64>,
) -> Result<(Array2<f64>, f64), PipelineError> {
    let num_components = weights.len();
    let factors = (0..num_components)
        .map(|k| {
            cholesky(covariances.index_axis(ndarray::Axis(0), k)).ok_or_else(|| {
                PipelineError::Clustering {
                    algorithm: ALGORITHM,
                    message: format!("covariance of component {k} is not positive definite"),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut posteriors = Array2::<f64>::zeros((features.nrows(), num_components));
    let mut log_likelihood = 0.;
    for (i, x) in features.rows().into_iter().enumerate() {
        let mut row = posteriors.row_mut(i);
        for k in 0..num_components {
            row[k] = weights[k].ln() + log_density(x, means.row(k), &factors[k]);
        }
        let max = row.fold(f64::NEG_INFINITY, |a, b| a.max(*b));
        let log_sum = max + row.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
        row.mapv_inplace(|v| (v - log_sum).exp());
        log_likelihood += log_sum;
    }
    Ok((posteriors, log_likelihood))
}

impl Clusterer for GmmConfig {
    type Model = MixtureModel;

    fn algorithm_name(&self) -> &'static str {
        "gmm"
    }

    fn fit(&self, features: ArrayView2<'_, f64>) -> Result<MixtureModel, PipelineError> {
        let num_rows = features.nrows();
        let dim = features.ncols();
        check_cluster_count(ALGORITHM, "component", self.n_components, num_rows)?;
        if num_rows == 0 {
            return Ok(MixtureModel {
                labels: Vec::new(),
                weights: Array1::zeros(0),
                means: Array2::zeros((0, dim)),
                covariances: Array3::zeros((0, dim, dim)),
                posteriors: Array2::zeros((0, self.n_components)),
                log_likelihood: 0.,
                criterion: self.criterion,
                criterion_value: 0.,
            });
        }
        check_finite(ALGORITHM, features)?;

        let records = features.to_owned();
        let dataset = DatasetBase::from(records.clone());
        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let model = GaussianMixtureModel::params(self.n_components)
            .n_runs(self.n_runs)
            .max_n_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .reg_covariance(self.reg_covariance)
            .with_rng(rng)
            .fit(&dataset)
            .map_err(|e| PipelineError::Clustering {
                algorithm: ALGORITHM,
                message: e.to_string(),
            })?;

        let assigned: Array1<usize> = model.predict(&records);
        let weights = model.weights().to_owned();
        let means = model.means().to_owned();
        let covariances = model.covariances().to_owned();
        let (posteriors, log_likelihood) =
            posteriors_and_log_likelihood(features, &weights, &means, &covariances)?;
        let criterion_value = self.criterion.value(
            log_likelihood,
            num_parameters(self.n_components, dim),
            num_rows,
        );
        debug!(
            "{ALGORITHM}: {} components, {num_rows} rows, ln L = {log_likelihood}, {} = {criterion_value}",
            self.n_components,
            self.criterion.name()
        );
        Ok(MixtureModel {
            labels: assigned.iter().map(|c| ClusterLabel::Cluster(*c)).collect(),
            weights,
            means,
            covariances,
            posteriors,
            log_likelihood,
            criterion: self.criterion,
            criterion_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Axis};
    use ndarray_rand::{rand_distr::Normal, RandomExt};

    use super::*;

    /// Two blobs of 40 rows each around (0, 0) and (6, 6).
    fn blobs() -> Array2<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let mut features =
            Array2::random_using((80, 2), Normal::new(0., 0.5).expect("valid sd"), &mut rng);
        features
            .slice_mut(ndarray::s![40.., ..])
            .mapv_inplace(|v| v + 6.);
        features
    }

    #[test]
    fn t_cholesky_and_density() {
        let a = array![[4., 2.], [2., 3.]];
        let l = cholesky(a.view()).expect("positive definite");
        for (x, y) in l.dot(&l.t()).iter().zip(a.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
        assert!(cholesky(array![[1., 2.], [2., 1.]].view()).is_none());

        // standard normal in 1D at 0
        let l = array![[1.]];
        assert_abs_diff_eq!(
            log_density(array![0.].view(), array![0.].view(), &l),
            -0.5 * (2. * PI).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn t_parameter_count() {
        // 2 components in 2D: 4 mean values, 6 covariance values, 1 weight
        assert_eq!(num_parameters(2, 2), 11);
        assert_eq!(num_parameters(1, 1), 2);
        assert_eq!(num_parameters(0, 2), 0);
    }

    #[test]
    fn t_fit_blobs() -> Result<()> {
        let features = blobs();
        let model = GmmConfig::new(2).fit(features.view())?;
        assert_eq!(model.num_clusters(), 2);
        assert_eq!(model.posteriors.shape(), &[80, 2]);
        for row in model.posteriors.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1., epsilon = 1e-9);
        }
        assert_abs_diff_eq!(model.weights.sum(), 1., epsilon = 1e-6);

        let first = model.labels[0];
        assert!(model.labels[..40].iter().all(|l| *l == first));
        assert!(model.labels[40..].iter().all(|l| *l != first));

        // posterior argmax agrees with the library's labels
        for (row, label) in model.posteriors.axis_iter(Axis(0)).zip(&model.labels) {
            let argmax = if row[0] >= row[1] { 0 } else { 1 };
            assert_eq!(ClusterLabel::Cluster(argmax), *label);
        }

        assert_eq!(model.num_parameters(), 11);
        assert_abs_diff_eq!(
            model.selection_criterion(),
            -2. * model.log_likelihood + 11. * 80f64.ln(),
            epsilon = 1e-9
        );
        Ok(())
    }

    #[test]
    fn t_bic_prefers_two_components() -> Result<()> {
        let features = blobs();
        let one = GmmConfig::new(1).fit(features.view())?;
        let two = GmmConfig::new(2).fit(features.view())?;
        assert!(two.criterion_value < one.criterion_value);

        let mut aic = GmmConfig::new(2);
        aic.criterion = InformationCriterion::Aic;
        let two_aic = aic.fit(features.view())?;
        assert_eq!(two_aic.criterion_name(), "AIC");
        assert_abs_diff_eq!(
            two_aic.criterion_value,
            -2. * two_aic.log_likelihood + 22.,
            epsilon = 1e-9
        );
        Ok(())
    }

    #[test]
    fn t_invalid_and_empty() -> Result<()> {
        let features = array![[0., 0.], [1., 1.]];
        assert!(GmmConfig::new(3)
            .fit(features.view())
            .unwrap_err()
            .is_invalid_configuration());

        let empty = Array2::<f64>::zeros((0, 2));
        let model = GmmConfig::new(2).fit(empty.view())?;
        assert!(model.labels.is_empty());
        assert_eq!(model.posteriors.shape(), &[0, 2]);
        Ok(())
    }
}
