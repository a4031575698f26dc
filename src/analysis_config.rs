//! The configuration file describing a dataset and the analyses to
//! run on it.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::AlgorithmConfig,
    config_file::{save_config_file, LoadConfigFile},
    error::PipelineError,
    loader::LoadOptions,
    normalize::{normalized_column_name, DEFAULT_SUFFIX},
};

fn default_speaker_column() -> String {
    "speaker".into()
}

fn default_category_column() -> String {
    "vowel".into()
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Relative paths are relative to the directory of the config
    /// file
    pub path: PathBuf,
    #[serde(default = "default_speaker_column")]
    pub speaker_column: String,
    #[serde(default = "default_category_column")]
    pub category_column: String,
    /// The numeric measurement columns, e.g. `["F1", "F2"]`
    pub measurements: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl DatasetConfig {
    pub fn load_options(&self) -> Result<LoadOptions, PipelineError> {
        let delimiter = match u8::try_from(self.delimiter) {
            Ok(delimiter) if delimiter.is_ascii() => delimiter,
            _ => {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "delimiter must be an ASCII character, got {:?}",
                    self.delimiter
                )))
            }
        };
        Ok(LoadOptions {
            categorical: vec![self.speaker_column.clone(), self.category_column.clone()],
            numeric: self.measurements.clone(),
            delimiter,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Appended to the measurement column names to name the
    /// normalized columns
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: default_suffix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Write one CSV file per analysis output into this directory
    pub csv_dir: Option<PathBuf>,
    /// Write all outputs into one Excel workbook at this path
    pub excel: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSource {
    /// The per-speaker z-scores
    #[default]
    Normalized,
    /// The measurements as loaded
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepRange {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub name: String,
    /// Restrict to these categories; all rows if absent
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Cluster the per (speaker, category) means instead of the
    /// tokens
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub features: FeatureSource,
    pub method: AlgorithmConfig,
    /// Additionally sweep the cluster count over this range
    #[serde(default)]
    pub sweep: Option<SweepRange>,
}

impl AnalysisConfig {
    /// The names of the feature columns this analysis clusters on.
    pub fn feature_columns(&self, config: &PipelineConfig) -> Vec<String> {
        let measurements = &config.dataset.measurements;
        match self.features {
            FeatureSource::Raw => measurements.clone(),
            FeatureSource::Normalized => measurements
                .iter()
                .map(|m| normalized_column_name(m, &config.normalization.suffix).to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub analyses: Vec<AnalysisConfig>,
}

impl LoadConfigFile for PipelineConfig {
    fn default_config_path_without_suffix() -> Result<Option<PathBuf>> {
        Ok(Some(PathBuf::from("vowel-clusters")))
    }
}

fn invalid(msg: String) -> PipelineError {
    PipelineError::InvalidConfiguration(msg)
}

impl PipelineConfig {
    /// Load from `path` or the default location, make relative paths
    /// relative to the config file, and `check`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_config(path, |msg| {
            anyhow::bail!("no config file given, and none found: {msg}")
        })?;
        if let Some(dir) = path.and_then(|p| p.parent()) {
            config.resolve_paths(dir);
        }
        config.check()?;
        Ok(config)
    }

    /// Re-encode the config, the format is chosen by the extension of
    /// `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_config_file(path, self)
    }

    /// Make the relative paths in the config relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.dataset.path);
        if let Some(dir) = &mut self.output.csv_dir {
            resolve(dir);
        }
        if let Some(file) = &mut self.output.excel {
            resolve(file);
        }
    }

    /// Consistency checks that don't need the data.
    pub fn check(&self) -> Result<(), PipelineError> {
        let dataset = &self.dataset;
        if dataset.measurements.is_empty() {
            return Err(invalid("no measurement columns given".into()));
        }
        let mut columns = BTreeSet::new();
        for column in [&dataset.speaker_column, &dataset.category_column]
            .into_iter()
            .chain(&dataset.measurements)
        {
            if !columns.insert(column.as_str()) {
                return Err(invalid(format!(
                    "column {column:?} is named more than once in the dataset section"
                )));
            }
        }
        dataset.load_options()?;
        if self.normalization.enabled && self.normalization.suffix.is_empty() {
            return Err(invalid("the normalization suffix must not be empty".into()));
        }
        if self.analyses.is_empty() {
            return Err(invalid("no analyses given".into()));
        }

        let mut names = BTreeSet::new();
        for analysis in &self.analyses {
            let name = &analysis.name;
            if name.trim().is_empty() {
                return Err(invalid("analysis with empty name".into()));
            }
            if !names.insert(name.as_str()) {
                return Err(invalid(format!("duplicate analysis name {name:?}")));
            }
            if analysis.features == FeatureSource::Normalized && !self.normalization.enabled {
                return Err(invalid(format!(
                    "analysis {name:?} uses normalized features, but normalization is disabled"
                )));
            }
            if let Some(SweepRange { from, to }) = analysis.sweep {
                if !analysis.method.has_cluster_count() {
                    return Err(invalid(format!(
                        "analysis {name:?}: {} has no cluster count to sweep over",
                        analysis.method.algorithm_name()
                    )));
                }
                if from == 0 || from > to {
                    return Err(invalid(format!(
                        "analysis {name:?}: invalid sweep range {from}..={to}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cluster::KMeansConfig, config_file::ConfigBackend};

    const CONFIG: &str = r#"{
        dataset: {
            path: "formants.csv",
            measurements: ["F1", "F2"],
        },
        output: { csv_dir: "out" },
        analyses: [
            {
                name: "tense",
                categories: ["iy", "ey", "aa", "ow", "uw"],
                method: { algorithm: "kmeans", n_clusters: 5 },
                sweep: { from: 1, to: 8 },
            },
            {
                name: "tense means",
                categories: ["iy", "ey", "aa", "ow", "uw"],
                aggregate: true,
                features: "raw",
                method: { algorithm: "gmm", n_components: 5, criterion: "aic" },
            },
            {
                name: "density",
                method: { algorithm: "dbscan", radius: 0.3, min_points: 5 },
            },
        ],
    }"#;

    #[test]
    fn t_parse_and_check() -> Result<()> {
        let config: PipelineConfig = ConfigBackend::Json5.decode(CONFIG)?;
        config.check()?;
        assert_eq!(config.dataset.speaker_column, "speaker");
        assert_eq!(config.dataset.delimiter, ',');
        assert!(config.normalization.enabled);
        assert_eq!(config.analyses.len(), 3);
        let tense = &config.analyses[0];
        assert_eq!(tense.method, AlgorithmConfig::KMeans(KMeansConfig::new(5)));
        assert_eq!(tense.feature_columns(&config), ["F1_z", "F2_z"]);
        assert_eq!(config.analyses[1].feature_columns(&config), ["F1", "F2"]);
        assert_eq!(config.analyses[2].categories, None);
        Ok(())
    }

    #[test]
    fn t_check_failures() -> Result<()> {
        let base: PipelineConfig = ConfigBackend::Json5.decode(CONFIG)?;

        let mut c = base.clone();
        c.analyses[1].name = "tense".into();
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let mut c = base.clone();
        c.analyses[2].sweep = Some(SweepRange { from: 1, to: 3 });
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let mut c = base.clone();
        c.analyses[0].sweep = Some(SweepRange { from: 4, to: 3 });
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let mut c = base.clone();
        c.normalization.enabled = false;
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let mut c = base.clone();
        c.dataset.measurements.push("F1".into());
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let mut c = base.clone();
        c.dataset.delimiter = '§';
        assert!(c.check().unwrap_err().is_invalid_configuration());

        let unknown = CONFIG.replace("aggregate: true", "aggregated: true");
        assert!(ConfigBackend::Json5.decode::<PipelineConfig>(&unknown).is_err());
        Ok(())
    }

    #[test]
    fn t_save_reencodes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config: PipelineConfig = ConfigBackend::Json5.decode(CONFIG)?;
        for ext in ["yaml", "json5"] {
            let path = dir.path().join(format!("saved.{ext}"));
            config.save(&path)?;
            let mut expected = config.clone();
            expected.resolve_paths(dir.path());
            assert_eq!(PipelineConfig::load(Some(&path))?, expected);
        }
        Ok(())
    }

    #[test]
    fn t_load_resolves_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("analyses.json5");
        std::fs::write(&path, CONFIG)?;
        let config = PipelineConfig::load(Some(&path))?;
        assert_eq!(config.dataset.path, dir.path().join("formants.csv"));
        assert_eq!(config.output.csv_dir, Some(dir.path().join("out")));
        assert_eq!(config.output.excel, None);
        Ok(())
    }
}
