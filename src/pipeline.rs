//! Running the configured analyses: load and normalize the dataset
//! once, then per analysis select the categories, optionally
//! aggregate, cluster, and evaluate the labels against the
//! categories.
//!
//! Stage failures are reported with the analysis name, the stage and
//! the shape of the stage's input table.

use std::path::Path;

use anyhow::{Context, Result};
use kstring::KString;
use strum_macros::Display;

use crate::{
    aggregate::aggregate_means,
    analysis_config::{AnalysisConfig, OutputConfig, PipelineConfig, SweepRange},
    cluster::{cluster, ClusterLabel, ClusteringOutcome, LabeledModel},
    contingency::{contingency_table, ContingencyTable},
    ctx,
    data_table::DataTable,
    info,
    loader::load_csv,
    normalize::normalize_by_group,
    subset::select_categories,
    sweep::{sweep_algorithm, Sweep},
    tables::{
        csv_table_view::csv_file_write,
        excel_table_view::excel_file_write,
        table_view::{Named, TableView},
    },
};

/// Name of the column holding the cluster labels in the output data.
pub const LABEL_COLUMN: &str = "cluster";

/// Name of the column holding the cluster indices (-1 for noise) in
/// the output data.
pub const LABEL_ID_COLUMN: &str = "cluster_id";

/// Name of the group size column of aggregated data.
pub const COUNT_COLUMN: &str = "n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab_case")]
pub enum Stage {
    Load,
    Normalize,
    Subset,
    Aggregate,
    Cluster,
    Evaluate,
    Sweep,
}

/// Read the dataset named in the config.
pub fn load_dataset(config: &PipelineConfig) -> Result<DataTable> {
    let dataset = &config.dataset;
    let options = dataset.load_options()?;
    let table = load_csv(&dataset.path, &options)
        .map_err(ctx!("stage {}: reading {:?}", Stage::Load, dataset.path))?;
    info!("loaded {:?}: {}", dataset.path, table.shape_string());
    Ok(table)
}

/// Add the per-speaker normalized columns, if enabled.
pub fn prepare(table: DataTable, config: &PipelineConfig) -> Result<DataTable> {
    let normalization = &config.normalization;
    if !normalization.enabled {
        return Ok(table);
    }
    normalize_by_group(
        &table,
        &config.dataset.speaker_column,
        &config.dataset.measurements,
        &normalization.suffix,
    )
    .map_err(ctx!(
        "stage {}: input {}",
        Stage::Normalize,
        table.shape_string()
    ))
}

/// Everything one analysis produces.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub name: String,
    pub algorithm: &'static str,
    pub feature_columns: Vec<String>,
    /// The clustered rows, with the labels in `LABEL_COLUMN` and
    /// `LABEL_ID_COLUMN`
    pub data: DataTable,
    pub outcome: ClusteringOutcome,
    /// Categories against clusters
    pub contingency: ContingencyTable<KString, ClusterLabel>,
    /// One row per cluster (size, centroid or mean)
    pub model_summary: DataTable,
    pub sweep: Option<Sweep>,
}

impl AnalysisOutput {
    /// All outputs as tables, named after the analysis.
    pub fn tables(&self) -> Vec<Box<dyn TableView + '_>> {
        let name = &self.name;
        let mut tables: Vec<Box<dyn TableView + '_>> = Vec::new();
        tables.push(Box::new(Named::new(format!("{name} data"), &self.data)));
        tables.push(Box::new(Named::new(
            format!("{name} contingency"),
            &self.contingency,
        )));
        tables.push(Box::new(Named::new(
            format!("{name} model"),
            &self.model_summary,
        )));
        if let Some(sweep) = &self.sweep {
            tables.push(Box::new(Named::new(format!("{name} sweep"), sweep)));
        }
        tables
    }
}

/// Run one analysis on the prepared (loaded and normalized) table.
pub fn run_analysis(
    prepared: &DataTable,
    config: &PipelineConfig,
    analysis: &AnalysisConfig,
) -> Result<AnalysisOutput> {
    let name = &analysis.name;
    let speaker_column = config.dataset.speaker_column.as_str();
    let category_column = config.dataset.category_column.as_str();
    let feature_columns = analysis.feature_columns(config);

    let selected = match &analysis.categories {
        Some(categories) => select_categories(prepared, category_column, categories).map_err(
            ctx!(
                "analysis {name:?}, stage {}: input {}",
                Stage::Subset,
                prepared.shape_string()
            ),
        )?,
        None => prepared.clone(),
    };
    if selected.num_rows() == 0 {
        info!("analysis {name:?}: no rows for the selected categories");
    }

    let data = if analysis.aggregate {
        let keys = [speaker_column, category_column];
        let columns: Vec<&str> = feature_columns.iter().map(String::as_str).collect();
        aggregate_means(&selected, &keys, &columns, Some(COUNT_COLUMN)).map_err(ctx!(
            "analysis {name:?}, stage {}: input {}",
            Stage::Aggregate,
            selected.shape_string()
        ))?
    } else {
        selected
    };

    let cluster_ctx = || {
        format!(
            "analysis {name:?}, stage {}: input {}",
            Stage::Cluster,
            data.shape_string()
        )
    };
    let features = data
        .feature_matrix(&feature_columns)
        .map_err(anyhow::Error::from)
        .with_context(cluster_ctx)?;
    let outcome = cluster(&analysis.method, features.view())
        .map_err(anyhow::Error::from)
        .with_context(cluster_ctx)?;
    info!(
        "analysis {name:?}: {} found {} clusters in {} rows",
        analysis.method.algorithm_name(),
        outcome.num_clusters(),
        data.num_rows()
    );

    let evaluate_ctx = || {
        format!(
            "analysis {name:?}, stage {}: input {}",
            Stage::Evaluate,
            data.shape_string()
        )
    };
    let contingency = contingency_table(
        data.categorical(category_column)
            .map_err(anyhow::Error::from)
            .with_context(evaluate_ctx)?,
        outcome.labels(),
    )
    .map_err(anyhow::Error::from)
    .with_context(evaluate_ctx)?;
    let model_summary = outcome
        .summary_table(&feature_columns)
        .map_err(anyhow::Error::from)
        .with_context(evaluate_ctx)?;

    let sweep = match analysis.sweep {
        Some(SweepRange { from, to }) => Some(
            sweep_algorithm(&analysis.method, features.view(), from..=to).map_err(ctx!(
                "analysis {name:?}, stage {}: input {}",
                Stage::Sweep,
                data.shape_string()
            ))?,
        ),
        None => None,
    };

    let mut data = data;
    data.push_labels(LABEL_COLUMN, outcome.labels())
        .map_err(ctx!("analysis {name:?}: adding the label column"))?;
    data.push_label_ids(LABEL_ID_COLUMN, outcome.labels())
        .map_err(ctx!("analysis {name:?}: adding the label id column"))?;

    Ok(AnalysisOutput {
        name: name.clone(),
        algorithm: analysis.method.algorithm_name(),
        feature_columns,
        data,
        outcome,
        contingency,
        model_summary,
        sweep,
    })
}

/// Load, prepare, and run all analyses of `config`, in order. The
/// first failing analysis aborts the run.
pub fn run_all(config: &PipelineConfig) -> Result<Vec<AnalysisOutput>> {
    let table = load_dataset(config)?;
    let prepared = prepare(table, config)?;
    config
        .analyses
        .iter()
        .map(|analysis| run_analysis(&prepared, config, analysis))
        .collect()
}

/// File name stem for an output table: lower case, runs of anything
/// but letters and digits replaced by `-`.
pub fn file_stem(table_name: &str) -> String {
    let mut stem = String::new();
    for c in table_name.chars() {
        if c.is_alphanumeric() {
            stem.extend(c.to_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    while stem.ends_with('-') {
        stem.pop();
    }
    stem
}

/// Write the tables of all `outputs` as configured in `output`.
pub fn write_outputs(outputs: &[AnalysisOutput], output: &OutputConfig) -> Result<()> {
    let tables: Vec<Box<dyn TableView + '_>> =
        outputs.iter().flat_map(|o| o.tables()).collect();
    if let Some(dir) = &output.csv_dir {
        std::fs::create_dir_all(dir).map_err(ctx!("creating output directory {dir:?}"))?;
        for table in &tables {
            let path = dir.join(format!("{}.csv", file_stem(&table.table_name())));
            csv_file_write(&**table, &path)?;
        }
        info!("wrote {} CSV files to {dir:?}", tables.len());
    }
    if let Some(file) = &output.excel {
        write_excel(&tables, file)?;
        info!("wrote {file:?}");
    }
    Ok(())
}

fn write_excel(tables: &[Box<dyn TableView + '_>], file: &Path) -> Result<()> {
    excel_file_write(tables.iter().map(|t| &**t), file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_file_stem() {
        assert_eq!(file_stem("Tense vowels: k=5 data"), "tense-vowels-k-5-data");
        assert_eq!(file_stem("  a//b  "), "a-b");
        assert_eq!(Stage::Aggregate.to_string(), "aggregate");
    }
}
