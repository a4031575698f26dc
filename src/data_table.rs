//! An in-memory column store for the measurement tables flowing
//! through the pipeline. Columns are either categorical (speaker,
//! vowel, cluster label) or numeric (formants, z-scores, means); all
//! columns of a table have the same length.

use std::{borrow::Cow, collections::BTreeMap};

use genawaiter::rc::Gen;
use kstring::KString;
use ndarray::Array2;

use crate::{
    cluster::ClusterLabel,
    error::PipelineError,
    tables::table_view::{ColumnFormatting, ColumnHeader, Highlight, Named, TableView, Unit},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Categorical(Vec<KString>),
    Numeric(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(vals) => vals.len(),
            Column::Numeric(vals) => vals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Column::Categorical(_) => "categorical",
            Column::Numeric(_) => "numeric",
        }
    }

    /// Panics for out of range indices.
    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Categorical(vals) => {
                Column::Categorical(indices.iter().map(|i| vals[*i].clone()).collect())
            }
            Column::Numeric(vals) => Column::Numeric(indices.iter().map(|i| vals[*i]).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTable {
    num_rows: usize,
    names: Vec<KString>,
    columns: Vec<Column>,
}

impl DataTable {
    /// A table without columns but with the given number of rows;
    /// columns added via `push_column` must match it.
    pub fn with_num_rows(num_rows: usize) -> Self {
        Self {
            num_rows,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// The row count is taken from the first column (0 if there is
    /// none).
    pub fn from_columns(
        columns: impl IntoIterator<Item = (KString, Column)>,
    ) -> Result<Self, PipelineError> {
        let mut columns = columns.into_iter().peekable();
        let num_rows = columns.peek().map(|(_, column)| column.len()).unwrap_or(0);
        let mut table = Self::with_num_rows(num_rows);
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn push_column(
        &mut self,
        name: impl Into<KString>,
        column: Column,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(PipelineError::DuplicateColumn(name.to_string()));
        }
        if column.len() != self.num_rows {
            return Err(PipelineError::LengthMismatch {
                what: "new column vs. table rows",
                left: column.len(),
                right: self.num_rows,
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Append a categorical column holding the given cluster labels
    /// (noise is rendered as "noise"). Several labelings can coexist
    /// under different names.
    pub fn push_labels(
        &mut self,
        name: impl Into<KString>,
        labels: &[ClusterLabel],
    ) -> Result<(), PipelineError> {
        let vals = labels
            .iter()
            .map(|label| KString::from_string(label.to_string()))
            .collect();
        self.push_column(name, Column::Categorical(vals))
    }

    /// Append a numeric column holding the cluster indices, -1 for
    /// noise.
    pub fn push_label_ids(
        &mut self,
        name: impl Into<KString>,
        labels: &[ClusterLabel],
    ) -> Result<(), PipelineError> {
        let vals = labels.iter().map(|label| label.as_i64() as f64).collect();
        self.push_column(name, Column::Numeric(vals))
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// "rows x columns", for error messages and logging
    pub fn shape_string(&self) -> String {
        format!("{} rows x {} columns", self.num_rows, self.columns.len())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_str() == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        let i = self.names.iter().position(|n| n.as_str() == name)?;
        Some(&self.columns[i])
    }

    fn required_column(&self, name: &str) -> Result<&Column, PipelineError> {
        self.column(name).ok_or_else(|| {
            PipelineError::MissingData(format!(
                "no column {name:?} (have: {:?})",
                self.column_names().collect::<Vec<_>>()
            ))
        })
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64], PipelineError> {
        match self.required_column(name)? {
            Column::Numeric(vals) => Ok(vals),
            column => Err(PipelineError::MissingData(format!(
                "column {name:?} is {}, expected numeric",
                column.kind_name()
            ))),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&[KString], PipelineError> {
        match self.required_column(name)? {
            Column::Categorical(vals) => Ok(vals),
            column => Err(PipelineError::MissingData(format!(
                "column {name:?} is {}, expected categorical",
                column.kind_name()
            ))),
        }
    }

    /// A new table with the rows at `indices`, in that order, and all
    /// columns. Panics for out of range indices.
    pub fn take_rows(&self, indices: &[usize]) -> DataTable {
        DataTable {
            num_rows: indices.len(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Row indices for each distinct tuple of values in the given
    /// categorical columns, ordered by the tuple, indices ascending
    /// within each group.
    pub fn group_rows<S: AsRef<str>>(
        &self,
        keys: &[S],
    ) -> Result<BTreeMap<Vec<KString>, Vec<usize>>, PipelineError> {
        let key_columns = keys
            .iter()
            .map(|key| self.categorical(key.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut groups: BTreeMap<Vec<KString>, Vec<usize>> = BTreeMap::new();
        for row in 0..self.num_rows {
            let key: Vec<KString> = key_columns.iter().map(|c| c[row].clone()).collect();
            groups.entry(key).or_default().push(row);
        }
        Ok(groups)
    }

    /// The given numeric columns as a rows x features matrix. All
    /// values must be finite.
    pub fn feature_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>, PipelineError> {
        if names.is_empty() {
            return Err(PipelineError::MissingData(
                "no feature columns selected".into(),
            ));
        }
        let columns = names
            .iter()
            .map(|name| self.numeric(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut features = Array2::zeros((self.num_rows, columns.len()));
        for (j, (name, vals)) in names.iter().zip(&columns).enumerate() {
            for (i, val) in vals.iter().enumerate() {
                if !val.is_finite() {
                    return Err(PipelineError::MissingData(format!(
                        "non-finite value {val} in feature column {:?} at row {i} \
                         (group too small for normalization?)",
                        name.as_ref()
                    )));
                }
                features[[i, j]] = *val;
            }
        }
        Ok(features)
    }
}

impl<'t> TableView for Named<'t, DataTable> {
    fn table_name(&self) -> Cow<'_, str> {
        self.name.as_ref().into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[ColumnHeader]>> {
        let header: Vec<ColumnHeader> = self
            .inner
            .names
            .iter()
            .zip(&self.inner.columns)
            .map(|(name, column)| {
                let formatting = match column {
                    Column::Categorical(_) => ColumnFormatting::String,
                    Column::Numeric(_) => ColumnFormatting::Number,
                };
                (Cow::Owned(name.to_string()), Unit::None, formatting)
            })
            .collect();
        Box::new(header)
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        let table: &'s DataTable = self.inner;
        Box::new(
            Gen::new(|co| async move {
                for row in 0..table.num_rows {
                    let vals: Vec<(Cow<'s, str>, Highlight)> = table
                        .columns
                        .iter()
                        .map(|column| match column {
                            Column::Categorical(vals) => {
                                (Cow::Borrowed(vals[row].as_str()), Highlight::Neutral)
                            }
                            Column::Numeric(vals) => {
                                (Cow::Owned(vals[row].to_string()), Highlight::Neutral)
                            }
                        })
                        .collect();
                    co.yield_(vals.into()).await;
                }
            })
            .into_iter(),
        )
    }
}

/// Shorthand for building categorical columns in tests and demos.
pub fn categorical<S: AsRef<str>>(vals: &[S]) -> Column {
    Column::Categorical(vals.iter().map(|v| KString::from_ref(v.as_ref())).collect())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn table() -> Result<DataTable> {
        Ok(DataTable::from_columns([
            (KString::from_static("speaker"), categorical(&["a", "b", "a"])),
            (KString::from_static("vowel"), categorical(&["iy", "iy", "aa"])),
            (KString::from_static("F1"), Column::Numeric(vec![300., 320., 700.])),
        ])?)
    }

    #[test]
    fn t_push_column_checks() -> Result<()> {
        let mut t = table()?;
        assert!(matches!(
            t.push_column("F2", Column::Numeric(vec![1.])),
            Err(PipelineError::LengthMismatch { .. })
        ));
        assert!(matches!(
            t.push_column("F1", Column::Numeric(vec![1., 2., 3.])),
            Err(PipelineError::DuplicateColumn(_))
        ));
        t.push_column("F2", Column::Numeric(vec![2200., 2100., 1100.]))?;
        assert_eq!(t.num_columns(), 4);
        assert_eq!(t.shape_string(), "3 rows x 4 columns");
        Ok(())
    }

    #[test]
    fn t_column_kinds() -> Result<()> {
        let t = table()?;
        assert_eq!(t.numeric("F1")?, &[300., 320., 700.]);
        assert!(t.numeric("vowel").unwrap_err().is_missing_data());
        assert!(t.categorical("F1").unwrap_err().is_missing_data());
        assert!(t.numeric("F3").unwrap_err().is_missing_data());
        Ok(())
    }

    #[test]
    fn t_take_and_group() -> Result<()> {
        let t = table()?;
        let sub = t.take_rows(&[2, 0]);
        assert_eq!(sub.num_rows(), 2);
        assert_eq!(sub.numeric("F1")?, &[700., 300.]);

        let groups = t.group_rows(&["speaker"])?;
        let groups: Vec<_> = groups
            .into_iter()
            .map(|(k, v)| (k.into_iter().map(|k| k.to_string()).collect::<Vec<_>>(), v))
            .collect();
        assert_eq!(
            groups,
            vec![(vec!["a".to_string()], vec![0, 2]), (vec!["b".to_string()], vec![1])]
        );
        assert!(t.group_rows(&["F1"]).is_err());
        Ok(())
    }

    #[test]
    fn t_feature_matrix() -> Result<()> {
        let mut t = table()?;
        t.push_column("F2", Column::Numeric(vec![2200., 2100., 1100.]))?;
        let m = t.feature_matrix(&["F1", "F2"])?;
        assert_eq!(m.shape(), &[3, 2]);
        assert_eq!(m[[2, 1]], 1100.);

        t.push_column("bad", Column::Numeric(vec![1., f64::NAN, 3.]))?;
        assert!(t.feature_matrix(&["F1", "bad"]).unwrap_err().is_missing_data());
        assert!(t.feature_matrix::<&str>(&[]).unwrap_err().is_missing_data());
        Ok(())
    }

    #[test]
    fn t_label_columns() -> Result<()> {
        let mut t = table()?;
        let labels = [
            ClusterLabel::Cluster(1),
            ClusterLabel::Noise,
            ClusterLabel::Cluster(0),
        ];
        t.push_labels("cluster", &labels)?;
        t.push_label_ids("cluster_id", &labels)?;
        let names: Vec<&str> = t.categorical("cluster")?.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["1", "noise", "0"]);
        assert_eq!(t.numeric("cluster_id")?, &[1., -1., 0.]);
        assert!(t.push_label_ids("cluster_id", &labels).is_err());
        Ok(())
    }

    #[test]
    fn t_table_view() -> Result<()> {
        let t = table()?;
        let view = Named::new("data", &t);
        let header = view.table_view_header();
        assert_eq!((*header).as_ref().len(), 3);
        let rows: Vec<Vec<String>> = view
            .table_view_body()
            .map(|row| row.iter().map(|(s, _)| s.to_string()).collect())
            .collect();
        assert_eq!(rows[2], vec!["a", "aa", "700"]);
        Ok(())
    }
}
