//! Per-group z-score normalization (e.g. per speaker, to factor out
//! vocal tract size).

use kstring::KString;

use crate::{
    data_table::{Column, DataTable},
    debug,
    error::PipelineError,
    stats::Moments,
    warn,
};

pub const DEFAULT_SUFFIX: &str = "_z";

pub fn normalized_column_name(column: &str, suffix: &str) -> KString {
    KString::from_string(format!("{column}{suffix}"))
}

/// A copy of `table` with, for each of `columns`, a new column
/// `{column}{suffix}` holding the z-score of each value within the
/// rows sharing its `group_column` value, using the group's sample
/// standard deviation. Values in groups with fewer than 2 rows or
/// without spread become NaN.
pub fn normalize_by_group<S: AsRef<str>>(
    table: &DataTable,
    group_column: &str,
    columns: &[S],
    suffix: &str,
) -> Result<DataTable, PipelineError> {
    let groups = table.group_rows(&[group_column])?;
    let mut output = table.clone();
    for column in columns {
        let column = column.as_ref();
        let vals = table.numeric(column)?;
        let mut normalized = vec![f64::NAN; vals.len()];
        for rows in groups.values() {
            let moments = Moments::from_values(rows.iter().map(|i| vals[*i]))
                .expect("groups are never empty");
            for i in rows {
                normalized[*i] = moments.z_score(vals[*i]);
            }
        }
        output.push_column(
            normalized_column_name(column, suffix),
            Column::Numeric(normalized),
        )?;
    }
    let num_small = groups.values().filter(|rows| rows.len() < 2).count();
    debug!(
        "normalized {} columns within {} groups of {group_column:?}",
        columns.len(),
        groups.len()
    );
    if num_small > 0 {
        warn!(
            "{num_small} of the {group_column:?} groups have a single row, \
             their normalized values are NaN"
        );
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::data_table::categorical;

    fn table() -> Result<DataTable> {
        Ok(DataTable::from_columns([
            (
                KString::from_static("speaker"),
                categorical(&["a", "a", "b", "a", "b", "b", "c"]),
            ),
            (
                KString::from_static("F1"),
                Column::Numeric(vec![300., 500., 250., 700., 450., 650., 400.]),
            ),
            (
                KString::from_static("F2"),
                Column::Numeric(vec![2300., 1500., 2500., 1100., 1800., 1000., 900.]),
            ),
        ])?)
    }

    #[test]
    fn t_group_mean_and_sd() -> Result<()> {
        let t = table()?;
        let n = normalize_by_group(&t, "speaker", &["F1", "F2"], DEFAULT_SUFFIX)?;
        assert_eq!(n.num_columns(), 5);
        // originals untouched
        assert_eq!(n.numeric("F1")?, t.numeric("F1")?);

        let groups = n.group_rows(&["speaker"])?;
        for column in ["F1_z", "F2_z"] {
            let vals = n.numeric(column)?;
            for (key, rows) in &groups {
                if rows.len() < 2 {
                    assert!(rows.iter().all(|i| vals[*i].is_nan()), "{key:?}");
                    continue;
                }
                let m = Moments::from_values(rows.iter().map(|i| vals[*i]))?;
                assert_abs_diff_eq!(m.mean, 0., epsilon = 1e-9);
                assert_abs_diff_eq!(m.sample_standard_deviation(), 1., epsilon = 1e-9);
            }
        }
        // speaker a: F1 mean 500, sd 200
        assert_abs_diff_eq!(n.numeric("F1_z")?[0], -1., epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn t_errors_and_degenerate() -> Result<()> {
        let t = table()?;
        assert!(normalize_by_group(&t, "speaker", &["F3"], "_z")
            .unwrap_err()
            .is_missing_data());
        assert!(normalize_by_group(&t, "nobody", &["F1"], "_z")
            .unwrap_err()
            .is_missing_data());
        assert!(matches!(
            normalize_by_group(&t, "speaker", &["F1"], ""),
            Err(PipelineError::DuplicateColumn(_))
        ));

        let flat = DataTable::from_columns([
            (KString::from_static("speaker"), categorical(&["a", "a"])),
            (KString::from_static("F1"), Column::Numeric(vec![400., 400.])),
        ])?;
        let n = normalize_by_group(&flat, "speaker", &["F1"], "_norm")?;
        assert!(n.numeric("F1_norm")?.iter().all(|v| v.is_nan()));
        Ok(())
    }

    #[test]
    fn t_empty_table() -> Result<()> {
        let t = table()?.take_rows(&[]);
        let n = normalize_by_group(&t, "speaker", &["F1"], "_z")?;
        assert_eq!(n.num_rows(), 0);
        assert!(n.has_column("F1_z"));
        Ok(())
    }
}
