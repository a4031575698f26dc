//! Collapsing the rows of each group (e.g. speaker and vowel) into
//! one row holding the group means.

use kstring::KString;

use crate::{
    data_table::{Column, DataTable},
    debug,
    error::PipelineError,
    stats::Moments,
};

/// One row per distinct tuple of `keys` values, ordered by the tuple,
/// with the key columns and the mean of each of `columns` over the
/// group. Other columns are dropped. If `count_column` is given, the
/// group sizes are appended under that name.
pub fn aggregate_means<S: AsRef<str>>(
    table: &DataTable,
    keys: &[S],
    columns: &[S],
    count_column: Option<&str>,
) -> Result<DataTable, PipelineError> {
    if keys.is_empty() {
        return Err(PipelineError::InvalidConfiguration(
            "aggregation needs at least one key column".into(),
        ));
    }
    let groups = table.group_rows(keys)?;
    let mut output = DataTable::with_num_rows(groups.len());

    for (k, key) in keys.iter().enumerate() {
        let vals = groups.keys().map(|tuple| tuple[k].clone()).collect();
        output.push_column(KString::from_ref(key.as_ref()), Column::Categorical(vals))?;
    }
    for column in columns {
        let column = column.as_ref();
        let vals = table.numeric(column)?;
        let means = groups
            .values()
            .map(|rows| {
                Moments::from_values(rows.iter().map(|i| vals[*i]))
                    .map(|m| m.mean)
                    .expect("groups are never empty")
            })
            .collect();
        output.push_column(KString::from_ref(column), Column::Numeric(means))?;
    }
    if let Some(count_column) = count_column {
        let counts = groups.values().map(|rows| rows.len() as f64).collect();
        output.push_column(KString::from_ref(count_column), Column::Numeric(counts))?;
    }
    debug!(
        "aggregated {} rows into {} groups",
        table.num_rows(),
        output.num_rows()
    );
    Ok(output)
}
