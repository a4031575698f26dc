//! Selecting the rows belonging to a set of categories.

use std::collections::BTreeSet;

use crate::{data_table::DataTable, debug, error::PipelineError};

/// The rows of `table` whose `column` value is one of `categories`,
/// in their original order and with all columns. Selecting categories
/// that don't occur gives a table with zero rows.
pub fn select_categories<S: AsRef<str>>(
    table: &DataTable,
    column: &str,
    categories: &[S],
) -> Result<DataTable, PipelineError> {
    let wanted: BTreeSet<&str> = categories.iter().map(|c| c.as_ref()).collect();
    let rows: Vec<usize> = table
        .categorical(column)?
        .iter()
        .enumerate()
        .filter(|(_, val)| wanted.contains(val.as_str()))
        .map(|(i, _)| i)
        .collect();
    debug!(
        "selected {} of {} rows for {column} in {wanted:?}",
        rows.len(),
        table.num_rows()
    );
    Ok(table.take_rows(&rows))
}
