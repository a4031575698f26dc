//! Writing a `TableView` as a CSV file: one header line with the
//! column titles, highlights are dropped.

use std::{io::Write, path::Path};

use anyhow::{anyhow, Context, Result};

use super::table_view::TableView;

pub fn csv_write<W: Write>(table: &dyn TableView, out: W) -> Result<W> {
    let mut writer = csv::Writer::from_writer(out);
    let header = table.table_view_header();
    let titles = (*header).as_ref();
    writer.write_record(titles.iter().map(|(title, _, _)| title.as_bytes()))?;
    for row in table.table_view_body() {
        writer.write_record(row.iter().map(|(val, _)| val.as_bytes()))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("flushing the buffer: {}", e.error()))
}

/// Write `table` to `file` (replacing it).
pub fn csv_file_write(table: &dyn TableView, file: &Path) -> Result<()> {
    let out = std::fs::File::create(file).with_context(|| anyhow!("creating file {file:?}"))?;
    csv_write(table, out).with_context(|| anyhow!("writing table to {file:?}"))?;
    Ok(())
}
