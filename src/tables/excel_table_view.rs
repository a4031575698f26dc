use std::{
    borrow::Cow,
    collections::BTreeSet,
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use rust_xlsxwriter::{workbook::Workbook, Color, Format, FormatAlign};

use super::table_view::{ColumnFormatting, Highlight, TableView, Unit};

/// How many characters to add to the automatic column width
/// calculation to try to avoid setting widths too small to accomodate
/// the strings in the cells.
const WIDTH_SAFETY_MARGIN_CHARS: f64 = 2.0;

/// Excel's limit on worksheet name lengths.
const MAX_SHEET_NAME_CHARS: usize = 31;

/// Worksheet names can't contain some characters, are limited in
/// length, and must be unique (case-insensitively) in a workbook.
fn sheet_name(table_name: &str, used: &mut BTreeSet<String>) -> String {
    let base: String = table_name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    let base = if base.trim().is_empty() {
        "table".to_string()
    } else {
        base
    };
    let mut name = base.clone();
    let mut i = 2;
    while used.contains(&name.to_lowercase()) {
        let suffix = format!(" ({i})");
        let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
        name = base.chars().take(keep).collect::<String>() + &suffix;
        i += 1;
    }
    used.insert(name.to_lowercase());
    name
}

fn tmp_path(file: &Path) -> Result<PathBuf> {
    if file.file_name().is_none() {
        return Err(anyhow!("path misses a filename: {file:?}"));
    }
    let mut s: OsString = file.as_os_str().to_owned();
    s.push(".tmp");
    Ok(s.into())
}

fn text_width(val: &str) -> usize {
    val.split('\n')
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0)
}

/// Write each table to its own worksheet of a new workbook at
/// `file`. The file is written under a temporary name and renamed
/// into place.
pub fn excel_file_write<'t>(
    tables: impl IntoIterator<Item = &'t (dyn TableView + 't)>,
    file: &Path,
) -> Result<()> {
    let mut workbook = Workbook::new();
    let mut used_names = BTreeSet::new();

    for table in tables {
        let worksheet = workbook.add_worksheet();
        let name = sheet_name(&table.table_name(), &mut used_names);
        worksheet
            .set_name(&name)
            .with_context(|| anyhow!("trying to use {name:?} as worksheet name"))?;

        let _titles = table.table_view_header();
        let titles = (*_titles).as_ref();

        // Our own max width tracking, in characters
        let mut column_widths: Vec<usize> = titles.iter().map(|_| 1).collect();

        let mut rownum = 0;

        {
            // How many lines do our labels take max?
            let mut num_lines = 1;
            for (i, (label, unit, _column_formatting)) in titles.iter().enumerate() {
                let colnum =
                    u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;
                let perhaps_unit: Cow<str> = match unit.suffix() {
                    Some(suffix) => format!("\n({suffix})").into(),
                    None => "".into(),
                };
                let val = format!("{label}{perhaps_unit}");
                column_widths[i] = column_widths[i].max(text_width(&val));
                let format = Format::new().set_bold();
                worksheet
                    .write_with_format(rownum, colnum, &val, &format)
                    .with_context(|| anyhow!("write title value {val:?}"))?;

                let label_lines = label.chars().filter(|c| *c == '\n').count() + 1;
                let unit_lines = if matches!(unit, Unit::None) { 0 } else { 1 };
                num_lines = num_lines.max(label_lines + unit_lines);
            }

            let height = (num_lines * 15) as f64;
            worksheet
                .set_row_height(rownum, height)
                .with_context(|| anyhow!("setting height of row {rownum} to height {height}"))?;
        }

        for row in table.table_view_body() {
            rownum += 1;
            for (i, (val, highlight)) in row.iter().enumerate() {
                let column_formatting: ColumnFormatting = titles
                    .get(i)
                    .ok_or_else(|| anyhow!("row {rownum} has more values than columns"))?
                    .2;
                let colnum =
                    u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;

                let mut format = Format::new();
                if column_formatting == ColumnFormatting::Number {
                    format = format.set_align(FormatAlign::Right);
                }
                match highlight {
                    Highlight::Neutral => (),
                    Highlight::Dominant => {
                        format = format.set_bold().set_background_color(Color::Green);
                    }
                    Highlight::Muted => {
                        format = format.set_font_color(Color::Gray);
                    }
                    Highlight::Noise => {
                        format = format.set_italic().set_font_color(Color::Orange);
                    }
                }

                column_widths[i] = column_widths[i].max(text_width(val));

                // Numbers go in as numbers so that spreadsheets can
                // compute with them
                let written = match (column_formatting, val.parse::<f64>()) {
                    (ColumnFormatting::Number, Ok(number)) if number.is_finite() => {
                        worksheet.write_number_with_format(rownum, colnum, number, &format)
                    }
                    _ => worksheet.write_with_format(rownum, colnum, &**val, &format),
                };
                written.with_context(|| anyhow!("write value {val:?}"))?;
            }
        }

        // Own character counting, `autofit` works badly for numbers
        // in LibreOffice.
        for (i, num_chars) in column_widths.iter().enumerate() {
            let colnum = u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;
            let width = *num_chars as f64 + WIDTH_SAFETY_MARGIN_CHARS;
            worksheet
                .set_column_width(colnum, width)
                .with_context(|| anyhow!("setting column width on column {colnum} to {width}"))?;
        }
    }

    let file_tmp = tmp_path(file)?;
    workbook
        .save(&file_tmp)
        .with_context(|| anyhow!("saving to file {file_tmp:?}"))?;
    std::fs::rename(&file_tmp, file)
        .with_context(|| anyhow!("renaming {file_tmp:?} to {file:?}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_table::{categorical, Column, DataTable},
        tables::table_view::Named,
    };

    #[test]
    fn t_sheet_names() {
        let mut used = BTreeSet::new();
        assert_eq!(sheet_name("tense/lax: k=2", &mut used), "tense_lax_ k=2");
        assert_eq!(sheet_name("Tense/lax: K=2", &mut used), "Tense_lax_ K=2 (2)");
        let long = "a".repeat(40);
        let name = sheet_name(&long, &mut used);
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_CHARS);
        let name = sheet_name(&long, &mut used);
        assert!(name.ends_with(" (2)"));
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_CHARS);
        assert_eq!(sheet_name("", &mut used), "table");
    }

    #[test]
    fn t_write_workbook() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let table = DataTable::from_columns([
            ("vowel".into(), categorical(&["iy", "aa"])),
            ("F1".into(), Column::Numeric(vec![300., 700.])),
        ])?;
        let named = Named::new("data", &table);
        let path = dir.path().join("out.xlsx");
        excel_file_write([&named as &dyn TableView], &path)?;
        assert!(path.exists());
        assert!(!tmp_path(&path)?.exists());
        Ok(())
    }
}
