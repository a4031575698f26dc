//! Reading measurement tables from delimited text files.

use std::{fs::File, io::Read, path::Path};

use kstring::KString;

use crate::{
    data_table::{Column, DataTable},
    debug,
    error::PipelineError,
    info,
};

/// Cell values taken to mean "not measured".
pub const MISSING_MARKERS: &[&str] = &["", "NA", "NaN", "nan", "N/A"];

fn is_missing(val: &str) -> bool {
    MISSING_MARKERS.contains(&val)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Columns kept as text (speaker, category)
    pub categorical: Vec<String>,
    /// Columns parsed as numbers (the measurements)
    pub numeric: Vec<String>,
    pub delimiter: u8,
}

impl LoadOptions {
    pub fn new<S: AsRef<str>>(categorical: &[S], numeric: &[S]) -> Self {
        Self {
            categorical: categorical.iter().map(|s| s.as_ref().to_owned()).collect(),
            numeric: numeric.iter().map(|s| s.as_ref().to_owned()).collect(),
            delimiter: b',',
        }
    }
}

/// Read a table with a header line. Only the columns named in
/// `options` are kept, in the order given there (categorical ones
/// first). Rows with a missing value in any of them are dropped; a
/// numeric value that is neither missing nor a finite number (e.g.
/// `inf`) is an error.
/// Zero rows remaining is a `MissingData` error.
pub fn load_csv_from_reader<R: Read>(
    input: R,
    options: &LoadOptions,
) -> Result<DataTable, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let missing_columns: Vec<&String> = options
        .categorical
        .iter()
        .chain(&options.numeric)
        .filter(|name| find(name.as_str()).is_none())
        .collect();
    if !missing_columns.is_empty() {
        return Err(PipelineError::MissingData(format!(
            "input lacks the column(s) {missing_columns:?} (has: {:?})",
            headers.iter().collect::<Vec<_>>()
        )));
    }
    // checked above
    let categorical_idx: Vec<usize> = options
        .categorical
        .iter()
        .filter_map(|name| find(name.as_str()))
        .collect();
    let numeric_idx: Vec<usize> = options
        .numeric
        .iter()
        .filter_map(|name| find(name.as_str()))
        .collect();

    let mut categorical: Vec<Vec<KString>> = vec![Vec::new(); categorical_idx.len()];
    let mut numeric: Vec<Vec<f64>> = vec![Vec::new(); numeric_idx.len()];
    let mut num_read: u64 = 0;
    let mut num_dropped: u64 = 0;
    'rows: for record in reader.records() {
        let record = record?;
        num_read += 1;
        let cell = |i: usize| record.get(i).unwrap_or("");

        if categorical_idx.iter().any(|i| cell(*i).is_empty()) {
            num_dropped += 1;
            continue;
        }
        let mut numbers = Vec::with_capacity(numeric_idx.len());
        for (name, i) in options.numeric.iter().zip(&numeric_idx) {
            let val = cell(*i);
            if is_missing(val) {
                num_dropped += 1;
                continue 'rows;
            }
            let number: f64 = val.parse().map_err(|_| PipelineError::MalformedValue {
                column: name.clone(),
                row: num_read,
                value: val.to_owned(),
            })?;
            // "inf" and friends parse, but are not measurements
            if !number.is_finite() {
                return Err(PipelineError::MalformedValue {
                    column: name.clone(),
                    row: num_read,
                    value: val.to_owned(),
                });
            }
            numbers.push(number);
        }

        for (column, i) in categorical.iter_mut().zip(&categorical_idx) {
            column.push(KString::from_ref(cell(*i)));
        }
        for (column, number) in numeric.iter_mut().zip(numbers) {
            column.push(number);
        }
    }

    if num_dropped > 0 {
        info!("dropped {num_dropped} of {num_read} rows with missing values");
    } else {
        debug!("read {num_read} rows");
    }
    if num_read == num_dropped {
        return Err(PipelineError::MissingData(format!(
            "no complete rows in input ({num_read} rows read, all with missing values)"
        )));
    }

    let columns = options
        .categorical
        .iter()
        .zip(categorical)
        .map(|(name, vals)| (KString::from_ref(name), Column::Categorical(vals)))
        .chain(
            options
                .numeric
                .iter()
                .zip(numeric)
                .map(|(name, vals)| (KString::from_ref(name), Column::Numeric(vals))),
        );
    DataTable::from_columns(columns)
}

pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<DataTable, PipelineError> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_owned(),
        source,
    })?;
    load_csv_from_reader(file, options)
}
