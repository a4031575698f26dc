//! A representation of tables as title row and body rows of strings
//! with formatting hints, independent of the output format (terminal,
//! CSV, Excel).

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unit {
    /// No unit, e.g. for labels
    None,
    /// Integers
    Count,
    /// Proportions between 0 and 1
    Fraction,
    /// Anything else, e.g. "inertia" or "BIC"
    Named(&'static str),
}

impl Unit {
    /// Text to show below the column title, if any.
    pub fn suffix(self) -> Option<Cow<'static, str>> {
        match self {
            Unit::None => None,
            Unit::Count => Some("count".into()),
            Unit::Fraction => Some("fraction".into()),
            Unit::Named(name) => Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Highlight {
    /// No special formatting
    Neutral,
    /// The value that stands out in its row, e.g. the cluster most
    /// of a category's tokens went to, or the elbow of a sweep
    Dominant,
    /// Values to de-emphasize, e.g. zero fractions
    Muted,
    /// Rows that were assigned to no cluster
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnFormatting {
    /// Values are numbers: right-adjusted, and auto-width
    Number,
    /// Values are (potentially long) strings, left-adjusted
    String,
}

/// Title, unit and formatting of one column.
pub type ColumnHeader = (Cow<'static, str>, Unit, ColumnFormatting);

/// A full table. dyn compatible.
pub trait TableView {
    fn table_name(&self) -> Cow<'_, str>;

    /// Column names and units.
    fn table_view_header(&self) -> Box<dyn AsRef<[ColumnHeader]>>;

    /// The body rows, each with as many entries as the header has
    /// columns.
    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's>;
}

/// Attaches a table name to a value that can be viewed as a table,
/// e.g. `Named::new("tense vowels", &contingency_table)`.
pub struct Named<'t, T> {
    pub name: Cow<'t, str>,
    pub inner: &'t T,
}

impl<'t, T> Named<'t, T> {
    pub fn new(name: impl Into<Cow<'t, str>>, inner: &'t T) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}
