//! Printing `TableView`s to a terminal in human-readable format (with
//! spaces for padding, and ANSI sequences for highlighting), or as
//! TSV.

//! Does not escape anything in the fields. Values containing tabs or
//! newlines make TSV output ambiguous.

use std::io::{BufWriter, IsTerminal, Write};

use anyhow::{anyhow, bail, Result};
use itertools::{EitherOrBoth, Itertools};
use strum_macros::EnumString;
use yansi::{Paint, Style};

use super::table_view::{ColumnFormatting, Highlight, TableView};

#[derive(Debug, EnumString, PartialEq, Clone, Copy)]
#[strum(serialize_all = "kebab_case")]
pub enum ColorOpt {
    Auto,
    Always,
    Never,
}

impl ColorOpt {
    pub fn want_color(self, detected_terminal: bool) -> bool {
        match self {
            ColorOpt::Auto => detected_terminal,
            ColorOpt::Always => true,
            ColorOpt::Never => false,
        }
    }
}

#[derive(Debug, clap::Args, Clone)]
pub struct TerminalTableOpts {
    /// Show the tables as CSV (with '\t' as separator) instead of
    /// human-readable
    #[arg(long)]
    pub tsv: bool,

    /// Whether to use ANSI codes to format human-readable output on
    /// terminals (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorOpt,
}

impl Default for TerminalTableOpts {
    fn default() -> Self {
        Self {
            tsv: false,
            color: ColorOpt::Auto,
        }
    }
}

impl TerminalTableOpts {
    pub fn want_color(&self, detected_terminal: bool) -> bool {
        let Self { tsv, color } = self;
        if *tsv {
            false
        } else {
            color.want_color(detected_terminal)
        }
    }
}

fn highlight_style(highlight: Highlight) -> Option<Style> {
    match highlight {
        Highlight::Neutral => None,
        Highlight::Dominant => Some(Style::new().bold().green()),
        Highlight::Muted => Some(Style::new().dim()),
        Highlight::Noise => Some(Style::new().yellow()),
    }
}

/// Capable of streaming, which requires defining the column widths
/// beforehand. If a value is wider than the defined column width for
/// that value, a single space is still printed between the value and
/// the next. The last column does not need a width, and no padding is
/// printed.
pub struct TerminalTable<O: Write + IsTerminal> {
    pub opts: TerminalTableOpts,
    widths: Vec<usize>,
    /// Which columns are right-adjusted
    right_align: Vec<bool>,
    padding: String,
    color: bool,
    out: BufWriter<O>,
}

impl<O: Write + IsTerminal> TerminalTable<O> {
    /// How many spaces to put between columns in human-readable
    /// format at minimum, even if a value is longer than anticipated.
    const MINIMAL_PADDING_LEN: usize = 1;

    /// The length of `widths` must be one less than the number of
    /// columns (the last column does not need a width). `widths` must
    /// include the spacing between the columns.
    pub fn start(
        widths: &[usize],
        right_align: &[bool],
        opts: TerminalTableOpts,
        out: O,
    ) -> Self {
        let max_width = widths.iter().max().copied().unwrap_or(0);
        let color = opts.want_color(out.is_terminal());
        Self {
            opts,
            widths: widths.to_owned(),
            right_align: right_align.to_owned(),
            padding: " ".repeat(max_width),
            color,
            out: BufWriter::new(out),
        }
    }

    fn write_row(&mut self, row: &[(&str, Option<Style>)]) -> Result<()> {
        let lens = (self.widths.len(), row.len());
        let (l1, l2) = lens;
        if l1
            != l2
                .checked_sub(1)
                .ok_or_else(|| anyhow!("need at least 1 column"))?
        {
            bail!("widths.len != data.len - 1: {lens:?}")
        }

        for (i, either_or_both) in row.iter().zip_longest(&self.widths).enumerate() {
            let ((text, style), width) = match either_or_both {
                EitherOrBoth::Both(cell, width) => (cell, Some(*width)),
                EitherOrBoth::Left(cell) => (cell, None),
                EitherOrBoth::Right(_) => {
                    unreachable!("given row len has been checked against widths len")
                }
            };
            if self.opts.tsv {
                if i > 0 {
                    self.out.write_all(b"\t")?;
                }
                self.out.write_all(text.as_bytes())?;
                continue;
            }

            let text_len = text.chars().count();
            let padding_len = width
                .map(|width| width.saturating_sub(text_len).max(Self::MINIMAL_PADDING_LEN))
                .unwrap_or(0);
            let right_align = self.right_align.get(i).copied().unwrap_or(false);
            // Right-adjusted values keep the separating space on the
            // right
            let (before, after) = if right_align && padding_len > Self::MINIMAL_PADDING_LEN {
                (
                    padding_len - Self::MINIMAL_PADDING_LEN,
                    Self::MINIMAL_PADDING_LEN,
                )
            } else {
                (0, padding_len)
            };
            self.out.write_all(self.padding[0..before].as_bytes())?;
            match style {
                Some(style) if self.color => {
                    let s = text.paint(*style).to_string();
                    self.out.write_all(s.as_bytes())?;
                }
                _ => self.out.write_all(text.as_bytes())?,
            }
            self.out.write_all(self.padding[0..after].as_bytes())?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_title_row(&mut self, titles: &[&str]) -> Result<()> {
        const STYLE: Style = Style::new().bold().italic();
        let row: Vec<(&str, Option<Style>)> = titles.iter().map(|t| (*t, Some(STYLE))).collect();
        self.write_row(&row)
    }

    pub fn write_data_row(&mut self, data: &[(&str, Highlight)]) -> Result<()> {
        let row: Vec<(&str, Option<Style>)> = data
            .iter()
            .map(|(text, highlight)| (*text, highlight_style(*highlight)))
            .collect();
        self.write_row(&row)
    }

    pub fn print(&mut self, s: &str) -> Result<()> {
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn finish(self) -> Result<O> {
        self.out
            .into_inner()
            .map_err(|e| anyhow!("flushing the buffer: {}", e.error()))
    }
}

/// Print `table` with its name as a heading, column widths fitted to
/// the contents (the whole body is collected first for that).
pub fn print_table_view<O: Write + IsTerminal>(
    table: &dyn TableView,
    opts: TerminalTableOpts,
    out: O,
) -> Result<O> {
    let header = table.table_view_header();
    let header = (*header).as_ref();
    let titles: Vec<String> = header
        .iter()
        .map(|(title, unit, _)| match unit.suffix() {
            Some(suffix) if !opts.tsv => format!("{title} ({suffix})"),
            _ => title.to_string(),
        })
        .collect();
    let rows: Vec<Vec<(String, Highlight)>> = table
        .table_view_body()
        .map(|row| {
            row.iter()
                .map(|(text, highlight)| (text.to_string(), *highlight))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = titles.iter().map(|t| t.chars().count() + 2).collect();
    for row in &rows {
        for (width, (text, _)) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.chars().count() + 2);
        }
    }
    widths.pop();
    let right_align: Vec<bool> = header
        .iter()
        .map(|(_, _, formatting)| *formatting == ColumnFormatting::Number)
        .collect();

    let tsv = opts.tsv;
    let mut terminal_table = TerminalTable::start(&widths, &right_align, opts, out);
    if !tsv {
        terminal_table.print(&format!("== {} ==\n", table.table_name()))?;
    }
    let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
    terminal_table.write_title_row(&titles)?;
    for row in &rows {
        let row: Vec<(&str, Highlight)> = row.iter().map(|(s, h)| (s.as_str(), *h)).collect();
        terminal_table.write_data_row(&row)?;
    }
    terminal_table.print("\n")?;
    terminal_table.finish()
}

#[cfg(test)]
mod tests {
    use std::{
        borrow::Cow,
        io::{Read, Seek, SeekFrom},
    };

    use super::*;
    use crate::tables::table_view::{ColumnHeader, Named, Unit};

    struct Small;

    impl TableView for Named<'_, Small> {
        fn table_name(&self) -> Cow<'_, str> {
            self.name.as_ref().into()
        }

        fn table_view_header(&self) -> Box<dyn AsRef<[ColumnHeader]>> {
            let header: Vec<ColumnHeader> = vec![
                (
                    "category".into(),
                    Unit::None,
                    ColumnFormatting::String,
                ),
                ("n".into(), Unit::Count, ColumnFormatting::Number),
            ];
            Box::new(header)
        }

        fn table_view_body<'s>(
            &'s self,
        ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
            let rows: Vec<Cow<'s, [(Cow<'s, str>, Highlight)]>> = vec![
                vec![("iy".into(), Highlight::Neutral), ("3".into(), Highlight::Dominant)].into(),
                vec![("aa".into(), Highlight::Neutral), ("12".into(), Highlight::Neutral)].into(),
            ];
            Box::new(rows.into_iter())
        }
    }

    fn printed(opts: TerminalTableOpts) -> anyhow::Result<String> {
        let mut file = tempfile::tempfile()?;
        print_table_view(&Named::new("small", &Small), opts, file.try_clone()?)?;
        file.seek(SeekFrom::Start(0))?;
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        Ok(s)
    }

    #[test]
    fn t_tsv() -> anyhow::Result<()> {
        let s = printed(TerminalTableOpts {
            tsv: true,
            color: ColorOpt::Always,
        })?;
        assert_eq!(s, "category\tn\niy\t3\naa\t12\n\n");
        Ok(())
    }

    #[test]
    fn t_human_readable() -> anyhow::Result<()> {
        let s = printed(TerminalTableOpts {
            tsv: false,
            color: ColorOpt::Never,
        })?;
        assert_eq!(
            s,
            "== small ==\ncategory  n (count)\niy        3\naa        12\n\n"
        );
        Ok(())
    }

    #[test]
    fn t_color_opt() {
        use std::str::FromStr;
        assert_eq!(ColorOpt::from_str("never").ok(), Some(ColorOpt::Never));
        assert!(ColorOpt::Auto.want_color(true));
        assert!(!ColorOpt::Auto.want_color(false));
        let opts = TerminalTableOpts {
            tsv: true,
            color: ColorOpt::Always,
        };
        assert!(!opts.want_color(true));
    }
}
