//! Output of tabular results.
//!
//! [`table_view`](table_view.rs) defines the `TableView` trait, a
//! format independent view of a table (header with units and
//! formatting hints, body rows with highlighting hints), implemented
//! by data tables, contingency tables, sweeps.
//!
//! The writers: [`terminal_table`](terminal_table.rs) (human-readable
//! or TSV on stdout), [`csv_table_view`](csv_table_view.rs) (one file
//! per table), [`excel_table_view`](excel_table_view.rs) (one
//! workbook, a worksheet per table).

pub mod csv_table_view;
pub mod excel_table_view;
pub mod table_view;
pub mod terminal_table;
