//! Column-oriented tables built from parsed field maps.
//!
//! The tabularizer turns a sequence of [`FieldMap`]s into one table: one row
//! per record, columns being the union of all keys observed, in first-seen
//! order. Two finishing passes follow:
//!
//! - **sparsity filter** — columns populated in no more than `min_fill_ratio`
//!   of the rows are dropped. This is a lossy, data-dependent step: the
//!   surviving column set differs across harvest runs and must be treated as
//!   non-stable schema.
//! - **rename** — known field-path columns are mapped to human-readable
//!   names via a [`ColumnNames`] dictionary; unmapped columns pass through.
//!
//! The finished table is written as CSV/TSV with the `csv` crate.

use std::io;

use crate::config::ColumnNames;
use crate::error::Result;
use crate::field_paths::FieldMap;

/// A column-oriented table of extracted records.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Build a table from field maps.
    ///
    /// Columns populated in no more than `min_fill_ratio` of the rows are
    /// dropped; pass `0.0` to keep every populated column. When `rename` is
    /// given, surviving columns are renamed through it.
    #[must_use]
    pub fn build(
        field_maps: Vec<FieldMap>,
        min_fill_ratio: f64,
        rename: Option<&ColumnNames>,
    ) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut index: indexmap::IndexMap<String, usize> = indexmap::IndexMap::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(field_maps.len());

        for map in field_maps {
            let mut row: Vec<Option<String>> = vec![None; columns.len()];
            for (key, value) in map {
                let column = *index.entry(key.clone()).or_insert_with(|| {
                    columns.push(key);
                    columns.len() - 1
                });
                if column >= row.len() {
                    row.resize(column + 1, None);
                }
                row[column] = Some(value);
            }
            rows.push(row);
        }
        // Earlier rows are shorter than the final column set.
        for row in &mut rows {
            row.resize(columns.len(), None);
        }

        let mut table = Table { columns, rows };
        table.drop_sparse_columns(min_fill_ratio);
        if let Some(names) = rename {
            table.rename_columns(names);
        }
        table
    }

    /// Drop columns whose fill ratio is at or below `threshold`.
    fn drop_sparse_columns(&mut self, threshold: f64) {
        if self.rows.is_empty() {
            self.columns.clear();
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let n_rows = self.rows.len() as f64;
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|column| {
                let filled = self.rows.iter().filter(|row| row[column].is_some()).count();
                #[allow(clippy::cast_precision_loss)]
                let ratio = filled as f64 / n_rows;
                ratio > threshold
            })
            .collect();

        self.columns = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, keep)| **keep)
            .map(|(name, _)| name.clone())
            .collect();
        for row in &mut self.rows {
            let cells = std::mem::take(row);
            *row = cells
                .into_iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell)
                .collect();
        }
    }

    /// Rename columns through a dictionary; unmapped names pass through.
    fn rename_columns(&mut self, names: &ColumnNames) {
        for column in &mut self.columns {
            if let Some(renamed) = names.get(column) {
                *column = renamed.to_string();
            }
        }
    }

    /// Column names, in table order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Cell value by row index and column name.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// Write the table as delimited text; absent cells are empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OaiError::Csv`] on serialization problems or
    /// [`crate::OaiError::Io`] from the destination.
    pub fn write_delimited<W: io::Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table as comma-separated values.
    ///
    /// # Errors
    ///
    /// As [`write_delimited`](Self::write_delimited).
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        self.write_delimited(writer, b',')
    }
}
