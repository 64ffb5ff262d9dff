use std::fmt;

use chrono::NaiveDate;
use itertools::Itertools;

use crate::ingest::IngestError;

/// A single cell of a parsed table. Empty-after-trim input is kept as an
/// explicit marker so the report layer can tell "missing" from "zero".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
}

impl Cell {
    pub fn from_field(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_display(&self) -> &str {
        match self {
            Cell::Empty => "",
            Cell::Text(text) => text,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Validated tabular data: ordered column names plus rows of cells in the
/// same order. `Table::new` is the only construction path, so every `Table`
/// in the program upholds the header and row-width invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, IngestError> {
        let columns: Vec<String> = columns
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();
        validate_columns(&columns)?;
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(IngestError::MalformedRow {
                    row_index: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        if rows.is_empty() {
            return Err(IngestError::EmptyTable);
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

pub(crate) fn validate_columns(columns: &[String]) -> Result<(), IngestError> {
    if columns.is_empty() {
        return Err(IngestError::EmptyTable);
    }
    if let Some(position) = columns.iter().position(|name| name.is_empty()) {
        return Err(IngestError::EmptyColumn { position });
    }
    if let Some(duplicate) = columns.iter().duplicates().next() {
        return Err(IngestError::DuplicateColumn {
            column: duplicate.clone(),
        });
    }
    Ok(())
}

/// Strict numeric parse for cell text. `f64::from_str` accepts "inf" and
/// "NaN" spellings; reports must stay finite, so those are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    let parsed: f64 = value.parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}
