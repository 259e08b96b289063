//! The row projection model: a scanned SQL row reduced to a small set of
//! typed cells, keyed by column name. Mirrors the `column_name -> typed cell`
//! map described by the scrape engine's query layer.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The role a declared column plays for a query: label, value, or timestamp.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Key,
    Value,
    Time,
}

/// A single scanned cell, tagged by the column type that produced it.
#[derive(Clone, Debug)]
pub enum CellValue {
    Str(Option<String>),
    Float(Option<f64>),
    Time(Option<DateTime<Utc>>),
}

/// One result row, reduced to the columns a query's metric families care about.
pub type Row = HashMap<String, CellValue>;
