use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// One untyped cell from a source table.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Absent,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Scalar {
    /// Infer a scalar from a textual cell (CSV and friends).
    ///
    /// Blank → `Absent`. Text becomes `Number` only when it is the canonical
    /// rendering of that number (`"7"`, `"-5.5"`), so the display string always
    /// reproduces the cell: `"0007"`, `"50.0"` or a 44-digit access key stay `Text`.
    /// Dates stay text here; the coercer parses them.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Absent;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && format_number(n) == trimmed => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Display string, or `None` for `Absent`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Number(n) => serializer.serialize_f64(*n),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

/// Integral values print without a fractional part (`7.0` → `"7"`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

/// A source table as loaded: header names plus positionally aligned rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

/// Borrowed view of one row as an ordered name → scalar mapping.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    columns: &'a [String],
    cells: &'a [Scalar],
}

/// Shared `Absent` cell handed out for missing positions.
pub static ABSENT: Scalar = Scalar::Absent;

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<Scalar>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, col). Short rows read as `Absent`.
    pub fn cell(&self, row: usize, col: usize) -> &Scalar {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&ABSENT)
    }

    pub fn record(&self, row: usize) -> RawRecord<'_> {
        RawRecord {
            columns: &self.columns,
            cells: self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        (0..self.rows.len()).map(move |i| self.record(i))
    }
}

impl<'a> RawRecord<'a> {
    pub fn get(&self, column: &str) -> &'a Scalar {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.at(i))
            .unwrap_or(&ABSENT)
    }

    pub fn at(&self, index: usize) -> &'a Scalar {
        self.cells.get(index).unwrap_or(&ABSENT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Scalar)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .map(move |(i, c)| (c.as_str(), self.at(i)))
    }
}
