//! Row keys of merged tables.
//!
//! A key holds the coordinates that locate a reduced value. Tables from different sources are
//! joined on equal keys, so floating point coordinates are compared by their bit pattern (with
//! `-0.0` folded onto `0.0`).

use std::fmt;
use std::hash::{Hash, Hasher};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

/// Name of the latitude key column
pub const LATITUDE: &str = "latitude";
/// Name of the longitude key column
pub const LONGITUDE: &str = "longitude";
/// Name of the calendar date key column
pub const DATE: &str = "date";
/// Name of the time offset key column
pub const TIME: &str = "time";

/// Format used when writing dates to the output stream.
pub const OUTPUT_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] 00:00:00");

/// A single key value before it is coerced to an output type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell {
    /// Numeric coordinate
    Number(f64),
    /// Calendar date
    Date(Date),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Date(date) => {
                let text = date.format(OUTPUT_DATE_FORMAT).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}

/// Key of a table row.
pub trait RowKey: Clone + fmt::Debug + Eq + Hash {
    /// Names of the key columns, in output order.
    const COLUMNS: &'static [&'static str];

    /// Returns the value of the named key column, or `None` if this key has no such column.
    fn cell(&self, column: &str) -> Option<Cell>;

    /// Returns a human readable `name=value` rendering of the key.
    fn describe(&self) -> String {
        Self::COLUMNS
            .iter()
            .filter_map(|column| self.cell(column).map(|cell| format!("{}={}", column, cell)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Bit pattern used to compare and hash a coordinate.
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0_u64
    } else {
        value.to_bits()
    }
}

/// Key of the spatial pipeline: one grid location.
#[derive(Clone, Copy, Debug)]
pub struct LocationKey {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        LocationKey {
            latitude,
            longitude,
        }
    }
}

impl PartialEq for LocationKey {
    fn eq(&self, other: &Self) -> bool {
        canonical_bits(self.latitude) == canonical_bits(other.latitude)
            && canonical_bits(self.longitude) == canonical_bits(other.longitude)
    }
}

impl Eq for LocationKey {}

impl Hash for LocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.latitude).hash(state);
        canonical_bits(self.longitude).hash(state);
    }
}

impl RowKey for LocationKey {
    const COLUMNS: &'static [&'static str] = &[LATITUDE, LONGITUDE];

    fn cell(&self, column: &str) -> Option<Cell> {
        match column {
            LATITUDE => Some(Cell::Number(self.latitude)),
            LONGITUDE => Some(Cell::Number(self.longitude)),
            _ => None,
        }
    }
}

/// Key of the temporal pipeline: one time step.
///
/// Time offsets are relative to each source's start date, so the derived date is part of the
/// key. Two sources with different start dates never share a row for the same offset.
#[derive(Clone, Copy, Debug)]
pub struct TimeStepKey {
    pub date: Date,
    pub time: f64,
}

impl TimeStepKey {
    pub fn new(date: Date, time: f64) -> Self {
        TimeStepKey { date, time }
    }
}

impl PartialEq for TimeStepKey {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && canonical_bits(self.time) == canonical_bits(other.time)
    }
}

impl Eq for TimeStepKey {}

impl Hash for TimeStepKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date.hash(state);
        canonical_bits(self.time).hash(state);
    }
}

impl RowKey for TimeStepKey {
    const COLUMNS: &'static [&'static str] = &[TIME, DATE];

    fn cell(&self, column: &str) -> Option<Cell> {
        match column {
            DATE => Some(Cell::Date(self.date)),
            TIME => Some(Cell::Number(self.time)),
            _ => None,
        }
    }
}
