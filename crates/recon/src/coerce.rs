use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::ReconConfig;
use crate::model::{DateValue, NormalizedRecord, SourceTable};
use crate::normalize::ColumnBinding;
use crate::value::{format_number, RawTable, Scalar, ABSENT};

/// Rendered in place of a date that is absent or could not be parsed.
pub const INVALID_DATE: &str = "Data Inválida/Nula";

// ---------------------------------------------------------------------------
// Code
// ---------------------------------------------------------------------------

/// Left-pad with `'0'` to `width` characters, keeping a leading sign in front.
/// Wider values are returned unchanged.
pub fn pad_code(raw: &str, width: usize) -> String {
    let len = raw.chars().count();
    if len >= width {
        return raw.to_string();
    }
    let fill = "0".repeat(width - len);
    match raw.chars().next() {
        Some(sign @ ('+' | '-')) => format!("{sign}{fill}{}", &raw[1..]),
        _ => format!("{fill}{raw}"),
    }
}

/// String form of a code cell before padding. Text cells keep their
/// characters; `Number` cells only hold values whose rendering is exact.
pub fn code_text(cell: &Scalar) -> String {
    match cell {
        Scalar::Absent => String::new(),
        Scalar::Text(s) => s.trim().to_string(),
        Scalar::Number(n) => format_number(*n),
        Scalar::Date(_) => cell.to_string(),
    }
}

/// Join key for a code cell: the padded code, or the empty string when the cell
/// holds none. Padding never yields an empty string, so rows without a code
/// join each other and nothing else.
pub fn coerce_code(cell: &Scalar, width: usize) -> String {
    let text = code_text(cell);
    if text.is_empty() {
        return text;
    }
    pad_code(&text, width)
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

pub fn coerce_quantity(cell: &Scalar) -> Option<f64> {
    match cell {
        Scalar::Number(n) if !n.is_nan() => Some(*n),
        Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

pub fn coerce_date(cell: &Scalar, day_first: bool) -> DateValue {
    match cell {
        Scalar::Absent => DateValue::Absent,
        Scalar::Date(dt) => DateValue::Parsed(*dt),
        Scalar::Number(n) => match serial_to_datetime(*n) {
            Some(dt) => DateValue::Parsed(dt),
            None => DateValue::Invalid(format_number(*n)),
        },
        Scalar::Text(s) if s.trim().is_empty() => DateValue::Absent,
        Scalar::Text(s) => match parse_date_text(s, day_first) {
            Some(dt) => DateValue::Parsed(dt),
            None => DateValue::Invalid(s.clone()),
        },
    }
}

/// Spreadsheet serial day number (1900 system) to a timestamp.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2958465 = 9999-12-31
    if !serial.is_finite() || serial < 1.0 || serial >= 2_958_466.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::days(days) + Duration::seconds(seconds))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Best-effort, locale-agnostic date parsing.
///
/// ISO forms first; then `a/b/y` style triples (separators `/`, `-`, `.`) with an
/// optional `HH:MM[:SS]` suffix. An ambiguous triple is read month-first unless
/// `day_first`; when the preferred reading is impossible the other one is tried.
pub fn parse_date_text(text: &str, day_first: bool) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // ISO forms only with a four-digit year up front; chrono's %Y would
    // otherwise read "25.01.24" as the year 25.
    let year_first = text.len() >= 4 && text.as_bytes()[..4].iter().all(u8::is_ascii_digit);
    if year_first {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_local());
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt);
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
                return Some(d.and_time(NaiveTime::MIN));
            }
        }
    }

    let mut parts = text.split_whitespace();
    let date_part = parts.next()?;
    let time = match parts.next() {
        Some(t) => parse_time(t)?,
        None => NaiveTime::MIN,
    };
    if parts.next().is_some() {
        return None;
    }

    let fields: Vec<&str> = date_part.split(['/', '-', '.']).collect();
    if fields.len() != 3 || fields.iter().any(|f| f.is_empty() || !f.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let nums: Vec<u32> = fields.iter().map(|f| f.parse().ok()).collect::<Option<_>>()?;

    let date = if fields[0].len() == 4 {
        NaiveDate::from_ymd_opt(nums[0] as i32, nums[1], nums[2])
    } else {
        let year = expand_year(nums[2], fields[2].len())?;
        let (month_first, day_first_read) = (
            NaiveDate::from_ymd_opt(year, nums[0], nums[1]),
            NaiveDate::from_ymd_opt(year, nums[1], nums[0]),
        );
        if day_first {
            day_first_read.or(month_first)
        } else {
            month_first.or(day_first_read)
        }
    }?;

    Some(date.and_time(time))
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn expand_year(year: u32, digits: usize) -> Option<i32> {
    match digits {
        4 => Some(year as i32),
        2 if year < 69 => Some(2000 + year as i32),
        2 => Some(1900 + year as i32),
        _ => None,
    }
}

/// `dd/mm/yyyy`, or [`INVALID_DATE`] when there is no usable date.
pub fn format_date(date: &DateValue) -> String {
    match date {
        DateValue::Parsed(dt) => dt.format("%d/%m/%Y").to_string(),
        DateValue::Absent | DateValue::Invalid(_) => INVALID_DATE.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

fn text_field(cell: &Scalar) -> Option<String> {
    cell.as_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Coerce every row of `raw` through `binding`. Never fails: bad cells become absent.
pub fn normalize_table(
    label: &str,
    raw: &RawTable,
    binding: &ColumnBinding,
    config: &ReconConfig,
) -> SourceTable {
    fn field(raw: &RawTable, row: usize, idx: Option<usize>) -> &Scalar {
        match idx {
            Some(col) => raw.cell(row, col),
            None => &ABSENT,
        }
    }

    let extra_cols: Vec<usize> = (0..raw.columns.len()).filter(|i| !binding.is_bound(*i)).collect();

    let mut bad_quantities = 0usize;
    let mut bad_dates = 0usize;
    let mut records = Vec::with_capacity(raw.len());

    for row in 0..raw.len() {
        let quantity_cell = field(raw, row, binding.quantity);
        let quantity = coerce_quantity(quantity_cell);
        if quantity.is_none() && !quantity_cell.is_absent() {
            bad_quantities += 1;
        }

        let date = coerce_date(field(raw, row, binding.date), config.dates.day_first);
        if matches!(date, DateValue::Invalid(_)) {
            bad_dates += 1;
        }

        records.push(NormalizedRecord {
            row,
            code: coerce_code(field(raw, row, binding.code), config.code_width),
            date,
            fuel_type: text_field(field(raw, row, binding.fuel_type)),
            quantity,
            sector: text_field(field(raw, row, binding.sector)),
            extra: extra_cols
                .iter()
                .map(|&i| (raw.columns[i].clone(), raw.cell(row, i).clone()))
                .collect(),
        });
    }

    if bad_quantities > 0 {
        log::warn!("{label}: {bad_quantities} quantity value(s) could not be parsed");
    }
    if bad_dates > 0 {
        log::warn!("{label}: {bad_dates} date value(s) could not be parsed");
    }

    SourceTable {
        label: label.to_string(),
        binding: binding.clone(),
        records,
    }
}
