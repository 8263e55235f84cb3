// CSV/TSV source loading

use std::io::Read;
use std::path::Path;

use fuelaudit_recon::{RawTable, Scalar};

/// Load a delimited file, sniffing the delimiter. First record is the header.
pub fn import(path: &Path) -> Result<RawTable, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<RawTable, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, b'\t')
}

/// Tried in this order; on equal scores the earlier one wins.
const DELIMITERS: [u8; 4] = [b';', b'\t', b',', b'|'];

const SNIFF_LINES: usize = 10;

/// Pick the delimiter from the first non-blank lines.
///
/// A candidate scores `lines agreeing with the header's field count * that count`
/// and must split the header at all. Station and fleet exports are usually
/// `;`-separated with decimal commas (`50,5`), so once the sample shows decimal
/// commas between semicolons the comma is out of the running.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return b',';
    }

    let comma_is_decimal = sample
        .iter()
        .skip(1)
        .any(|line| line.contains(';') && line.split(';').any(is_decimal_comma));

    let mut best = (b',', 0usize);
    for delim in DELIMITERS {
        if delim == b',' && comma_is_decimal {
            continue;
        }
        let counts: Vec<usize> = sample.iter().map(|line| field_count(line, delim)).collect();
        let header = counts[0];
        if header < 2 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == header).count() * header;
        if score > best.1 {
            best = (delim, score);
        }
    }
    best.0
}

fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

/// `50,5`, `-1.234,56`, `"20,0"`: digits, one comma, digits.
fn is_decimal_comma(field: &str) -> bool {
    let field = field.trim().trim_matches('"');
    let field = field.strip_prefix('-').unwrap_or(field);
    match field.split_once(',') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.chars().all(|c| c.is_ascii_digit() || c == '.')
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback for Excel-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub(crate) fn import_from_string(content: &str, delimiter: u8) -> Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(result) => result.map_err(|e| e.to_string())?,
        None => return Err("file is empty".to_string()),
    };
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, name)| header_name(name, i))
        .collect();

    let mut table = RawTable::new(columns);
    for result in records {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(Scalar::from_cell).collect());
    }
    Ok(table)
}

/// Blank header cells get a positional placeholder name.
pub(crate) fn header_name(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {index}")
    } else {
        trimmed.to_string()
    }
}
