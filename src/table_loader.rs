use crate::error::EnrichmentError;
use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Column names checked first, in priority order, when looking for the
/// company column. These are the exact headers the usual export tools emit.
pub const DEFAULT_COMPANY_COLUMNS: &[&str] =
    &["Firma 1", "Firma (Gesamt)", "Name", "Aussteller", "Unternehmen"];

const COMPANY_KEYWORDS: &[&str] = &["firma", "company", "aussteller", "unternehmen"];

const DELIMITER_CANDIDATES: &[char] = &[',', ';', '\t', '|'];

const ENCODING_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// A parsed input table. Rows are positionally aligned with `headers`:
/// short lines were padded with empty fields, long lines truncated.
#[derive(Debug)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub delimiter: u8,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Table, EnrichmentError> {
    let bytes = fs::read(path.as_ref())?;
    let content = decode(&bytes);
    if content.trim().is_empty() {
        return Err(EnrichmentError::EmptyFile);
    }

    let delimiter = detect_delimiter(&content);
    info!(
        "Loading {:?} with delimiter {:?}",
        path.as_ref(),
        delimiter as char
    );
    parse(&content, delimiter)
}

/// Decode raw bytes using the detector's guess when it is confident enough,
/// falling back to UTF-8. `Encoding::decode` strips a leading BOM either way.
fn decode(bytes: &[u8]) -> String {
    let (charset, confidence, _language) = chardet::detect(bytes);
    let encoding = if confidence > ENCODING_CONFIDENCE_THRESHOLD {
        Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
    } else {
        None
    };
    let encoding = encoding.unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("Input contained byte sequences invalid for {}", used.name());
    }
    text.into_owned()
}

/// Pick whichever candidate splits the first non-empty line into the most
/// fields. Comma wins ties and empty input.
fn detect_delimiter(content: &str) -> u8 {
    let first_line = match content.lines().find(|l| !l.trim().is_empty()) {
        Some(line) => line,
        None => return b',',
    };

    let mut best = ',';
    let mut most_fields = 0;
    for &candidate in DELIMITER_CANDIDATES {
        let fields = first_line.split(candidate).count();
        if fields > most_fields {
            most_fields = fields;
            best = candidate;
        }
    }
    best as u8
}

fn parse(content: &str, delimiter: u8) -> Result<Table, EnrichmentError> {
    let mut lines = content.lines();
    let header_line = lines.next().unwrap_or("");

    let headers: Vec<String> = header_line
        .split(delimiter as char)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if headers.is_empty() {
        return Err(EnrichmentError::NoHeader);
    }

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut values: Vec<String> = line
            .split(delimiter as char)
            .map(|v| v.trim().to_string())
            .collect();
        values.resize(headers.len(), String::new());
        rows.push(values);
    }

    Ok(Table {
        headers,
        rows,
        delimiter,
    })
}

/// Find the index of the column holding the company name: exact match against
/// the priority defaults, then case-insensitive substring match, then the
/// second column, then the first.
pub fn detect_company_column(headers: &[String]) -> Option<usize> {
    for field in DEFAULT_COMPANY_COLUMNS {
        if let Some(idx) = headers.iter().position(|h| h == field) {
            return Some(idx);
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let lower = header.to_lowercase();
        if COMPANY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return Some(idx);
        }
    }

    match headers.len() {
        0 => None,
        1 => Some(0),
        _ => Some(1),
    }
}
