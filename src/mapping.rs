//! Readers for the auxiliary input files: rename mappings, prefix mappings
//! and search-term lists.

use crate::error::ValidationError;
use std::fs;
use std::path::Path;

/// One data row of a rename mapping. Blank fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRow {
    /// 1-based line of the row in the file, counting the header.
    pub line: u64,
    pub original: Option<String>,
    pub new: Option<String>,
}

const ORIGINAL_COLUMNS: [&str; 2] = ["original_filename", "original_file_name"];
const NEW_COLUMNS: [&str; 2] = ["new_filename", "new_file_name"];

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

fn invalid(path: &Path, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidMapping {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn field(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Reads a headed rename mapping.
///
/// Header names are matched ignoring case, surrounding whitespace and the
/// difference between spaces and underscores, so `Original Filename` and
/// `original_file_name` both work.
pub fn read_rename_mapping(path: &Path) -> Result<Vec<RenameRow>, ValidationError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| invalid(path, e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| invalid(path, e.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();
    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let original_index = find(&ORIGINAL_COLUMNS)
        .ok_or_else(|| invalid(path, "missing an 'original filename' column"))?;
    let new_index =
        find(&NEW_COLUMNS).ok_or_else(|| invalid(path, "missing a 'new filename' column"))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, e.to_string()))?;
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(index as u64 + 2);
        rows.push(RenameRow {
            line,
            original: field(&record, original_index),
            new: field(&record, new_index),
        });
    }
    Ok(rows)
}

/// Base names and their prefixes, in the order bases first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMapping {
    pub rules: Vec<(String, String)>,
    /// Lines that did not hold both a base and a prefix.
    pub rejected: Vec<u64>,
}

impl PrefixMapping {
    /// The first rule, in file order, whose base starts `stem`.
    pub fn lookup(&self, stem: &str) -> Option<&(String, String)> {
        self.rules.iter().find(|(base, _)| stem.starts_with(base.as_str()))
    }
}

/// Reads an unheaded `base_filename,prefix` mapping.
///
/// A base listed twice keeps its first position but takes the later prefix.
pub fn read_prefix_mapping(path: &Path) -> Result<PrefixMapping, ValidationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| invalid(path, e.to_string()))?;

    let mut mapping = PrefixMapping::default();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, e.to_string()))?;
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(index as u64 + 1);
        match (field(&record, 0), field(&record, 1)) {
            (Some(base), Some(prefix)) => {
                match mapping.rules.iter_mut().find(|(b, _)| *b == base) {
                    Some(rule) => rule.1 = prefix,
                    None => mapping.rules.push((base, prefix)),
                }
            }
            _ => mapping.rejected.push(line),
        }
    }
    Ok(mapping)
}

/// Reads search terms from a file.
///
/// For `.csv` files the first column of each row is a term. Any other file
/// holds one term per line. Blank entries are ignored.
pub fn read_search_terms(path: &Path) -> Result<Vec<String>, ValidationError> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| invalid(path, e.to_string()))?;
        let mut terms = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| invalid(path, e.to_string()))?;
            terms.extend(field(&record, 0));
        }
        return Ok(terms);
    }

    let content = fs::read_to_string(path).map_err(|e| invalid(path, e.to_string()))?;
    Ok(split_terms(&content))
}

/// Splits inline text into terms, one per line.
pub fn split_terms(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
