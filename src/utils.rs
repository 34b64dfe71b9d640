//! Utilities for working with CSV headers and single CSV records.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Map each name to its position. Later duplicates win.
pub fn index<S: AsRef<str>>(names: &[S]) -> HashMap<String, usize> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_ref().to_string(), i))
        .collect()
}

/// Split two name lists into `(a ∩ b, a ∖ b, b ∖ a)`.
///
/// The intersection follows `b`'s order; each difference keeps the order of
/// its own side.
///
/// # Example
/// ```
/// use keyed_csv::utils::intersect;
///
/// let (both, only_a, only_b) = intersect(&["a", "b"], &["b", "c"]);
/// assert_eq!(both, vec!["b"]);
/// assert_eq!(only_a, vec!["a"]);
/// assert_eq!(only_b, vec!["c"]);
/// ```
pub fn intersect<A, B>(a: &[A], b: &[B]) -> (Vec<String>, Vec<String>, Vec<String>)
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let in_a = index(a);
    let in_b = index(b);
    let mut both = Vec::with_capacity(b.len());
    let mut only_b = Vec::with_capacity(b.len());
    for v in b.iter().map(AsRef::as_ref) {
        if in_a.contains_key(v) {
            both.push(v.to_string());
        } else {
            only_b.push(v.to_string());
        }
    }
    let only_a = a
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| !in_b.contains_key(*v))
        .map(str::to_string)
        .collect();
    (both, only_a, only_b)
}

/// Encode `fields` as one CSV line (with trailing newline) using the default
/// CSV conventions.
pub fn format_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    // Writing to a Vec<u8> cannot fail.
    let _ = wtr.write_record(fields.iter().map(AsRef::as_ref));
    let bytes = wtr.into_inner().unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

/// Parse the first CSV record in `line`.
///
/// Inverse of [`format_fields`]. An empty string parses to no fields.
pub fn parse_fields(line: &str) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    let found = rdr
        .read_record(&mut record)
        .with_context(|| format!("parse field list {line:?}"))?;
    if !found {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(str::to_string).collect())
}

static JSON_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ *-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)? *$").expect("valid number regex")
});

/// True if `s` is a JSON number literal, optionally padded with spaces.
pub fn is_json_number(s: &str) -> bool {
    JSON_NUMBER.is_match(s)
}
