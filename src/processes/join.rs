//! Full outer merge join of two sorted streams.
//!
//! Both inputs must be sorted ascending by their join keys under the join's
//! comparator. Each side is read as a sequence of *groups* (runs of
//! consecutive records with equal keys) and groups are merged:
//!
//! - left key < right key: every left record is emitted against a blank right
//!   record and the left side advances;
//! - right key < left key: the mirror image;
//! - equal keys: the cross product of both groups is emitted, left-major, and
//!   both sides advance.
//!
//! The output header is the join keys (named as on the left), then the
//! remaining left columns, then the remaining right columns. A right column
//! whose name is already taken on the left is dropped with a warning.
//!
//! A decode error on either input ends the join: groups completed before the
//! error are still merged and emitted, nothing after it is.

use crate::compare::{KeyComparator, Projection};
use crate::error::SchemaError;
use crate::header::Header;
use crate::process::Process;
use crate::processes::require_keys;
use crate::reader::Reader;
use crate::record::{Record, RecordBuilder};
use crate::utils::intersect;
use crate::writer::{self, Writer, WriterBuilder};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Join configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    /// Left key names compared numerically (applies to the paired right key
    /// too).
    #[serde(default)]
    pub numeric: Vec<String>,
}

impl Join {
    pub fn new<S: Into<String>>(left_keys: impl IntoIterator<Item = S>, right_keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            left_keys: left_keys.into_iter().map(Into::into).collect(),
            right_keys: right_keys.into_iter().map(Into::into).collect(),
            numeric: Vec::new(),
        }
    }

    /// Join on columns with the same names on both sides.
    pub fn on<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        Self::new(keys.clone(), keys)
    }

    pub fn numeric<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.numeric = keys.into_iter().map(Into::into).collect();
        self
    }

    /// # Errors
    /// Fails if the key lists are empty or differ in length, or if a numeric
    /// key is not a left key.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.left_keys.is_empty(), SchemaError::Config("join needs at least one key".into()));
        ensure!(
            self.left_keys.len() == self.right_keys.len(),
            SchemaError::Config(format!(
                "{} left keys but {} right keys",
                self.left_keys.len(),
                self.right_keys.len()
            ))
        );
        let (_, stray, _) = intersect(&self.numeric, &self.left_keys);
        ensure!(
            stray.is_empty(),
            SchemaError::Config(format!("numeric keys {} are not left join keys", stray.join(",")))
        );
        Ok(())
    }

    pub fn comparator(&self) -> KeyComparator {
        KeyComparator::for_keys(&self.left_keys, &self.numeric, &[])
    }

    /// Bind `right` as the right-hand input. The process's own input becomes
    /// the left-hand side.
    pub fn with_right(self, right: Reader) -> JoinProcess {
        JoinProcess { join: self, right }
    }

    /// Join `left` with `right` into the writer built by `output`.
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if a key is missing from its side, and
    /// otherwise the first read or write error.
    pub fn run(&self, left: &Reader, right: &Reader, output: WriterBuilder) -> Result<()> {
        self.validate()?;
        let left_header = left.header();
        let right_header = right.header();
        require_keys(&left_header, &self.left_keys).context("left input")?;
        require_keys(&right_header, &self.right_keys).context("right input")?;

        let layout = Layout::new(&self.left_keys, &left_header, &self.right_keys, &right_header);
        let mut w = output(layout.header.clone())?;
        let comparator = self.comparator();
        let mut merge = Merge {
            layout: &layout,
            left_blank: RecordBuilder::new(left_header.clone()).blank(),
            right_blank: RecordBuilder::new(right_header.clone()).blank(),
            writer: w.as_mut(),
        };
        let outcome = merge.run(
            Groups::new(left, Projection::new(&left_header, &self.left_keys), &comparator),
            Groups::new(right, Projection::new(&right_header, &self.right_keys), &comparator),
            &comparator,
        );
        writer::finish(w, outcome)
    }
}

/// A [`Join`] bound to its right-hand input.
#[derive(Debug)]
pub struct JoinProcess {
    join: Join,
    right: Reader,
}

impl Process for JoinProcess {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        let JoinProcess { join, right } = *self;
        join.run(&input, &right, output)
    }

    fn name(&self) -> &'static str {
        "join"
    }
}

/// Column layout of the joined stream.
struct Layout {
    header: Header,
    keys: Vec<String>,
    left_only: Vec<String>,
    right_only: Vec<String>,
}

impl Layout {
    fn new(left_keys: &[String], left: &Header, right_keys: &[String], right: &Header) -> Self {
        let (_, left_only, _) = intersect(left.names(), left_keys);
        let (_, right_rest, _) = intersect(right.names(), right_keys);
        let (right_only, taken): (Vec<String>, Vec<String>) = right_rest
            .into_iter()
            .partition(|name| !left.contains(name) && !left_keys.contains(name));
        if !taken.is_empty() {
            tracing::warn!(
                columns = %taken.join(","),
                "right-hand join columns shadowed by left-hand names are dropped"
            );
        }
        let header = Header::new(
            left_keys
                .iter()
                .chain(&left_only)
                .chain(&right_only)
                .cloned(),
        );
        Self {
            header,
            keys: left_keys.to_vec(),
            left_only,
            right_only,
        }
    }
}

/// Groups of consecutive equal-keyed records from one input.
struct Groups<'a> {
    reader: &'a Reader,
    projection: Projection,
    comparator: &'a KeyComparator,
    lookahead: Option<Record>,
    /// Stream error seen while completing the previous group.
    pending: Option<anyhow::Error>,
}

struct Group {
    key: Vec<String>,
    records: Vec<Record>,
}

impl<'a> Groups<'a> {
    fn new(reader: &'a Reader, projection: Projection, comparator: &'a KeyComparator) -> Self {
        Self {
            reader,
            projection,
            comparator,
            lookahead: None,
            pending: None,
        }
    }

    fn pull(&mut self) -> Result<Option<Record>> {
        if let Some(r) = self.lookahead.take() {
            return Ok(Some(r));
        }
        match self.reader.recv() {
            Some(r) => Ok(Some(r)),
            None => {
                self.reader.error()?;
                Ok(None)
            }
        }
    }

    /// The next run of equal keys. A stream error hit while extending a run
    /// is returned by the following call, after the run itself.
    fn next_group(&mut self) -> Result<Option<Group>> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        let Some(first) = self.pull()? else {
            return Ok(None);
        };
        let key: Vec<String> = self
            .projection
            .project(&first)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut records = vec![first];
        loop {
            match self.pull() {
                Ok(Some(next)) if self.comparator.compare(&key, &self.projection.project(&next)).is_eq() => {
                    records.push(next);
                }
                Ok(Some(next)) => {
                    self.lookahead = Some(next);
                    break;
                }
                Ok(None) => break,
                Err(e) => {
                    self.pending = Some(e);
                    break;
                }
            }
        }
        Ok(Some(Group { key, records }))
    }
}

struct Merge<'a> {
    layout: &'a Layout,
    left_blank: Record,
    right_blank: Record,
    writer: &'a mut dyn Writer,
}

impl Merge<'_> {
    fn run(&mut self, mut left: Groups<'_>, mut right: Groups<'_>, comparator: &KeyComparator) -> Result<()> {
        let (left_blank, right_blank) = (self.left_blank.clone(), self.right_blank.clone());
        let mut l = left.next_group()?;
        let mut r = right.next_group()?;
        loop {
            let order = match (&l, &r) {
                (None, None) => return Ok(()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(lg), Some(rg)) => comparator.compare(&lg.key, &rg.key),
            };
            match order {
                Ordering::Less => {
                    if let Some(lg) = l.take() {
                        for rec in &lg.records {
                            self.emit(&lg.key, rec, &right_blank)?;
                        }
                    }
                    l = left.next_group()?;
                }
                Ordering::Greater => {
                    if let Some(rg) = r.take() {
                        for rec in &rg.records {
                            self.emit(&rg.key, &left_blank, rec)?;
                        }
                    }
                    r = right.next_group()?;
                }
                Ordering::Equal => {
                    if let (Some(lg), Some(rg)) = (l.take(), r.take()) {
                        for lrec in &lg.records {
                            for rrec in &rg.records {
                                self.emit(&lg.key, lrec, rrec)?;
                            }
                        }
                    }
                    l = left.next_group()?;
                    r = right.next_group()?;
                }
            }
        }
    }

    fn emit(&mut self, key: &[String], left: &Record, right: &Record) -> Result<()> {
        let mut out = self.writer.blank();
        for (name, value) in self.layout.keys.iter().zip(key) {
            out.put(name, value.as_str());
        }
        for name in &self.layout.left_only {
            out.put(name, left.get(name));
        }
        for name in &self.layout.right_only {
            out.put(name, right.get(name));
        }
        self.writer.write(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_orders_keys_then_left_then_right() {
        let layout = Layout::new(
            &["id".to_string()],
            &Header::new(["x", "id", "y"]),
            &["rid".to_string()],
            &Header::new(["rid", "z", "x"]),
        );
        assert_eq!(layout.header.names(), &["id", "x", "y", "z"]);
        assert_eq!(layout.right_only, ["z"]);
    }

    #[test]
    fn mismatched_key_lists_are_rejected() {
        assert!(Join::new(["a", "b"], ["a"]).validate().is_err());
        assert!(Join::on(["a"]).numeric(["b"]).validate().is_err());
        assert!(Join::on(["a"]).numeric(["a"]).validate().is_ok());
    }
}
