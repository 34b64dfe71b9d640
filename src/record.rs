//! Keyed records.
//!
//! A [`Record`] is a fixed-width vector of string fields addressed through its
//! stream's [`Header`]. Reads of unknown keys yield `""`; writes to unknown
//! keys are ignored. Both are deliberate leniencies: a process can copy
//! between streams with different headers without pre-checking every key.

use crate::header::Header;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

/// A data record keyed by its stream's header.
#[derive(Clone)]
pub struct Record {
    header: Header,
    fields: Vec<String>,
    cache: OnceCell<HashMap<String, String>>,
}

/// Builds records for one header.
///
/// Construct once per stream and reuse for every record of that stream; all
/// records built share the header and its index.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    header: Header,
}

impl RecordBuilder {
    pub fn new(header: Header) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Build a record owning `fields`.
    ///
    /// Fields beyond the header's width are an invariant violation: they are
    /// reported and dropped. Short field vectors are padded with `""`.
    pub fn build(&self, mut fields: Vec<String>) -> Record {
        let width = self.header.len();
        if fields.len() > width {
            tracing::warn!(
                fields = fields.len(),
                header = width,
                "invariant violated: record has more fields than header; extra fields dropped: {:?}",
                &fields[width..]
            );
            fields.truncate(width);
        }
        fields.resize(width, String::new());
        Record {
            header: self.header.clone(),
            fields,
            cache: OnceCell::new(),
        }
    }

    /// A record with every field empty.
    pub fn blank(&self) -> Record {
        self.build(Vec::new())
    }
}

impl Record {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Value of `key`, or `""` if the header has no such key.
    pub fn get(&self, key: &str) -> &str {
        self.header
            .position(key)
            .and_then(|i| self.fields.get(i))
            .map_or("", String::as_str)
    }

    /// Store `value` under `key`. Unknown keys are ignored.
    pub fn put(&mut self, key: &str, value: impl Into<String>) {
        let Some(i) = self.header.position(key) else {
            return;
        };
        let Some(slot) = self.fields.get_mut(i) else {
            return;
        };
        let value = value.into();
        if let Some(map) = self.cache.get_mut() {
            map.insert(key.to_string(), value.clone());
        }
        *slot = value;
    }

    /// Overwrite every field of this record with the value of the same key in
    /// `source` (`""` where `source` lacks the key).
    pub fn put_all(&mut self, source: &Record) {
        if self.same_header(source) {
            self.fields.clone_from_slice(&source.fields);
        } else {
            for (slot, key) in self.fields.iter_mut().zip(self.header.iter()) {
                let v = source.get(key);
                slot.clear();
                slot.push_str(v);
            }
        }
        self.cache = OnceCell::new();
    }

    /// True if both records are keyed by equal headers.
    pub fn same_header(&self, other: &Record) -> bool {
        self.header.matches(&other.header)
    }

    /// Field values in header order.
    pub fn as_slice(&self) -> &[String] {
        &self.fields
    }

    /// Key → value view, computed on first use and kept coherent with later
    /// writes.
    pub fn as_map(&self) -> &HashMap<String, String> {
        self.cache.get_or_init(|| {
            self.header
                .iter()
                .cloned()
                .zip(self.fields.iter().cloned())
                .collect()
        })
    }

    /// Values of `keys`, in order.
    pub fn project<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        keys.iter().map(|k| self.get(k.as_ref()).to_string()).collect()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.fields == other.fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.header.iter().zip(self.fields.iter()))
            .finish()
    }
}
