//! Stream headers.
//!
//! A [`Header`] is the ordered list of field names taken from the first record
//! of a stream, together with the name → position index derived from it. Both
//! are computed once and shared by every record of the stream.
//!
//! Two headers built by the same [`Header::new`] call share *provenance*;
//! [`Header::is_same`] checks that with a pointer comparison and is the fast
//! path used by writers and [`Record::put_all`](crate::Record::put_all).
//! Value equality ([`PartialEq`]) is always correct and is the fallback.

use crate::utils;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct Inner {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

/// Shared, immutable stream header.
#[derive(Clone)]
pub struct Header {
    inner: Arc<Inner>,
}

impl Header {
    /// Build a header and its index.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = utils::index(&names);
        Self {
            inner: Arc::new(Inner { names, index }),
        }
    }

    /// The header of a stream with no header record.
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn names(&self) -> &[String] {
        &self.inner.names
    }

    pub fn len(&self) -> usize {
        self.inner.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.names.is_empty()
    }

    /// Position of `key`, if the header has it.
    #[inline]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.inner.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.index.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.inner.names.iter()
    }

    /// Keys from `keys` that this header lacks, in `keys` order.
    pub fn missing<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        keys.iter()
            .map(AsRef::as_ref)
            .filter(|k| !self.contains(k))
            .map(str::to_string)
            .collect()
    }

    /// True when both headers come from the same [`Header::new`] call.
    #[inline]
    pub fn is_same(&self, other: &Header) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Provenance check first, then value comparison.
    pub fn matches(&self, other: &Header) -> bool {
        self.is_same(other) || self.names() == other.names()
    }

    /// A new header with `extra` appended.
    pub fn extend<I, S>(&self, extra: I) -> Header
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Header::new(
            self.names()
                .iter()
                .cloned()
                .chain(extra.into_iter().map(Into::into)),
        )
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Header {}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Header {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Header::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_versus_value() {
        let a = Header::new(["x", "y"]);
        let b = a.clone();
        let c = Header::new(["x", "y"]);
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
        assert_eq!(a, c);
        assert_ne!(a, Header::new(["y", "x"]));
    }

    #[test]
    fn positions_and_missing() {
        let h = Header::new(["Date", "Amount", "Description"]);
        assert_eq!(h.position("Amount"), Some(1));
        assert_eq!(h.position("Nope"), None);
        assert_eq!(h.missing(&["Amount", "Nope", "Other"]), vec!["Nope", "Other"]);
        assert_eq!(h.extend(["Sequence"]).names().last().map(String::as_str), Some("Sequence"));
    }
}
