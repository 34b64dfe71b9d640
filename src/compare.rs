//! Key comparison for sorting and joining.
//!
//! Each key column is compared under a [`Collation`] and a [`Direction`]; a
//! [`KeyComparator`] combines them lexicographically, earlier columns taking
//! priority.

use crate::header::Header;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How the values of one key column are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collation {
    /// Byte-wise string order.
    #[default]
    Lexical,
    /// Floating point order for values that parse as numbers. Values that do
    /// not parse sort after every number, lexically among themselves.
    ///
    /// A number never falls back to string order against an unparsable
    /// value, so the order stays total: `5,-,10` sorts as `5,10,-`, not
    /// `-,5,10`.
    Numeric,
}

impl Collation {
    pub fn compare(self, l: &str, r: &str) -> Ordering {
        match self {
            Collation::Lexical => l.cmp(r),
            Collation::Numeric => match (number(l), number(r)) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => l.cmp(r),
            },
        }
    }
}

fn number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| !f.is_nan())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Collation and direction of one key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOrder {
    pub collation: Collation,
    pub direction: Direction,
}

impl KeyOrder {
    pub fn compare(self, l: &str, r: &str) -> Ordering {
        let o = self.collation.compare(l, r);
        match self.direction {
            Direction::Ascending => o,
            Direction::Descending => o.reverse(),
        }
    }
}

/// Lexicographic comparison of key tuples.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyComparator {
    columns: Vec<KeyOrder>,
}

impl KeyComparator {
    pub fn new(columns: Vec<KeyOrder>) -> Self {
        Self { columns }
    }

    /// Ascending comparator for `keys`, numeric for those listed in `numeric`
    /// and descending for those listed in `reversed`.
    pub fn for_keys<S: AsRef<str>>(keys: &[S], numeric: &[S], reversed: &[S]) -> Self {
        let listed = |set: &[S], k: &str| set.iter().any(|n| n.as_ref() == k);
        Self::new(
            keys.iter()
                .map(|k| KeyOrder {
                    collation: if listed(numeric, k.as_ref()) {
                        Collation::Numeric
                    } else {
                        Collation::Lexical
                    },
                    direction: if listed(reversed, k.as_ref()) {
                        Direction::Descending
                    } else {
                        Direction::Ascending
                    },
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Compare two key tuples of the comparator's width.
    pub fn compare<L, R>(&self, l: &[L], r: &[R]) -> Ordering
    where
        L: AsRef<str>,
        R: AsRef<str>,
    {
        self.columns
            .iter()
            .zip(l.iter().zip(r))
            .map(|(order, (a, b))| order.compare(a.as_ref(), b.as_ref()))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Field positions of a list of keys within one header.
///
/// Resolving positions once per stream keeps per-record projection free of
/// map lookups. Keys absent from the header project as `""`.
#[derive(Debug, Clone)]
pub struct Projection {
    header: Header,
    positions: Vec<Option<usize>>,
}

impl Projection {
    pub fn new<S: AsRef<str>>(header: &Header, keys: &[S]) -> Self {
        Self {
            header: header.clone(),
            positions: keys.iter().map(|k| header.position(k.as_ref())).collect(),
        }
    }

    /// Borrowed key values of `record`.
    pub fn project<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        if record.header().is_same(&self.header) {
            let fields = record.as_slice();
            self.positions
                .iter()
                .map(|p| p.and_then(|i| fields.get(i)).map_or("", String::as_str))
                .collect()
        } else {
            self.positions
                .iter()
                .map(|p| p.map_or("", |i| record.get(&self.header.names()[i])))
                .collect()
        }
    }
}
