//! In-memory sort by key columns.

use crate::compare::{KeyComparator, Projection};
use crate::error::SchemaError;
use crate::process::Process;
use crate::processes::require_keys;
use crate::reader::Reader;
use crate::writer::{self, WriterBuilder};
use anyhow::{Result, ensure};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sort a stream by `keys`, in order of precedence.
///
/// Keys listed in `numeric` compare as numbers; keys listed in `reversed`
/// sort descending. The sort is stable. The whole stream is buffered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKeys {
    pub keys: Vec<String>,
    #[serde(default)]
    pub numeric: Vec<String>,
    #[serde(default)]
    pub reversed: Vec<String>,
}

impl SortKeys {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn numeric<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.numeric = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn reversed<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.reversed = keys.into_iter().map(Into::into).collect();
        self
    }

    /// # Errors
    /// Fails if there are no keys, or if `numeric` or `reversed` name a column
    /// that is not a key.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.keys.is_empty(), SchemaError::Config("sort needs at least one key".into()));
        for (what, list) in [("numeric", &self.numeric), ("reversed", &self.reversed)] {
            let stray: Vec<&str> = list
                .iter()
                .filter(|k| !self.keys.contains(*k))
                .map(String::as_str)
                .collect();
            ensure!(
                stray.is_empty(),
                SchemaError::Config(format!("{what} keys {} are not sort keys", stray.join(",")))
            );
        }
        Ok(())
    }

    pub fn comparator(&self) -> KeyComparator {
        KeyComparator::for_keys(&self.keys, &self.numeric, &self.reversed)
    }
}

impl Process for SortKeys {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        self.validate()?;
        let header = input.header();
        require_keys(&header, &self.keys)?;

        let mut all = input.read_all()?;
        let projection = Projection::new(&header, &self.keys);
        let comparator = self.comparator();
        all.par_sort_by(|l, r| comparator.compare(&projection.project(l), &projection.project(r)));

        let mut w = output(header)?;
        let outcome = all.into_iter().try_for_each(|r| w.write(r));
        writer::finish(w, outcome)
    }

    fn name(&self) -> &'static str {
        "sort"
    }
}
