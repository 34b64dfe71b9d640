//! Column selection and permutation.

use crate::header::Header;
use crate::process::{Process, for_each};
use crate::reader::Reader;
use crate::utils::intersect;
use crate::writer::{self, WriterBuilder};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Output only `keys`, in that order.
///
/// With `permute_only` every input column is kept: `keys` come first and the
/// remaining columns follow in their input order. Keys the input lacks are
/// output as empty columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Select {
    pub keys: Vec<String>,
    #[serde(default)]
    pub permute_only: bool,
}

impl Select {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            permute_only: false,
        }
    }

    pub fn permute_only(mut self) -> Self {
        self.permute_only = true;
        self
    }

    /// Output header for an input with `input` header.
    pub fn output_header(&self, input: &Header) -> Header {
        if self.permute_only {
            let (_, _, rest) = intersect(&self.keys, input.names());
            Header::new(self.keys.iter().cloned().chain(rest))
        } else {
            Header::new(self.keys.iter().cloned())
        }
    }
}

impl Process for Select {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        let mut w = output(self.output_header(&input.header()))?;
        let outcome = for_each(&input, |record| {
            let mut out = w.blank();
            out.put_all(&record);
            w.write(out)
        });
        writer::finish(w, outcome)
    }

    fn name(&self) -> &'static str {
        "select"
    }
}
