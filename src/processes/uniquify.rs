//! Make a partial key unique by adding a sequence column.

use crate::compare::Projection;
use crate::process::{Process, for_each};
use crate::processes::{require_absent, require_keys};
use crate::reader::Reader;
use crate::writer::{self, WriterBuilder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Append `additional_key` so that `partial_keys` + `additional_key` is unique.
///
/// The first record with a given partial key gets an empty sequence value,
/// later ones get `1`, `2`, …:
///
/// ```text
/// Date,Amount,Description        Date,Amount,Description,Sequence
/// 2014/12/31,100.0,Payment   ->  2014/12/31,100.0,Payment,
/// 2014/12/31,100.0,Payment       2014/12/31,100.0,Payment,1
/// 2014/12/31,85.0,Payment        2014/12/31,85.0,Payment,
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uniquify {
    pub partial_keys: Vec<String>,
    pub additional_key: String,
}

impl Uniquify {
    pub fn new<S: Into<String>>(partial_keys: impl IntoIterator<Item = S>, additional_key: impl Into<String>) -> Self {
        Self {
            partial_keys: partial_keys.into_iter().map(Into::into).collect(),
            additional_key: additional_key.into(),
        }
    }
}

impl Process for Uniquify {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        let header = input.header();
        require_keys(&header, &self.partial_keys).context("failed at line 1")?;
        require_absent(&header, &self.additional_key).context("failed at line 1")?;

        let projection = Projection::new(&header, &self.partial_keys);
        let mut seen: HashMap<Vec<String>, usize> = HashMap::new();
        let mut w = output(header.extend([self.additional_key.as_str()]))?;
        let mut line = 1usize;
        let outcome = for_each(&input, |record| {
            line += 1;
            let key: Vec<String> = projection.project(&record).into_iter().map(str::to_string).collect();
            let seq = seen.entry(key).and_modify(|n| *n += 1).or_insert(0);
            let mut out = w.blank();
            out.put_all(&record);
            if *seq > 0 {
                out.put(&self.additional_key, seq.to_string());
            }
            w.write(out).with_context(|| format!("failed at line {line}"))
        });
        writer::finish(w, outcome)
    }

    fn name(&self) -> &'static str {
        "uniquify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::testing::run_to_string;

    #[test]
    fn numbers_repeated_partial_keys() -> Result<()> {
        let out = run_to_string(
            Uniquify::new(["Date", "Amount"], "Sequence"),
            "Date,Amount,Description\n\
             2014/12/31,100.0,Payment\n\
             2014/12/31,100.0,Payment\n\
             2014/12/31,85.0,Payment\n\
             2014/12/31,100.0,Refund\n",
        )?;
        assert_eq!(
            out,
            "Date,Amount,Description,Sequence\n\
             2014/12/31,100.0,Payment,\n\
             2014/12/31,100.0,Payment,1\n\
             2014/12/31,85.0,Payment,\n\
             2014/12/31,100.0,Refund,2\n"
        );
        Ok(())
    }

    #[test]
    fn existing_additional_key_is_rejected() {
        let err = run_to_string(Uniquify::new(["a"], "b"), "a,b\n1,2\n").unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::KeyExists("b".into()))
        );
        assert!(format!("{err:#}").starts_with("failed at line 1"));
    }
}
