//! Stream dialects and declarative pipeline definitions.
//!
//! Pipelines can be described in JSON and built at runtime:
//!
//! ```
//! use keyed_csv::config::PipelineSpec;
//!
//! let spec = PipelineSpec::from_json(r#"{
//!     "dialect": { "delimiter": "\t" },
//!     "stages": [
//!         { "process": "sort", "keys": ["Date"], "numeric": [] },
//!         { "process": "uniquify", "partial_keys": ["Date"], "additional_key": "Seq" }
//!     ]
//! }"#).unwrap();
//! assert_eq!(spec.stages.len(), 2);
//! let pipeline = spec.build().unwrap();
//! assert_eq!(pipeline.len(), 2);
//! ```

use crate::error::SchemaError;
use crate::pipeline::Pipeline;
use crate::process::{Cat, Process};
use crate::processes::join::Join;
use crate::processes::select::Select;
use crate::processes::sort::SortKeys;
#[cfg(feature = "surrogate-keys")]
use crate::processes::surrogate_keys::SurrogateKeys;
use crate::processes::uniquify::Uniquify;
use crate::reader::Reader;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Field delimiter, quoting and field-count policy of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    pub delimiter: char,
    pub quote: char,
    /// Allow records with differing field counts.
    pub flexible: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::csv()
    }
}

impl Dialect {
    /// Comma separated, double-quoted, variable field counts.
    pub const fn csv() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            flexible: true,
        }
    }

    /// Tab separated.
    pub const fn tab() -> Self {
        Self {
            delimiter: '\t',
            ..Self::csv()
        }
    }

    /// Reject records whose field count differs from the header's.
    pub const fn strict(self) -> Self {
        Self {
            flexible: false,
            ..self
        }
    }

    /// # Errors
    /// Returns an error if the delimiter or quote is not a single ASCII byte.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.delimiter.is_ascii(), SchemaError::Config(format!("delimiter {:?} is not ASCII", self.delimiter)));
        ensure!(self.quote.is_ascii(), SchemaError::Config(format!("quote {:?} is not ASCII", self.quote)));
        Ok(())
    }

    fn byte(c: char, fallback: u8) -> u8 {
        u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(fallback)
    }

    /// Reader configuration; headers are handled by [`Reader`], not csv.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut b = csv::ReaderBuilder::new();
        b.has_headers(false)
            .flexible(self.flexible)
            .delimiter(Self::byte(self.delimiter, b','))
            .quote(Self::byte(self.quote, b'"'));
        b
    }

    pub fn writer_builder(&self) -> csv::WriterBuilder {
        let mut b = csv::WriterBuilder::new();
        b.has_headers(false)
            .flexible(self.flexible)
            .delimiter(Self::byte(self.delimiter, b','))
            .quote(Self::byte(self.quote, b'"'));
        b
    }
}

/// One stage of a declarative pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "process", rename_all = "kebab-case")]
pub enum StageSpec {
    Cat,
    Select(Select),
    Sort(SortKeys),
    Uniquify(Uniquify),
    #[cfg(feature = "surrogate-keys")]
    SurrogateKeys(SurrogateKeys),
    Join(JoinSpec),
}

/// Join the pipeline's stream (left) with the CSV file at `right`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSpec {
    pub right: PathBuf,
    pub left_keys: Vec<String>,
    /// Defaults to `left_keys`.
    #[serde(default)]
    pub right_keys: Vec<String>,
    #[serde(default)]
    pub numeric: Vec<String>,
}

/// A whole pipeline: the dialect used for side inputs plus its stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    pub dialect: Dialect,
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// # Errors
    /// Returns an error if `json` is not a valid pipeline definition.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse pipeline definition")
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Validate the definition and build a runnable pipeline.
    ///
    /// Join stages open their right-hand files here.
    ///
    /// # Errors
    /// Returns an error for an invalid dialect or stage configuration, or if a
    /// join input cannot be opened.
    pub fn build(&self) -> Result<Pipeline> {
        self.dialect.validate()?;
        let mut stages: Vec<Box<dyn Process>> = Vec::with_capacity(self.stages.len());
        for (i, stage) in self.stages.iter().enumerate() {
            let built = self
                .build_stage(stage)
                .with_context(|| format!("stage {i}"))?;
            stages.push(built);
        }
        Ok(Pipeline::new(stages))
    }

    fn build_stage(&self, stage: &StageSpec) -> Result<Box<dyn Process>> {
        Ok(match stage {
            StageSpec::Cat => Box::new(Cat),
            StageSpec::Select(p) => Box::new(p.clone()),
            StageSpec::Sort(p) => {
                p.validate()?;
                Box::new(p.clone())
            }
            StageSpec::Uniquify(p) => Box::new(p.clone()),
            #[cfg(feature = "surrogate-keys")]
            StageSpec::SurrogateKeys(p) => Box::new(p.clone()),
            StageSpec::Join(spec) => {
                let right_keys = if spec.right_keys.is_empty() {
                    spec.left_keys.clone()
                } else {
                    spec.right_keys.clone()
                };
                let join = Join::new(spec.left_keys.clone(), right_keys).numeric(spec.numeric.clone());
                join.validate()?;
                let right = Reader::open(&spec.right, &self.dialect)?;
                Box::new(join.with_right(right))
            }
        })
    }
}
