//! # keyed-csv
//!
//! A toolkit for **header-keyed CSV streams**. The first record of every
//! stream names its fields; records are read and written by key rather than
//! by position, and independent transformation stages compose into
//! concurrent pipelines.
//!
//! ## Key Features
//!
//! - **Keyed records** - `get`/`put` by field name, with a shared per-stream index
//! - **Streaming readers** - decoding runs on a background thread with rendezvous handoff
//! - **Pipelines** - N stages on N threads, wired by unbuffered pipes, with first-error reporting
//! - **Processes** - select, sort, merge join, uniquify, surrogate keys, JSON and line-protocol export
//! - **File plumbing** - transparent gzip/zstd/bzip2/xz (optional via feature flags)
//! - **Declarative configuration** - pipelines loadable from JSON
//!
//! ## Quick Start
//!
//! ```
//! use keyed_csv::*;
//! use keyed_csv::processes::{select::Select, sort::SortKeys};
//! use keyed_csv::testing::SharedBuffer;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let input = Reader::from_io(
//!     "name,score,team\nann,10,red\nbob,9,blue\ncid,12,red\n".as_bytes(),
//!     &Dialect::csv(),
//! );
//! let out = SharedBuffer::new();
//!
//! let pipeline = Pipeline::default()
//!     .then(SortKeys::new(["score"]).numeric(["score"]))
//!     .then(Select::new(["name", "score"]));
//! Box::new(pipeline).run(input, writer::to_io(out.clone(), &Dialect::csv()))?;
//!
//! assert_eq!(out.contents(), "name,score\nbob,9\nann,10\ncid,12\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Header and Record
//!
//! A [`Header`] is computed once per stream and shared by all of its
//! records. A [`Record`] reads unknown keys as `""` and ignores writes to
//! unknown keys.
//!
//! ### Reader and Writer
//!
//! A [`Reader`] yields the header, then records, then a terminal outcome. A
//! [`Writer`] is bound to one output header, created through a
//! [`WriterBuilder`] once the producing process knows its output shape.
//!
//! ### Process and Pipeline
//!
//! A [`Process`] consumes a reader and a writer builder. A [`Pipeline`] is a
//! process made of processes; see its module docs for how errors are chosen
//! and how a failing stage releases the stages feeding it.
//!
//! ## Feature Flags
//!
//! - `surrogate-keys` - SHA-256 surrogate key generation
//! - `line-protocol` - InfluxDB line protocol and OpenTSDB export (requires `chrono`)
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` -
//!   transparent file compression
//!
//! All features are enabled by default.
//!
//! ## Module Overview
//!
//! - [`header`], [`record`] - the data model
//! - [`reader`], [`writer`], [`pipe`] - stream endpoints
//! - [`process`], [`pipeline`] - composition and execution
//! - [`processes`] - concrete transforms
//! - [`compare`] - key collation for sort and join
//! - [`config`] - dialects and JSON pipeline definitions
//! - [`io`] - file compression
//! - [`testing`] - helpers for testing processes

pub mod compare;
pub mod config;
pub mod error;
mod gate;
pub mod header;
pub mod io;
pub mod pipe;
pub mod pipeline;
pub mod process;
pub mod processes;
pub mod reader;
pub mod record;
pub mod testing;
pub mod utils;
pub mod writer;

pub use compare::{Collation, Direction, KeyComparator};
pub use config::{Dialect, PipelineSpec, StageSpec};
pub use error::{SchemaError, StreamError};
pub use header::Header;
pub use pipe::Pipe;
pub use pipeline::Pipeline;
pub use process::{Cat, Process};
pub use reader::Reader;
pub use record::{Record, RecordBuilder};
pub use writer::{CsvWriter, Writer, WriterBuilder};
