//! The process abstraction.
//!
//! A [`Process`] consumes one header-keyed stream and produces another. It
//! chooses its output header by calling its [`WriterBuilder`] once it has seen
//! the input header, writes records, and closes the writer with its own
//! outcome. Everything else (pipes, threads, error routing) is the job of
//! [`Pipeline`](crate::Pipeline) or [`Reader::with_process`].

use crate::reader::Reader;
use crate::record::Record;
use crate::writer::{self, WriterBuilder};
use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use std::any::Any;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

/// A stream transformation.
pub trait Process: Send {
    /// Transform `input` into the writer built by `output`.
    ///
    /// Implementations must close the writer they build, passing their
    /// failure (if any) so downstream readers can see it; [`writer::finish`]
    /// does both.
    ///
    /// # Errors
    /// Returns the first error hit while reading, transforming or writing.
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("process")
    }
}

/// Copy input to output unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cat;

impl Process for Cat {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        let mut w = output(input.header())?;
        let outcome = for_each(&input, |r| w.write(r));
        writer::finish(w, outcome)
    }

    fn name(&self) -> &'static str {
        "cat"
    }
}

/// Apply `f` to every record of `input`, then surface the input's own error.
///
/// # Errors
/// Returns the first error from `f`, or the input stream's terminal error.
pub fn for_each(input: &Reader, mut f: impl FnMut(Record) -> Result<()>) -> Result<()> {
    for record in input.records() {
        f(record)?;
    }
    input.error()?;
    Ok(())
}

/// Result of one stage, tagged with its position.
pub(crate) type Outcome = (usize, Result<()>);

/// Run `process` on a named thread and report exactly one outcome.
///
/// Panics inside the process are caught and reported as errors.
pub(crate) fn spawn(
    index: usize,
    process: Box<dyn Process>,
    input: Reader,
    output: WriterBuilder,
    outcomes: Sender<Outcome>,
) -> io::Result<JoinHandle<()>> {
    let name = process.name();
    thread::Builder::new()
        .name(format!("stage-{index}-{name}"))
        .spawn(move || {
            let span = tracing::debug_span!("stage", index, name);
            let _enter = span.enter();
            let result = catch_unwind(AssertUnwindSafe(move || process.run(input, output)))
                .unwrap_or_else(|panic| Err(anyhow!("{name} panicked: {}", panic_message(&*panic))));
            match &result {
                Ok(()) => tracing::debug!("stage finished"),
                Err(e) => tracing::debug!("stage failed: {e:#}"),
            }
            // The runner holds the receiver until every stage has reported.
            let _ = outcomes.send((index, result));
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;
    use crate::testing::SharedBuffer;
    use std::io::Cursor;

    #[test]
    fn cat_copies_everything() -> Result<()> {
        let input = Reader::from_io(Cursor::new("a,b\n1,2\n3,4\n"), &Dialect::default());
        let out = SharedBuffer::new();
        Box::new(Cat).run(input, writer::to_io(out.clone(), &Dialect::default()))?;
        assert_eq!(out.contents(), "a,b\n1,2\n3,4\n");
        Ok(())
    }

    #[test]
    fn cat_on_empty_input_writes_nothing() -> Result<()> {
        let input = Reader::from_io(Cursor::new(""), &Dialect::default());
        let out = SharedBuffer::new();
        Box::new(Cat).run(input, writer::to_io(out.clone(), &Dialect::default()))?;
        assert_eq!(out.contents(), "");
        Ok(())
    }

    struct Explode;

    impl Process for Explode {
        fn run(self: Box<Self>, _input: Reader, _output: WriterBuilder) -> Result<()> {
            panic!("kaboom");
        }
    }

    #[test]
    fn spawned_panics_become_errors() -> Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let input = Reader::from_io(Cursor::new("a\n"), &Dialect::default());
        let (builder, _reader) = crate::pipe::Pipe::new().split();
        let handle = spawn(7, Box::new(Explode), input, builder, tx)?;
        let (index, result) = rx.recv()?;
        assert_eq!(index, 7);
        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("kaboom"), "{msg}");
        assert!(handle.join().is_ok());
        Ok(())
    }
}
