//! Header-keyed writers.
//!
//! A [`Writer`] is bound to one output header when it is built. The
//! indirection through [`WriterBuilder`] lets a process decide its output
//! shape after it has seen its input header, while pipeline wiring hands out
//! builders long before any header is known.

use crate::config::Dialect;
use crate::header::Header;
use crate::io::compression::{Sink, auto_detect_writer};
use crate::record::{Record, RecordBuilder};
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;

/// Sink for records of one header.
pub trait Writer: Send {
    /// The header that constrains the output stream.
    fn header(&self) -> &Header;

    /// A fresh all-empty record keyed by [`Writer::header`].
    ///
    /// Filling a blank and writing it keeps the writer on its fast path.
    fn blank(&self) -> Record;

    /// Write `record` in header order.
    ///
    /// Records keyed by a different header are accepted; their values are
    /// looked up key by key.
    fn write(&mut self, record: Record) -> Result<()>;

    /// Flush and release the sink.
    ///
    /// `failure` is the error that ended the producing process, if any. Sinks
    /// are flushed regardless; the returned error is the sink's own.
    fn close(self: Box<Self>, failure: Option<&anyhow::Error>) -> Result<()>;
}

/// Factory for a [`Writer`] with a given header. Called at most once.
pub type WriterBuilder = Box<dyn FnOnce(Header) -> Result<Box<dyn Writer>> + Send>;

/// Close `writer` with `outcome` and combine both results.
///
/// The process's own error wins; a close error is reported only when the
/// process succeeded.
pub fn finish(writer: Box<dyn Writer>, outcome: Result<()>) -> Result<()> {
    let closed = writer.close(outcome.as_ref().err());
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            tracing::debug!("close after failure also failed: {close_err:#}");
            Err(e)
        }
        (outcome, closed) => outcome.and(closed),
    }
}

/// Writer encoding records to a CSV byte sink.
pub struct CsvWriter<W: Write> {
    header: Header,
    builder: RecordBuilder,
    encoder: csv::Writer<W>,
    release: fn(W) -> io::Result<()>,
}

fn flush_and_drop<W: Write>(mut w: W) -> io::Result<()> {
    w.flush()
}

impl<W: Write + Send> CsvWriter<W> {
    /// Bind `encoder` to `header` and write the header record.
    ///
    /// # Errors
    /// Returns an error if the header record cannot be written.
    pub fn new(mut encoder: csv::Writer<W>, header: Header) -> Result<Self> {
        // An empty stream stays empty on output.
        if !header.is_empty() {
            encoder
                .write_record(header.iter())
                .context("write header record")?;
        }
        Ok(Self {
            builder: RecordBuilder::new(header.clone()),
            header,
            encoder,
            release: flush_and_drop::<W>,
        })
    }

    /// Use `release` instead of a plain flush when the writer is closed.
    pub fn with_release(mut self, release: fn(W) -> io::Result<()>) -> Self {
        self.release = release;
        self
    }
}

impl<W: Write + Send> Writer for CsvWriter<W> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn blank(&self) -> Record {
        self.builder.blank()
    }

    fn write(&mut self, record: Record) -> Result<()> {
        if record.header().is_same(&self.header) {
            self.encoder.write_record(record.as_slice())?;
        } else {
            self.encoder
                .write_record(self.header.iter().map(|k| record.get(k)))?;
        }
        Ok(())
    }

    fn close(self: Box<Self>, _failure: Option<&anyhow::Error>) -> Result<()> {
        let this = *self;
        let sink = this
            .encoder
            .into_inner()
            .map_err(|e| e.into_error())
            .context("flush csv output")?;
        (this.release)(sink).context("close csv output")
    }
}

/// Builder for a CSV writer over `sink`.
pub fn to_io<W>(sink: W, dialect: &Dialect) -> WriterBuilder
where
    W: Write + Send + 'static,
{
    to_csv(dialect.writer_builder().from_writer(sink))
}

/// Builder for a writer over an already configured `csv::Writer`.
pub fn to_csv<W>(encoder: csv::Writer<W>) -> WriterBuilder
where
    W: Write + Send + 'static,
{
    Box::new(move |header| Ok(Box::new(CsvWriter::new(encoder, header)?) as Box<dyn Writer>))
}

/// Builder for a CSV file at `path`, compressed according to its extension.
///
/// Parent directories are created when the writer is built.
pub fn create(path: impl AsRef<Path>, dialect: &Dialect) -> WriterBuilder {
    let path = path.as_ref().to_path_buf();
    let csv_builder = dialect.writer_builder();
    Box::new(move |header| {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let sink = auto_detect_writer(f, &path)
            .with_context(|| format!("setup compression for {}", path.display()))?;
        let writer = CsvWriter::new(csv_builder.from_writer(sink), header)?
            .with_release(Sink::finish);
        Ok(Box::new(writer) as Box<dyn Writer>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(build: impl FnOnce(&mut CsvWriter<Vec<u8>>)) -> String {
        let enc = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        let mut w = CsvWriter::new(enc, Header::new(["a", "b"])).unwrap();
        build(&mut w);
        let bytes = w.encoder.into_inner().unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn blank_is_fast_path() {
        let out = rendered(|w| {
            let mut r = w.blank();
            r.put("b", "2");
            w.write(r).unwrap();
        });
        assert_eq!(out, "a,b\n,2\n");
    }

    #[test]
    fn foreign_header_is_reordered() {
        let out = rendered(|w| {
            let other = RecordBuilder::new(Header::new(["c", "b", "a"]))
                .build(vec!["x".into(), "2".into(), "1".into()]);
            w.write(other).unwrap();
        });
        assert_eq!(out, "a,b\n1,2\n");
    }
}
