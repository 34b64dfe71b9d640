//! Header-first CSV readers.
//!
//! A [`Reader`] exposes a stream whose first record is the header. Decoding
//! happens on a background thread that pushes records through a rendezvous
//! channel, so a slow consumer throttles the decoder directly.
//!
//! The same type is the read end of a [`Pipe`](crate::Pipe): whatever produces
//! into a reader does so through the crate-internal [`Feed`].
//!
//! ## Contract
//! - [`Reader::header`] blocks until the header is known. A stream with no
//!   header record has an empty header and no error.
//! - [`Reader::records`] yields every record, in stream order, and ends when
//!   the producer finishes. This is the only termination signal.
//! - [`Reader::error`] blocks until the producer finishes and reports its
//!   terminal error. Drain [`Reader::records`] first: the producer cannot
//!   finish while it is blocked handing over a record.
//! - [`Reader::close`] is advisory. The producer stops at its next check, which
//!   happens between records, so one record already in flight may still be
//!   delivered after `close` returns.

use crate::config::Dialect;
use crate::error::StreamError;
use crate::gate::{Gate, GateSetter, gate};
use crate::header::Header;
use crate::io::compression::auto_detect_reader;
use crate::process::Process;
use crate::record::{Record, RecordBuilder};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Read side of a header-keyed record stream.
#[derive(Debug)]
pub struct Reader {
    header: Gate<Header>,
    outcome: Gate<Option<StreamError>>,
    records: Receiver<Record>,
    quit: Arc<AtomicBool>,
}

/// Producer side of a [`Reader`].
#[derive(Debug)]
pub(crate) struct Feed {
    header: Option<GateSetter<Header>>,
    outcome: GateSetter<Option<StreamError>>,
    records: Sender<Record>,
    quit: Arc<AtomicBool>,
}

/// A connected producer/consumer pair with an unbuffered record channel.
pub(crate) fn feed() -> (Feed, Reader) {
    let (header_tx, header_rx) = gate();
    let (outcome_tx, outcome_rx) = gate();
    let (tx, rx) = bounded(0);
    let quit = Arc::new(AtomicBool::new(false));
    (
        Feed {
            header: Some(header_tx),
            outcome: outcome_tx,
            records: tx,
            quit: Arc::clone(&quit),
        },
        Reader {
            header: header_rx,
            outcome: outcome_rx,
            records: rx,
            quit,
        },
    )
}

impl Feed {
    /// Publish the header. Only the first call has any effect.
    pub(crate) fn open(&mut self, header: Header) {
        if let Some(setter) = self.header.take() {
            setter.set(header);
        }
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Hand `record` to the consumer, blocking until it takes it.
    pub(crate) fn send(&self, record: Record) -> Result<(), StreamError> {
        if self.quit_requested() {
            return Err(StreamError::Disconnected);
        }
        self.records
            .send(record)
            .map_err(|_| StreamError::Disconnected)
    }

    /// Record the terminal outcome and end the stream.
    pub(crate) fn finish(mut self, outcome: Option<StreamError>) {
        // A stream that ends before opening still needs a header.
        self.open(Header::empty());
        let Feed { outcome: setter, .. } = self;
        setter.set(outcome);
    }
}

impl Reader {
    /// Decode `source` on a background thread.
    pub fn from_io<R>(source: R, dialect: &Dialect) -> Reader
    where
        R: io::Read + Send + 'static,
    {
        Reader::from_csv(dialect.reader_builder().from_reader(source))
    }

    /// Decode an already configured `csv::Reader` on a background thread.
    ///
    /// If the csv reader was built with header handling enabled its header
    /// record is used; otherwise the first record read becomes the header.
    pub fn from_csv<R>(rdr: csv::Reader<R>) -> Reader
    where
        R: io::Read + Send + 'static,
    {
        let (feed, reader) = feed();
        let spawned = thread::Builder::new()
            .name("csv-decode".into())
            .spawn(move || decode(rdr, feed));
        if let Err(e) = spawned {
            // The feed went down with the closure; readers see `Abandoned`.
            tracing::warn!("could not start decode thread: {e}");
        }
        reader
    }

    /// Open `path` (transparently decompressed) as a header-keyed stream.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, dialect: &Dialect) -> Result<Reader> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let source = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Ok(Reader::from_io(source, dialect))
    }

    /// The stream header, once known.
    pub fn header(&self) -> Header {
        self.header.wait().cloned().unwrap_or_else(Header::empty)
    }

    /// True once [`Reader::header`] would return without blocking.
    pub fn is_header_ready(&self) -> bool {
        self.header.is_open()
    }

    /// Iterate records until the stream ends.
    pub fn records(&self) -> crossbeam_channel::Iter<'_, Record> {
        self.records.iter()
    }

    /// Next record, or `None` once the stream has ended.
    pub fn recv(&self) -> Option<Record> {
        self.records.recv().ok()
    }

    /// Terminal outcome of the stream. Blocks until the producer finishes.
    pub fn error(&self) -> Result<(), StreamError> {
        match self.outcome.wait() {
            Some(None) => Ok(()),
            Some(Some(e)) => Err(e.clone()),
            None => Err(StreamError::Abandoned),
        }
    }

    /// Ask the producer to stop after the record it is working on.
    ///
    /// Idempotent and best effort: see the module documentation.
    pub fn close(&self) {
        self.quit.store(true, Ordering::Release);
    }

    /// Drain the stream into memory.
    ///
    /// # Errors
    /// Returns the stream's terminal error, if any. Normal end of stream is
    /// not an error.
    pub fn read_all(&self) -> Result<Vec<Record>, StreamError> {
        let all: Vec<Record> = self.records().collect();
        self.error()?;
        Ok(all)
    }

    /// A reader over the output of `process` applied to this reader.
    ///
    /// The process runs on its own thread. If it fails, the returned reader's
    /// [`error`](Reader::error) carries the failure as
    /// [`StreamError::Upstream`]. A failure before the process opened its
    /// output leaves the stream empty, with an empty header.
    pub fn with_process(self, process: Box<dyn Process>) -> Reader {
        let (builder, reader, unclaimed) = crate::pipe::Pipe::new().split_unclaimed();
        let on_failure = unclaimed.clone();
        let spawned = thread::Builder::new()
            .name("csv-process".into())
            .spawn(move || {
                if let Err(e) = process.run(self, builder) {
                    tracing::debug!("process behind reader failed: {e:#}");
                    on_failure.fail(&e);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("could not start process thread: {e}");
            unclaimed.fail(&anyhow::Error::new(e).context("start process thread"));
        }
        reader
    }
}

fn decode<R: io::Read>(mut rdr: csv::Reader<R>, mut feed: Feed) {
    let mut raw = csv::StringRecord::new();
    let header = if rdr.has_headers() {
        match rdr.headers() {
            Ok(h) => Header::new(h.iter()),
            Err(e) => return feed.finish(Some(e.into())),
        }
    } else {
        match rdr.read_record(&mut raw) {
            Ok(true) => Header::new(raw.iter()),
            Ok(false) => Header::empty(),
            Err(e) => return feed.finish(Some(e.into())),
        }
    };
    if header.is_empty() {
        return feed.finish(None);
    }

    let builder = RecordBuilder::new(header.clone());
    feed.open(header);
    loop {
        match rdr.read_record(&mut raw) {
            Ok(true) => {}
            Ok(false) => return feed.finish(None),
            Err(e) => return feed.finish(Some(e.into())),
        }
        if feed.quit_requested() {
            return feed.finish(None);
        }
        let record = builder.build(raw.iter().map(str::to_string).collect());
        if feed.send(record).is_err() {
            // Consumer dropped its reader; nobody is left to see an error.
            return feed.finish(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> Reader {
        Reader::from_io(Cursor::new(text.to_string()), &Dialect::default())
    }

    #[test]
    fn header_then_records() -> anyhow::Result<()> {
        let r = reader("a,b\n1,2\n3\n");
        assert_eq!(r.header().names(), &["a", "b"]);
        let all = r.read_all()?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].get("a"), "3");
        assert_eq!(all[1].get("b"), "");
        Ok(())
    }

    #[test]
    fn empty_stream_has_empty_header_and_no_error() {
        let r = reader("");
        assert!(r.header().is_empty());
        assert_eq!(r.records().count(), 0);
        assert!(r.error().is_ok());
    }

    #[test]
    fn finish_before_open_publishes_empty_header() {
        let (feed, r) = feed();
        feed.finish(Some(StreamError::Disconnected));
        assert!(r.header().is_empty());
        assert!(matches!(r.error(), Err(StreamError::Disconnected)));
    }

    #[test]
    fn dropped_feed_reports_abandoned() {
        let (feed, r) = feed();
        drop(feed);
        assert!(r.recv().is_none());
        assert!(matches!(r.error(), Err(StreamError::Abandoned)));
    }
}
