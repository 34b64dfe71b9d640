//! In-memory pipes between processes.
//!
//! A [`Pipe`] joins a writer to a reader. The writer end is handed out as a
//! [`WriterBuilder`] so the producing process picks the header; the reader end
//! blocks in [`Reader::header`] until it does.
//!
//! The record channel is unbuffered. A `write` on the pipe returns only once
//! the consumer has taken the record, or fails with
//! [`StreamError::Disconnected`] once the reader is dropped or closed.

use crate::error::{StreamError, stream_error};
use crate::header::Header;
use crate::reader::{Feed, Reader, feed};
use crate::record::{Record, RecordBuilder};
use crate::writer::{Writer, WriterBuilder};
use anyhow::Result;
use crossbeam_channel::{Receiver, bounded};

/// An unopened pipe.
#[derive(Debug)]
pub struct Pipe {
    feed: Feed,
    reader: Reader,
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipe {
    pub fn new() -> Self {
        let (feed, reader) = feed();
        Self { feed, reader }
    }

    /// Separate the two ends.
    ///
    /// If the builder is dropped without being called the reader sees an
    /// empty stream ending in [`StreamError::Abandoned`].
    pub fn split(self) -> (WriterBuilder, Reader) {
        let (builder, reader, _) = self.split_unclaimed();
        (builder, reader)
    }

    /// Like [`Pipe::split`], plus a handle that can still end the stream
    /// with an error if the builder is never called.
    pub(crate) fn split_unclaimed(self) -> (WriterBuilder, Reader, Unclaimed) {
        let Pipe { feed, reader } = self;
        // Whoever takes the feed first owns it: the builder or `Unclaimed::fail`.
        let (park, slot) = bounded(1);
        let _ = park.try_send(feed);
        let claim = slot.clone();
        let builder: WriterBuilder = Box::new(move |header: Header| {
            let mut feed = claim.try_recv().map_err(|_| StreamError::Abandoned)?;
            feed.open(header.clone());
            Ok(Box::new(PipeWriter {
                builder: RecordBuilder::new(header.clone()),
                header,
                feed,
            }) as Box<dyn Writer>)
        });
        (builder, reader, Unclaimed { slot })
    }
}

/// How a producer's failure appears to the reader of its pipe.
fn upstream(failure: &anyhow::Error) -> StreamError {
    match stream_error(failure) {
        // Already an echo of another stage; keep it recognisable.
        Some(se) if se.is_cascade() => se.clone(),
        _ => StreamError::Upstream(format!("{failure:#}")),
    }
}

/// Producer side of a pipe whose builder has not been called yet.
#[derive(Clone)]
pub(crate) struct Unclaimed {
    slot: Receiver<Feed>,
}

impl Unclaimed {
    /// End the stream with `failure`, unless the builder already took it over.
    pub(crate) fn fail(&self, failure: &anyhow::Error) {
        if let Ok(feed) = self.slot.try_recv() {
            feed.finish(Some(upstream(failure)));
        }
    }
}

/// Write end of an open pipe.
struct PipeWriter {
    header: Header,
    builder: RecordBuilder,
    feed: Feed,
}

impl Writer for PipeWriter {
    fn header(&self) -> &Header {
        &self.header
    }

    fn blank(&self) -> Record {
        self.builder.blank()
    }

    fn write(&mut self, record: Record) -> Result<()> {
        let record = if record.header().is_same(&self.header) {
            record
        } else {
            let mut conformed = self.builder.blank();
            conformed.put_all(&record);
            conformed
        };
        self.feed.send(record)?;
        Ok(())
    }

    fn close(self: Box<Self>, failure: Option<&anyhow::Error>) -> Result<()> {
        self.feed.finish(failure.map(upstream));
        Ok(())
    }
}
