//! Multi-stage pipelines.
//!
//! A [`Pipeline`] of N stages is itself a [`Process`]. Running it inserts N-1
//! [`Pipe`]s between consecutive stages and runs every stage on its own
//! thread; records flow through the pipes with rendezvous handoff, so a slow
//! stage throttles everything upstream of it.
//!
//! ## Error selection
//! Every stage reports exactly one outcome. The runner waits for all of them
//! and returns:
//! 1. the first error, by arrival, that did not merely echo another stage
//!    (see [`StreamError::is_cascade`](crate::StreamError::is_cascade));
//! 2. otherwise the first echo that signals a failure (`Upstream`,
//!    `Abandoned`);
//! 3. otherwise success. A stage failing only with
//!    [`StreamError::Disconnected`](crate::StreamError::Disconnected) was told
//!    to stop by a consumer that had read enough.
//!
//! ## Teardown
//! A stage owns its input reader. When the stage returns, or unwinds, the
//! reader is dropped and any producer blocked on it fails its send with
//! `Disconnected`; a failing stage can therefore never strand the stages in
//! front of it.

use crate::error::{StreamError, stream_error};
use crate::pipe::Pipe;
use crate::process::{self, Cat, Process};
use crate::reader::Reader;
use crate::writer::WriterBuilder;
use anyhow::{Result, anyhow};
use crossbeam_channel::bounded;
use std::fmt;

/// An ordered list of processes run as one.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Process>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Process>>) -> Self {
        Self { stages }
    }

    /// Append a stage.
    pub fn then(mut self, stage: impl Process + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromIterator<Box<dyn Process>> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Box<dyn Process>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Process for Pipeline {
    fn run(self: Box<Self>, input: Reader, output: WriterBuilder) -> Result<()> {
        let mut stages = self.stages;
        if stages.is_empty() {
            stages.push(Box::new(Cat));
        }
        let n = stages.len();

        let mut inputs: Vec<Reader> = Vec::with_capacity(n);
        let mut outputs: Vec<WriterBuilder> = Vec::with_capacity(n);
        inputs.push(input);
        for _ in 1..n {
            let (builder, reader) = Pipe::new().split();
            outputs.push(builder);
            inputs.push(reader);
        }
        outputs.push(output);

        let (tx, rx) = bounded(n);
        let mut selector = Selector::default();
        let mut handles = Vec::with_capacity(n);
        for (index, ((stage, input), output)) in stages.into_iter().zip(inputs).zip(outputs).enumerate() {
            match process::spawn(index, stage, input, output, tx.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => selector.offer(index, Err(anyhow!(e).context(format!("start stage {index}")))),
            }
        }
        drop(tx);

        for _ in 0..handles.len() {
            match rx.recv() {
                Ok((index, result)) => selector.offer(index, result),
                Err(_) => break,
            }
        }
        for handle in handles {
            // Outcomes are sent last thing, so these joins do not block long.
            if handle.join().is_err() {
                tracing::warn!("stage thread panicked after reporting");
            }
        }
        selector.finish()
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

#[derive(Default)]
struct Selector {
    primary: Option<anyhow::Error>,
    echo: Option<anyhow::Error>,
}

impl Selector {
    fn offer(&mut self, index: usize, result: Result<()>) {
        let Err(e) = result else {
            return;
        };
        match stream_error(&e) {
            Some(StreamError::Disconnected) => {
                tracing::debug!(stage = index, "stage stopped by its consumer");
            }
            Some(se) if se.is_cascade() => {
                if self.echo.is_none() {
                    self.echo = Some(e);
                }
            }
            _ => {
                if self.primary.is_none() {
                    tracing::debug!(stage = index, "pipeline failed: {e:#}");
                    self.primary = Some(e);
                }
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self.primary.or(self.echo) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
