//! Helpers for testing processes against in-memory CSV.
//!
//! ```
//! use keyed_csv::processes::select::Select;
//! use keyed_csv::testing::run_to_string;
//!
//! # fn main() -> anyhow::Result<()> {
//! let out = run_to_string(Select::new(["b"]), "a,b\n1,2\n")?;
//! assert_eq!(out, "b\n2\n");
//! # Ok(())
//! # }
//! ```

use crate::config::Dialect;
use crate::process::Process;
use crate::reader::Reader;
use crate::record::Record;
use crate::writer;
use anyhow::Result;
use std::io::{self, Cursor, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// A cloneable in-memory byte sink; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A reader over `text` in the default dialect.
pub fn reader_from_str(text: &str) -> Reader {
    Reader::from_io(Cursor::new(text.to_string()), &Dialect::default())
}

/// Every record of `text`.
///
/// # Errors
/// Returns the stream's decode error, if any.
pub fn records_from_str(text: &str) -> Result<Vec<Record>> {
    Ok(reader_from_str(text).read_all()?)
}

/// Write `text` to a file called `name` in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn temp_file(name: &str, text: &str) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    std::fs::write(&path, text)?;
    Ok((dir, path))
}

/// Run `process` over `input` and return what it wrote.
///
/// # Errors
/// Returns the process's error.
pub fn run_to_string<P: Process + 'static>(process: P, input: &str) -> Result<String> {
    let out = SharedBuffer::new();
    Box::new(process).run(reader_from_str(input), writer::to_io(out.clone(), &Dialect::default()))?;
    Ok(out.contents())
}
