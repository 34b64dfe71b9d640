//! Concrete stream transformations.
//!
//! Every process here checks the keys it needs against its input header
//! before reading any record, and fails with a
//! [`SchemaError`](crate::SchemaError) without opening its output if one is
//! missing.

pub mod join;
pub mod json;
#[cfg(feature = "line-protocol")]
pub mod line_protocol;
pub mod select;
pub mod sort;
#[cfg(feature = "surrogate-keys")]
pub mod surrogate_keys;
pub mod uniquify;

use crate::error::SchemaError;
use crate::header::Header;
use anyhow::Result;

/// Fail with [`SchemaError::MissingKeys`] unless `header` has every key.
pub(crate) fn require_keys<S: AsRef<str>>(header: &Header, keys: &[S]) -> Result<()> {
    let missing = header.missing(keys);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingKeys(missing).into())
    }
}

/// Fail with [`SchemaError::KeyExists`] if `header` already has `key`.
pub(crate) fn require_absent(header: &Header, key: &str) -> Result<()> {
    if header.contains(key) {
        Err(SchemaError::KeyExists(key.to_string()).into())
    } else {
        Ok(())
    }
}
