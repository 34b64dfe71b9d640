//! File-level I/O helpers.

pub mod compression;
