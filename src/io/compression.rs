//! Transparent compression for file-backed streams.
//!
//! Codecs are chosen by file extension, falling back to magic bytes when
//! reading. Each codec is behind its own feature flag:
//! - **Gzip** (`.gz`) - `compression-gzip`
//! - **Zstd** (`.zst`) - `compression-zstd`
//! - **Bzip2** (`.bz2`) - `compression-bzip2`
//! - **Xz** (`.xz`) - `compression-xz`
//!
//! ```no_run
//! use keyed_csv::io::compression::{auto_detect_reader, auto_detect_writer};
//! use std::fs::File;
//! use std::io::Write;
//! # fn main() -> anyhow::Result<()> {
//! let reader = auto_detect_reader(File::open("in.csv.gz")?, "in.csv.gz")?;
//! let mut sink = auto_detect_writer(File::create("out.csv.zst")?, "out.csv.zst")?;
//! sink.write_all(b"a,b\n")?;
//! sink.finish()?;
//! # drop(reader);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A supported compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
    #[cfg(feature = "compression-bzip2")]
    Bzip2,
    #[cfg(feature = "compression-xz")]
    Xz,
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ALL: &'static [Codec] = &[
        #[cfg(feature = "compression-gzip")]
        Codec::Gzip,
        #[cfg(feature = "compression-zstd")]
        Codec::Zstd,
        #[cfg(feature = "compression-bzip2")]
        Codec::Bzip2,
        #[cfg(feature = "compression-xz")]
        Codec::Xz,
    ];

    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => "gzip",
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => "zstd",
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => "bzip2",
            #[cfg(feature = "compression-xz")]
            Codec::Xz => "xz",
        }
    }

    /// Lowercase extensions, with the leading dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => &[".gz", ".gzip"],
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => &[".zst", ".zstd"],
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => &[".bz2", ".bzip2"],
            #[cfg(feature = "compression-xz")]
            Codec::Xz => &[".xz"],
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => &[0x1f, 0x8b],
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => b"BZh",
            #[cfg(feature = "compression-xz")]
            Codec::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    /// Case-insensitive match on the path's trailing extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Codec> {
        let lower = path.as_ref().to_string_lossy().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| lower.ends_with(ext)))
    }

    fn sniff<R: BufRead>(reader: &mut R) -> Option<Codec> {
        let head = reader.fill_buf().ok()?;
        Self::ALL.iter().copied().find(|c| head.starts_with(c.magic()))
    }

    #[allow(unused_variables)]
    fn decoder(self, source: BufReader<File>) -> io::Result<Box<dyn Read + Send>> {
        let decoder: Box<dyn Read + Send> = match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Box::new(flate2::read::MultiGzDecoder::new(source)),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(source)?),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(source)),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(source)),
        };
        Ok(decoder)
    }

    #[allow(unused_variables)]
    fn encoder(self, sink: BufWriter<File>) -> io::Result<Sink> {
        Ok(match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Sink::Gzip(flate2::write::GzEncoder::new(sink, flate2::Compression::default())),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Sink::Zstd(zstd::stream::write::Encoder::new(sink, 3)?),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Sink::Bzip2(bzip2::write::BzEncoder::new(sink, bzip2::Compression::default())),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Sink::Xz(xz2::write::XzEncoder::new(sink, 6)),
        })
    }
}

/// Wrap `file` with a decompressor when its name or leading bytes say so.
///
/// # Errors
/// Returns an error if the detected codec fails to initialise.
pub fn auto_detect_reader(file: File, path_hint: impl AsRef<Path>) -> Result<Box<dyn Read + Send>> {
    let mut source = BufReader::new(file);
    let codec = Codec::from_path(&path_hint).or_else(|| Codec::sniff(&mut source));
    match codec {
        Some(codec) => codec
            .decoder(source)
            .with_context(|| format!("wrap reader with {} codec", codec.name())),
        None => Ok(Box::new(source)),
    }
}

/// Wrap `file` with a compressor chosen by extension only.
///
/// # Errors
/// Returns an error if the detected codec fails to initialise.
pub fn auto_detect_writer(file: File, path_hint: impl AsRef<Path>) -> Result<Sink> {
    let sink = BufWriter::new(file);
    match Codec::from_path(&path_hint) {
        Some(codec) => codec
            .encoder(sink)
            .with_context(|| format!("wrap writer with {} codec", codec.name())),
        None => Ok(Sink::Plain(sink)),
    }
}

/// A file, possibly behind a compressor. Call [`Sink::finish`] to write the
/// trailer; dropping a compressed sink may leave a truncated file.
pub enum Sink {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
    #[cfg(feature = "compression-bzip2")]
    Bzip2(bzip2::write::BzEncoder<BufWriter<File>>),
    #[cfg(feature = "compression-xz")]
    Xz(xz2::write::XzEncoder<BufWriter<File>>),
}

impl Sink {
    fn inner(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w,
            #[cfg(feature = "compression-zstd")]
            Sink::Zstd(w) => w,
            #[cfg(feature = "compression-bzip2")]
            Sink::Bzip2(w) => w,
            #[cfg(feature = "compression-xz")]
            Sink::Xz(w) => w,
        }
    }

    /// Flush, write any compression trailer and sync the file buffer.
    ///
    /// # Errors
    /// Returns the first I/O error hit while finishing.
    pub fn finish(self) -> io::Result<()> {
        let mut file = match self {
            Sink::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.finish()?,
            #[cfg(feature = "compression-zstd")]
            Sink::Zstd(w) => w.finish()?,
            #[cfg(feature = "compression-bzip2")]
            Sink::Bzip2(w) => w.finish()?,
            #[cfg(feature = "compression-xz")]
            Sink::Xz(w) => w.finish()?,
        };
        file.flush()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(name: &str) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        let mut sink = auto_detect_writer(File::create(&path)?, &path)?;
        sink.write_all(b"a,b\n1,2\n")?;
        sink.finish()?;
        let mut text = String::new();
        auto_detect_reader(File::open(&path)?, &path)?.read_to_string(&mut text)?;
        Ok(text)
    }

    #[test]
    fn plain_files_pass_through() -> Result<()> {
        assert_eq!(round_trip("plain.csv")?, "a,b\n1,2\n");
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_by_extension() -> Result<()> {
        assert_eq!(Codec::from_path("X.CSV.GZ"), Some(Codec::Gzip));
        assert_eq!(round_trip("data.csv.gz")?, "a,b\n1,2\n");
        Ok(())
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn zstd_by_magic_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let packed = dir.path().join("data.csv.zst");
        let mut sink = auto_detect_writer(File::create(&packed)?, &packed)?;
        sink.write_all(b"x\n7\n")?;
        sink.finish()?;
        let renamed = dir.path().join("data.bin");
        std::fs::rename(&packed, &renamed)?;
        let mut text = String::new();
        auto_detect_reader(File::open(&renamed)?, &renamed)?.read_to_string(&mut text)?;
        assert_eq!(text, "x\n7\n");
        Ok(())
    }
}
