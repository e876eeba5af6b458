//! Loading the byte store from a file or a stream.
//!
//! # Offsets
//! Seekable files jump straight to `offset`.  Streams (stdin, pipes) cannot
//! seek, so the leading bytes are read and discarded.  Either way the store
//! remembers `offset` as its base, and every offset shown to the user is
//! absolute within the input.
//!
//! # Size limit
//! At most `size_limit` bytes are kept; the rest of the input is never read.
//! The whole selection is held in memory, so the limit is what keeps a stray
//! `/dev/zero` from exhausting it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::store::ByteStore;

/// Default size limit: 1 GiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 1 << 30;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot skip to offset {wanted:#x}: input ends at {got:#x}")]
    Seek { wanted: u64, got: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("invalid size `{0}'")]
    Invalid(String),
    #[error("unknown size suffix `{suffix}' in `{input}'")]
    UnknownSuffix { input: String, suffix: String },
    #[error("size `{0}' is too large")]
    Overflow(String),
}

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Bytes to skip before the store starts.
    pub offset:     u64,
    /// Maximum number of bytes kept.
    pub size_limit: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { offset: 0, size_limit: DEFAULT_SIZE_LIMIT }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// Load from a stream, discarding the first `opts.offset` bytes.
pub fn load<R: Read>(mut reader: R, opts: LoadOptions) -> Result<ByteStore, LoadError> {
    if opts.offset > 0 {
        let skipped = io::copy(&mut reader.by_ref().take(opts.offset), &mut io::sink())?;
        if skipped < opts.offset {
            return Err(LoadError::Seek { wanted: opts.offset, got: skipped });
        }
    }
    read_limited(reader, opts)
}

/// Load from a file, seeking to `opts.offset`.
pub fn load_file(path: &Path, opts: LoadOptions) -> Result<ByteStore, LoadError> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    if opts.offset > file_len {
        return Err(LoadError::Seek { wanted: opts.offset, got: file_len });
    }
    file.seek(SeekFrom::Start(opts.offset))?;
    debug!(path = %path.display(), file_len, "opened input");
    read_limited(file, opts)
}

fn read_limited<R: Read>(reader: R, opts: LoadOptions) -> Result<ByteStore, LoadError> {
    let mut bytes = Vec::new();
    reader.take(opts.size_limit).read_to_end(&mut bytes)?;
    debug!(offset = opts.offset, loaded = bytes.len(), limit = opts.size_limit, "loaded bytes");
    Ok(ByteStore::new(bytes, opts.offset))
}

// ── Sizes ────────────────────────────────────────────────────────────────────

/// Parse a dd-style size: a number with an optional multiplier suffix.
///
/// The number is decimal, octal with a leading `0`, or hexadecimal with a
/// leading `0x`.  Suffixes: `c` (1), `w` (2), `b` (512), `K`/`KB`
/// (1024/1000), `M`/`MB` and `G`/`GB` likewise.
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let invalid = || SizeError::Invalid(input.to_owned());
    let s = input.trim();

    let (radix, body) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, hex)
    } else if s.len() > 1 && s.starts_with('0') && s[1..].starts_with(|c: char| c.is_ascii_digit()) {
        (8, &s[1..])
    } else {
        (10, s)
    };

    let digits = body.find(|c: char| !c.is_digit(radix)).unwrap_or(body.len());
    if digits == 0 {
        return Err(invalid());
    }
    let (number, suffix) = body.split_at(digits);
    let value = u64::from_str_radix(number, radix).map_err(|_| SizeError::Overflow(input.to_owned()))?;

    let multiplier: u64 = match suffix {
        ""   | "c" => 1,
        "w"        => 2,
        "b"        => 512,
        "K"        => 1 << 10,
        "KB"       => 1_000,
        "M"        => 1 << 20,
        "MB"       => 1_000_000,
        "G"        => 1 << 30,
        "GB"       => 1_000_000_000,
        other => {
            return Err(SizeError::UnknownSuffix {
                input:  input.to_owned(),
                suffix: other.to_owned(),
            })
        }
    };
    value.checked_mul(multiplier).ok_or_else(|| SizeError::Overflow(input.to_owned()))
}
