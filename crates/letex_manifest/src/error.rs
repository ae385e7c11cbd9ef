//! Error types for manifest loading and building.
//!
//! Every error here is recoverable at the source level: a manifest that fails
//! to load is simply not mounted, and the caller moves on to the next
//! override pack. Misuse of borrowed entry views (foreign entries, indices
//! out of declared bounds) is a programmer error and panics instead.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors that can occur while loading or building a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Filesystem I/O failed (opening or mapping the manifest file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is shorter than the fixed manifest header.
    #[error("manifest file too small ({size}) for header ({header})")]
    FileTooSmall { size: u64, header: usize },

    /// The file does not start with the `LETEXM` magic.
    #[error("invalid manifest magic: {0:02x?}")]
    InvalidMagic([u8; 6]),

    /// The manifest was written by a newer format revision.
    #[error("unsupported manifest version {found}, last supported is {last}")]
    UnsupportedVersion { found: u16, last: u16 },

    /// The stored target hash does not match the hash computed for the
    /// source the manifest was found in. Usually means a manifest built for
    /// one pack folder was copied into another.
    #[error("mismatched serialized target hash {found:#010x}, expected {expected:#010x}")]
    TargetHashMismatch { found: u32, expected: u32 },

    /// A declared table extends past the end of the file.
    #[error("{table} table end ({end}) out of manifest file bounds ({size})")]
    TableOutOfBounds { table: &'static str, end: u64, size: u64 },

    /// A declared table is not 4-byte aligned.
    #[error("{table} table range {start}..{end} is not 4-byte aligned")]
    TableMisaligned { table: &'static str, start: u64, end: u64 },

    /// A TFC reference name buffer is unterminated or not valid UTF-16.
    #[error("tfc reference {index} has an invalid name")]
    InvalidTfcName { index: usize },

    /// Builder: a texture path does not fit the fixed entry buffer.
    #[error("texture path too long ({len} UTF-16 units, max {max}): {path}")]
    PathTooLong { path: String, len: usize, max: usize },

    /// Builder: a TFC name does not fit the fixed reference buffer.
    #[error("TFC name too long ({len} UTF-16 units, max {max}): {name}")]
    TfcNameTooLong { name: String, len: usize, max: usize },

    /// Builder: an entry declares more mips than the format allows.
    #[error("too many mips for entry {path}: {count}, max {max}")]
    TooManyMips { path: String, count: usize, max: usize },

    /// Builder: an entry references a TFC index that was never registered.
    #[error("entry {path} references missing TFC index {index}")]
    MissingTfcRef { path: String, index: i32 },
}
