//! Error types for override-source discovery and mounting.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while discovering and mounting override sources.
///
/// All of these are recoverable at the source level: the registry logs the
/// error and skips the offending pack. A source whose mount priority cannot
/// be determined is never loaded.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (enumerating sources, reading descriptors).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source's manifest failed to load.
    #[error("manifest error: {0}")]
    Manifest(#[from] letex_manifest::ManifestError),

    /// A text mount descriptor has no `ModMount = <int>` line.
    #[error("failed to find ModMount line in {0}")]
    MountLineMissing(Utf8PathBuf),

    /// A text mount descriptor declares a negative priority.
    #[error("found negative ModMount value in {path}: {value}")]
    NegativeMountPriority { path: Utf8PathBuf, value: i32 },

    /// A binary mount descriptor is shorter than its fixed record.
    #[error("failed to read {expected} byte(s) of mount file {path}, got {actual}")]
    MountRecordTooShort { path: Utf8PathBuf, expected: usize, actual: usize },
}
