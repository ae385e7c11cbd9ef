//! Binary texture-override manifest (`.btp`) reader and writer.
//!
//! A manifest is the index file shipped inside a DLC-style override pack. It
//! maps fully-qualified texture paths to replacement mip chains whose payload
//! bytes live either embedded in the manifest itself or in an external
//! texture file cache (TFC) referenced through an indirection table.
//!
//! The on-disk format is little-endian with 1-byte packing:
//!
//! ```text
//! offset 0                ManifestHeader          (32 bytes)
//! offset 32               TextureEntry table      (texture_count * 796 bytes)
//! header.tfc_ref_offset   TfcReference table      (tfc_ref_count * 144 bytes)
//! anywhere after tables   embedded mip payloads
//! ```
//!
//! [`ManifestLoader`] mounts a manifest as a read-only memory map and hands
//! out [`TextureEntry`] views borrowed from it; the views cannot outlive the
//! loader. [`builder::ManifestBuilder`] produces manifest bytes for the
//! authoring side and for tests.

pub mod builder;
pub mod error;
pub mod format;
pub mod hash;
pub mod loader;

pub use error::{ManifestError, Result};
pub use format::{ManifestHeader, MipEntry, TextureEntry, TfcGuid, TfcReference};
pub use loader::{IdentityCheck, ManifestLoader, ResolvedMip};

/// Magic bytes at the start of every manifest.
pub const MAGIC: [u8; 6] = *b"LETEXM";

/// Last manifest format version this crate understands.
pub const LAST_VERSION: u16 = 1;

/// Directory-name prefix that marks an override source.
///
/// The prefix is stripped before the source identity is hashed into
/// [`ManifestHeader::target_hash`].
pub const SOURCE_NAME_PREFIX: &str = "DLC_MOD_";

/// Maximum number of mip records per texture entry.
pub const MAX_MIP_COUNT: usize = 13;

/// Maximum length of a texture full path, in UTF-16 units, NUL included.
pub const MAX_FULL_PATH_LEN: usize = 256;

/// Maximum length of a TFC name, in UTF-16 units, NUL included.
pub const MAX_TFC_NAME_LEN: usize = 64;

/// TFC name that marks an entry as having no external cache.
pub const NO_TFC_NAME: &str = "None";
