//! Texture-override application for the Legendary Edition games.
//!
//! This crate sits on top of [`letex_manifest`] and covers everything
//! between "a game has a DLC folder" and "a host texture has been rewritten
//! from an override pack":
//!
//! - [`mount`] reads per-source mount priorities, per game target.
//! - [`registry`] discovers `DLC_MOD_*` sources, mounts their manifests and
//!   answers priority-ordered lookups.
//! - [`texture`] models the engine-owned texture record and the externally
//!   supplied Oodle decompression capability.
//! - [`rebuild`] rewrites a texture in place from a matched manifest entry.
//!
//! The intended call pattern is one [`ManifestRegistry::discover`] at
//! startup followed by [`ManifestRegistry::apply_to`] from the host's
//! texture deserialization hook.

pub mod error;
pub mod mount;
pub mod rebuild;
pub mod registry;
pub mod texture;

pub use error::{Error, Result};
pub use mount::{read_mount_priority, GameTarget};
pub use rebuild::rebuild_texture;
pub use registry::{LoadedSource, ManifestRegistry, OverrideStats};
pub use texture::{OodleDecompressor, Texture2d, TextureMip, TypeToken};

/// File name of the override manifest inside a source directory.
pub const MANIFEST_FILE_NAME: &str = "CombinedTextureOverrides.btp";
