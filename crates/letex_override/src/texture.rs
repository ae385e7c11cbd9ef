//! Host-side texture model and capabilities.
//!
//! [`Texture2d`] mirrors the engine-owned record the rebuild rewrites in
//! place: identity fields, per-mip records, and the resident-chain
//! bookkeeping the host reads after deserialization. The host's mip records
//! carry an opaque type-identity token ([`TypeToken`]) that the rebuild
//! preserves but never interprets.

use letex_manifest::TfcGuid;

/// Opaque type-identity token carried by the host's mip records.
///
/// The rebuild copies the first token it encounters onto every newly built
/// record and warns when pre-existing records disagree; the value itself is
/// never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeToken(pub u64);

/// One mip record of the host texture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureMip {
    /// Opaque type-identity token preserved from the replaced records.
    pub type_token: Option<TypeToken>,
    /// Engine mip flags, see the associated constants.
    pub flags: u32,
    /// Number of payload bytes once fully uncompressed.
    pub element_count: i32,
    /// Payload offset: absolute into the external cache for external mips,
    /// zero for in-process payloads.
    pub compressed_offset: i32,
    /// Payload size on disk.
    pub compressed_size: i32,
    /// In-process payload, owned by this record.
    pub data: Option<Vec<u8>>,
    /// Whether the host must free `data` when releasing this record.
    pub needs_free: bool,
    pub width: i32,
    pub height: i32,
}

impl TextureMip {
    /// Mip payload is stored in an external texture file cache.
    pub const EXTERNAL: u32 = 1 << 0;
    /// Purpose unknown, always set by the engine on rebuilt mips.
    pub const SINGLE_USE: u32 = 1 << 3;
    /// Mip payload is compressed with Oodle.
    pub const OODLE_COMPRESSION: u32 = 1 << 12;
}

/// The engine-owned texture record being rewritten.
///
/// `tfc_name` of `None` means the texture has no external cache and all of
/// its payload is in-process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Texture2d {
    pub tfc_guid: TfcGuid,
    pub tfc_name: Option<String>,
    pub size_x: i32,
    pub size_y: i32,
    pub original_size_x: i32,
    pub original_size_y: i32,
    /// Pixel format code.
    pub format: u32,
    /// Allows higher-than-LOD-level mips to show without package edits.
    pub lod_bias: i32,
    pub never_stream: bool,
    pub srgb: bool,
    /// The mip chain, largest level first.
    pub mips: Vec<TextureMip>,
    /// Index of the base level of the fully resident tail of the chain.
    pub mip_tail_base_idx: i32,
}

/// Externally supplied Oodle decompression capability.
///
/// `dst` is pre-sized to the expected uncompressed length; implementations
/// return whether decompression succeeded. This subsystem never implements
/// the codec itself.
pub trait OodleDecompressor {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> bool;
}

impl<F> OodleDecompressor for F
where
    F: Fn(&[u8], &mut [u8]) -> bool,
{
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> bool {
        self(src, dst)
    }
}
