//! Fixed-layout manifest records.
//!
//! All records are little-endian with 1-byte packing. [`ManifestHeader`],
//! [`MipEntry`], [`TfcGuid`] and [`TfcReference`] are parsed into plain owned
//! structs; [`TextureEntry`] stays a borrowed view into the loader's mapped
//! memory because its 796 bytes are mostly a path buffer that only the index
//! build ever needs decoded.

use byteorder::{ByteOrder, LE};

use crate::{MAGIC, MAX_FULL_PATH_LEN, MAX_MIP_COUNT, MAX_TFC_NAME_LEN};

/// Size of [`ManifestHeader`] on disk.
pub const HEADER_SIZE: usize = 32;

/// Size of one [`TextureEntry`] record on disk.
pub const TEXTURE_ENTRY_SIZE: usize = 796;

/// Size of one [`MipEntry`] record on disk.
pub const MIP_ENTRY_SIZE: usize = 20;

/// Size of one [`TfcReference`] record on disk.
pub const TFC_REF_SIZE: usize = 144;

// TextureEntry field offsets.
const ENTRY_TFC_REF_INDEX: usize = MAX_FULL_PATH_LEN * 2;
const ENTRY_MIP_COUNT: usize = ENTRY_TFC_REF_INDEX + 4;
const ENTRY_MIPS: usize = ENTRY_MIP_COUNT + 4;
const ENTRY_FORMAT: usize = ENTRY_MIPS + MAX_MIP_COUNT * MIP_ENTRY_SIZE;
const ENTRY_LOD_BIAS: usize = ENTRY_FORMAT + 4;
const ENTRY_NEVER_STREAM: usize = ENTRY_LOD_BIAS + 4;
const ENTRY_SRGB: usize = ENTRY_NEVER_STREAM + 4;

/// Fixed 32-byte record at the start of every manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestHeader {
    /// Magic bytes, must equal [`MAGIC`].
    pub magic: [u8; 6],
    /// Manifest format version (not the mod version).
    pub version: u16,
    /// FNV-1 hash of the target name and the stripped pack folder name.
    pub target_hash: u32,
    /// Number of [`TextureEntry`] records immediately after this header.
    pub texture_count: u32,
    /// Absolute offset of the [`TfcReference`] table.
    pub tfc_ref_offset: u32,
    /// Number of [`TfcReference`] records in the table.
    pub tfc_ref_count: u32,
}

impl ManifestHeader {
    /// Parse the header from the start of a manifest. The caller must have
    /// checked that at least [`HEADER_SIZE`] bytes are available.
    pub(crate) fn parse(bytes: &[u8]) -> Self {
        Self {
            magic: bytes[0..6].try_into().unwrap(),
            version: LE::read_u16(&bytes[6..8]),
            target_hash: LE::read_u32(&bytes[8..12]),
            texture_count: LE::read_u32(&bytes[12..16]),
            tfc_ref_offset: LE::read_u32(&bytes[16..20]),
            tfc_ref_count: LE::read_u32(&bytes[20..24]),
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.target_hash.to_le_bytes());
        out.extend_from_slice(&self.texture_count.to_le_bytes());
        out.extend_from_slice(&self.tfc_ref_offset.to_le_bytes());
        out.extend_from_slice(&self.tfc_ref_count.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
    }

    /// Whether the magic bytes match [`MAGIC`].
    pub fn has_valid_magic(&self) -> bool {
        self.magic == MAGIC
    }
}

/// 128-bit texture file cache identifier, stored as four LE 32-bit groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TfcGuid {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl TfcGuid {
    pub(crate) fn parse(bytes: &[u8]) -> Self {
        Self {
            a: LE::read_i32(&bytes[0..4]),
            b: LE::read_i32(&bytes[4..8]),
            c: LE::read_i32(&bytes[8..12]),
            d: LE::read_i32(&bytes[12..16]),
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.a.to_le_bytes());
        out.extend_from_slice(&self.b.to_le_bytes());
        out.extend_from_slice(&self.c.to_le_bytes());
        out.extend_from_slice(&self.d.to_le_bytes());
    }
}

/// One record of the TFC indirection table.
///
/// Texture entries reference these by index; the name identifies the external
/// payload cache file next to the manifest. The name
/// [`NO_TFC_NAME`](crate::NO_TFC_NAME) marks package-stored entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfcReference {
    pub guid: TfcGuid,
    pub name: String,
}

impl TfcReference {
    /// Parse one reference record. Returns `None` when the name buffer is not
    /// NUL-terminated or holds invalid UTF-16.
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let guid = TfcGuid::parse(&bytes[0..16]);
        let name = decode_utf16z(&bytes[16..16 + MAX_TFC_NAME_LEN * 2])?;
        Some(Self { guid, name })
    }
}

/// Per-level mip record.
///
/// The meaning of `compressed_offset` depends on storage mode: for embedded
/// payloads it is an offset into the manifest file, for external mips it is
/// an absolute offset into the referenced texture file cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MipEntry {
    /// Bytes this mip occupies when fully uncompressed.
    pub uncompressed_size: i32,
    /// Bytes this mip currently occupies on disk.
    pub compressed_size: i32,
    /// Offset to this mip's payload; interpretation depends on flags.
    pub compressed_offset: i32,
    pub width: i16,
    pub height: i16,
    pub flags: u32,
}

impl MipEntry {
    /// Mip must not be modified during a rebuild.
    pub const ORIGINAL: u32 = 1 << 1;
    /// Mip payload lives in a texture file cache.
    pub const EXTERNAL: u32 = 1 << 2;
    /// Mip payload is stored with Oodle compression.
    pub const OODLE_COMPRESSED: u32 = 1 << 3;

    /// Sentinel for the offset/size fields of an intentionally blank mip.
    pub const EMPTY_SENTINEL: i32 = -1;

    pub(crate) fn parse(bytes: &[u8]) -> Self {
        Self {
            uncompressed_size: LE::read_i32(&bytes[0..4]),
            compressed_size: LE::read_i32(&bytes[4..8]),
            compressed_offset: LE::read_i32(&bytes[8..12]),
            width: LE::read_i16(&bytes[12..14]),
            height: LE::read_i16(&bytes[14..16]),
            flags: LE::read_u32(&bytes[16..20]),
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.compressed_offset.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
    }

    pub fn is_original(&self) -> bool {
        self.flags & Self::ORIGINAL != 0
    }

    pub fn is_external(&self) -> bool {
        self.flags & Self::EXTERNAL != 0
    }

    pub fn is_oodle_compressed(&self) -> bool {
        self.flags & Self::OODLE_COMPRESSED != 0
    }

    /// Whether this mip is intentionally blank: zero size and sentinel
    /// offset/size values, and not external.
    pub fn is_empty(&self) -> bool {
        !self.is_external()
            && self.uncompressed_size == 0
            && self.compressed_size == Self::EMPTY_SENTINEL
            && self.compressed_offset == Self::EMPTY_SENTINEL
    }

    /// Whether this mip should carry an embedded payload inside the manifest.
    pub fn should_have_payload(&self) -> bool {
        !self.is_empty() && !self.is_original() && !self.is_external()
    }

    pub fn dimensions(&self) -> (i16, i16) {
        (self.width, self.height)
    }
}

/// Borrowed view over one 796-byte texture entry record.
///
/// Views are handed out by [`ManifestLoader`](crate::ManifestLoader) and
/// borrow from its mapped memory; they cannot outlive the loader.
#[derive(Debug, Clone, Copy)]
pub struct TextureEntry<'a> {
    bytes: &'a [u8],
}

impl<'a> TextureEntry<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        assert_eq!(bytes.len(), TEXTURE_ENTRY_SIZE, "mis-sized texture entry view");
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode the matched texture's full path.
    ///
    /// Returns `None` when the fixed buffer is not NUL-terminated or holds
    /// invalid UTF-16; such entries are dropped during index construction.
    pub fn full_path(&self) -> Option<String> {
        decode_utf16z(&self.bytes[..MAX_FULL_PATH_LEN * 2])
    }

    /// Index into the TFC reference table.
    pub fn tfc_ref_index(&self) -> i32 {
        LE::read_i32(&self.bytes[ENTRY_TFC_REF_INDEX..])
    }

    /// Declared number of mip records, expected within `1..=13` but not
    /// trusted until the rebuild validates it.
    pub fn mip_count(&self) -> i32 {
        LE::read_i32(&self.bytes[ENTRY_MIP_COUNT..])
    }

    /// Read the mip record at `index`.
    ///
    /// `index` must be below [`MAX_MIP_COUNT`]; callers iterate up to
    /// [`mip_count`](Self::mip_count), which the rebuild clamps first.
    pub fn mip(&self, index: usize) -> MipEntry {
        assert!(index < MAX_MIP_COUNT, "mip index ({index}) out of format bounds ({MAX_MIP_COUNT})");
        let start = ENTRY_MIPS + index * MIP_ENTRY_SIZE;
        MipEntry::parse(&self.bytes[start..start + MIP_ENTRY_SIZE])
    }

    /// Pixel format code shared by all mips of this entry.
    pub fn format(&self) -> u32 {
        LE::read_u32(&self.bytes[ENTRY_FORMAT..])
    }

    /// LOD bias carried over from the replacement texture package.
    pub fn lod_bias(&self) -> i32 {
        LE::read_i32(&self.bytes[ENTRY_LOD_BIAS..])
    }

    /// Whether the replacement texture opts out of streaming.
    pub fn never_stream(&self) -> bool {
        LE::read_i32(&self.bytes[ENTRY_NEVER_STREAM..]) != 0
    }

    /// Colour-space flag carried over from the replacement texture package.
    pub fn srgb(&self) -> bool {
        LE::read_i32(&self.bytes[ENTRY_SRGB..]) != 0
    }
}

/// Names for the pixel format codes understood by the engine.
const PIXEL_FORMAT_NAMES: [&str; 54] = [
    "PF_Unknown",
    "PF_A32B32G32R32F",
    "PF_A8R8G8B8",
    "PF_G8",
    "PF_G16",
    "PF_DXT1",
    "PF_DXT3",
    "PF_DXT5",
    "PF_UYVY",
    "PF_FloatRGB",
    "PF_FloatRGBA",
    "PF_DepthStencil",
    "PF_ShadowDepth",
    "PF_FilteredShadowDepth",
    "PF_R32F",
    "PF_G16R16",
    "PF_G16R16F",
    "PF_G16R16F_FILTER",
    "PF_G32R32F",
    "PF_A2B10G10R10",
    "PF_A16B16G16R16_UNORM",
    "PF_D24",
    "PF_R16F",
    "PF_R16F_FILTER",
    "PF_BC5",
    "PF_V8U8",
    "PF_A1",
    "PF_NormalMap_LQ",
    "PF_NormalMap_HQ",
    "PF_A16B16G16R16_FLOAT",
    "PF_A16B16G16R16_SNORM",
    "PF_FloatR11G11B10",
    "PF_A4R4G4B4",
    "PF_R5G6B5",
    "PF_G8R8",
    "PF_R8_UNORM",
    "PF_R8_UINT",
    "PF_R8_SINT",
    "PF_R16_FLOAT",
    "PF_R16_UNORM",
    "PF_R16_UINT",
    "PF_R16_SINT",
    "PF_R8G8_UNORM",
    "PF_R8G8_UINT",
    "PF_R8G8_SINT",
    "PF_R16G16_FLOAT",
    "PF_R16G16_UNORM",
    "PF_R16G16_UINT",
    "PF_R16G16_SINT",
    "PF_R32_FLOAT",
    "PF_R32_UINT",
    "PF_R32_SINT",
    "PF_A8",
    "PF_BC7",
];

/// Look up the engine name for a pixel format code, if the code is known.
pub fn pixel_format_name(code: u32) -> Option<&'static str> {
    PIXEL_FORMAT_NAMES.get(code as usize).copied()
}

/// Decode a fixed UTF-16LE buffer up to its first NUL unit.
///
/// Returns `None` when no NUL terminator exists within the buffer or the
/// units are not valid UTF-16.
fn decode_utf16z(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::new();
    let mut terminated = false;

    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        if unit == 0 {
            terminated = true;
            break;
        }
        units.push(unit);
    }

    if !terminated {
        return None;
    }

    String::from_utf16(&units).ok()
}

/// Encode a string as a fixed-size NUL-terminated UTF-16LE buffer of
/// `capacity` units. Returns `None` when the string does not fit.
pub(crate) fn encode_utf16z(text: &str, capacity: usize) -> Option<Vec<u8>> {
    let units: Vec<u16> = text.encode_utf16().collect();
    if units.len() + 1 > capacity {
        return None;
    }

    let mut out = Vec::with_capacity(capacity * 2);
    for unit in &units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.resize(capacity * 2, 0);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = ManifestHeader {
            magic: MAGIC,
            version: 1,
            target_hash: 0xdead_beef,
            texture_count: 3,
            tfc_ref_offset: 0x100,
            tfc_ref_count: 2,
        };

        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(ManifestHeader::parse(&bytes), header);
    }

    #[test]
    fn mip_entry_round_trip() {
        let mip = MipEntry {
            uncompressed_size: 4096,
            compressed_size: 1024,
            compressed_offset: 0x2000,
            width: 64,
            height: 32,
            flags: MipEntry::OODLE_COMPRESSED,
        };

        let mut bytes = Vec::new();
        mip.write_to(&mut bytes);
        assert_eq!(bytes.len(), MIP_ENTRY_SIZE);
        assert_eq!(MipEntry::parse(&bytes), mip);
    }

    #[test]
    fn empty_mip_detection() {
        let empty = MipEntry {
            uncompressed_size: 0,
            compressed_size: MipEntry::EMPTY_SENTINEL,
            compressed_offset: MipEntry::EMPTY_SENTINEL,
            width: 1,
            height: 1,
            flags: 0,
        };
        assert!(empty.is_empty());
        assert!(!empty.should_have_payload());

        // Same sentinels but external: not empty, payload lives in a cache.
        let external = MipEntry { flags: MipEntry::EXTERNAL, ..empty };
        assert!(!external.is_empty());
        assert!(!external.should_have_payload());
    }

    #[test]
    fn payload_presence_rule() {
        let embedded = MipEntry {
            uncompressed_size: 16,
            compressed_size: 16,
            compressed_offset: 0x40,
            width: 2,
            height: 2,
            flags: 0,
        };
        assert!(embedded.should_have_payload());

        let original = MipEntry { flags: MipEntry::ORIGINAL, ..embedded };
        assert!(!original.should_have_payload());
    }

    #[test]
    fn utf16z_requires_terminator() {
        let unterminated = encode_utf16z("abc", 3);
        assert!(unterminated.is_none());

        let exact = encode_utf16z("abc", 4).unwrap();
        assert_eq!(decode_utf16z(&exact).as_deref(), Some("abc"));
    }

    #[test]
    fn utf16z_rejects_lone_surrogate() {
        let mut bytes = vec![0x01, 0xd8]; // lone high surrogate
        bytes.extend_from_slice(&[0, 0]);
        assert!(decode_utf16z(&bytes).is_none());
    }

    #[test]
    fn pixel_format_lookup() {
        assert_eq!(pixel_format_name(5), Some("PF_DXT1"));
        assert_eq!(pixel_format_name(53), Some("PF_BC7"));
        assert_eq!(pixel_format_name(54), None);
    }
}
