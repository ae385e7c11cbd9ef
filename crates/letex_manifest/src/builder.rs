//! Manifest authoring.
//!
//! [`ManifestBuilder`] produces the binary manifest bytes consumed by
//! [`ManifestLoader`](crate::ManifestLoader). It is the backend for the pack
//! authoring tools and for this workspace's tests; the loader never depends
//! on it.

use crate::error::{ManifestError, Result};
use crate::format::{
    encode_utf16z, ManifestHeader, MipEntry, TfcGuid, TfcReference, HEADER_SIZE, MIP_ENTRY_SIZE,
    TEXTURE_ENTRY_SIZE, TFC_REF_SIZE,
};
use crate::hash::target_hash;
use crate::{LAST_VERSION, MAGIC, MAX_FULL_PATH_LEN, MAX_MIP_COUNT, MAX_TFC_NAME_LEN};

/// One mip level to serialize into a texture entry.
#[derive(Debug, Clone)]
pub enum MipDef {
    /// Intentionally blank level: sentinel sizes, no payload.
    Empty { width: i16, height: i16 },
    /// Level the rebuild must not touch.
    Original { width: i16, height: i16, uncompressed_size: i32 },
    /// Level whose payload lives in the entry's texture file cache at an
    /// absolute offset.
    External {
        width: i16,
        height: i16,
        uncompressed_size: i32,
        compressed_size: i32,
        cache_offset: i32,
    },
    /// Level whose payload is embedded in the manifest itself, optionally
    /// Oodle-compressed. The builder assigns the file offset.
    Embedded {
        width: i16,
        height: i16,
        uncompressed_size: i32,
        payload: Vec<u8>,
        oodle: bool,
    },
}

/// One texture entry to serialize.
#[derive(Debug, Clone)]
pub struct EntryDef {
    /// Full path of the texture being replaced.
    pub full_path: String,
    /// Index returned by [`ManifestBuilder::add_tfc_ref`].
    pub tfc_ref_index: i32,
    /// Pixel format code.
    pub format: u32,
    pub lod_bias: i32,
    pub never_stream: bool,
    pub srgb: bool,
    pub mips: Vec<MipDef>,
}

/// Serializes override entries into manifest bytes.
#[derive(Debug)]
pub struct ManifestBuilder {
    target: String,
    source_identity: String,
    tfc_refs: Vec<TfcReference>,
    entries: Vec<EntryDef>,
}

impl ManifestBuilder {
    /// Start a manifest for the given game target and stripped pack folder
    /// name; both feed the header's target hash.
    pub fn new(target: &str, source_identity: &str) -> Self {
        Self {
            target: target.to_string(),
            source_identity: source_identity.to_string(),
            tfc_refs: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Register a texture file cache reference, returning its table index
    /// for use in [`EntryDef::tfc_ref_index`].
    pub fn add_tfc_ref(&mut self, guid: TfcGuid, name: &str) -> i32 {
        self.tfc_refs.push(TfcReference { guid, name: name.to_string() });
        (self.tfc_refs.len() - 1) as i32
    }

    /// Queue a texture entry for serialization.
    pub fn add_entry(&mut self, entry: EntryDef) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Serialize the manifest.
    ///
    /// Layout: header, texture entry table, TFC reference table, then all
    /// embedded payloads. Both tables land 4-byte aligned because the record
    /// sizes are multiples of four.
    pub fn build(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let entries_end = HEADER_SIZE + self.entries.len() * TEXTURE_ENTRY_SIZE;
        let tfc_ref_offset = entries_end;
        let tfc_end = tfc_ref_offset + self.tfc_refs.len() * TFC_REF_SIZE;

        let header = ManifestHeader {
            magic: MAGIC,
            version: LAST_VERSION,
            target_hash: target_hash(&self.target, &self.source_identity),
            texture_count: self.entries.len() as u32,
            tfc_ref_offset: tfc_ref_offset as u32,
            tfc_ref_count: self.tfc_refs.len() as u32,
        };

        let mut out = Vec::with_capacity(tfc_end);
        header.write_to(&mut out);

        // Embedded payloads accumulate here and are appended after the
        // tables; mip records store their final file offsets.
        let mut payloads: Vec<u8> = Vec::new();

        for entry in &self.entries {
            self.write_entry(entry, tfc_end, &mut payloads, &mut out);
        }

        debug_assert_eq!(out.len(), tfc_ref_offset);
        for reference in &self.tfc_refs {
            reference.guid.write_to(&mut out);
            let name = encode_utf16z(&reference.name, MAX_TFC_NAME_LEN)
                .expect("validated tfc name length");
            out.extend_from_slice(&name);
        }

        debug_assert_eq!(out.len(), tfc_end);
        out.extend_from_slice(&payloads);
        Ok(out)
    }

    fn write_entry(&self, entry: &EntryDef, payload_base: usize, payloads: &mut Vec<u8>, out: &mut Vec<u8>) {
        let path = encode_utf16z(&entry.full_path, MAX_FULL_PATH_LEN).expect("validated path length");
        out.extend_from_slice(&path);
        out.extend_from_slice(&entry.tfc_ref_index.to_le_bytes());
        out.extend_from_slice(&(entry.mips.len() as i32).to_le_bytes());

        for mip in &entry.mips {
            let record = match *mip {
                MipDef::Empty { width, height } => MipEntry {
                    uncompressed_size: 0,
                    compressed_size: MipEntry::EMPTY_SENTINEL,
                    compressed_offset: MipEntry::EMPTY_SENTINEL,
                    width,
                    height,
                    flags: 0,
                },
                MipDef::Original { width, height, uncompressed_size } => MipEntry {
                    uncompressed_size,
                    compressed_size: 0,
                    compressed_offset: 0,
                    width,
                    height,
                    flags: MipEntry::ORIGINAL,
                },
                MipDef::External { width, height, uncompressed_size, compressed_size, cache_offset } => MipEntry {
                    uncompressed_size,
                    compressed_size,
                    compressed_offset: cache_offset,
                    width,
                    height,
                    flags: MipEntry::EXTERNAL,
                },
                MipDef::Embedded { width, height, uncompressed_size, ref payload, oodle } => {
                    let offset = payload_base + payloads.len();
                    payloads.extend_from_slice(payload);
                    MipEntry {
                        uncompressed_size,
                        compressed_size: payload.len() as i32,
                        compressed_offset: offset as i32,
                        width,
                        height,
                        flags: if oodle { MipEntry::OODLE_COMPRESSED } else { 0 },
                    }
                }
            };
            record.write_to(out);
        }

        // Pad the fixed mip array with zeroed records.
        for _ in entry.mips.len()..MAX_MIP_COUNT {
            out.extend_from_slice(&[0u8; MIP_ENTRY_SIZE]);
        }

        out.extend_from_slice(&entry.format.to_le_bytes());
        out.extend_from_slice(&entry.lod_bias.to_le_bytes());
        out.extend_from_slice(&i32::from(entry.never_stream).to_le_bytes());
        out.extend_from_slice(&i32::from(entry.srgb).to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        for reference in &self.tfc_refs {
            let len = reference.name.encode_utf16().count();
            if len + 1 > MAX_TFC_NAME_LEN {
                return Err(ManifestError::TfcNameTooLong {
                    name: reference.name.clone(),
                    len,
                    max: MAX_TFC_NAME_LEN,
                });
            }
        }

        for entry in &self.entries {
            let len = entry.full_path.encode_utf16().count();
            if len + 1 > MAX_FULL_PATH_LEN {
                return Err(ManifestError::PathTooLong {
                    path: entry.full_path.clone(),
                    len,
                    max: MAX_FULL_PATH_LEN,
                });
            }
            if entry.mips.len() > MAX_MIP_COUNT {
                return Err(ManifestError::TooManyMips {
                    path: entry.full_path.clone(),
                    count: entry.mips.len(),
                    max: MAX_MIP_COUNT,
                });
            }
            if entry.tfc_ref_index < 0 || entry.tfc_ref_index as usize >= self.tfc_refs.len() {
                return Err(ManifestError::MissingTfcRef {
                    path: entry.full_path.clone(),
                    index: entry.tfc_ref_index,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, tfc: i32, mips: Vec<MipDef>) -> EntryDef {
        EntryDef {
            full_path: path.to_string(),
            tfc_ref_index: tfc,
            format: 2,
            lod_bias: 0,
            never_stream: false,
            srgb: false,
            mips,
        }
    }

    #[test]
    fn layout_is_header_entries_tfc_payload() {
        let mut builder = ManifestBuilder::new("LE1", "Example");
        let tfc = builder.add_tfc_ref(TfcGuid::default(), "None");
        builder.add_entry(entry(
            "A.B",
            tfc,
            vec![MipDef::Embedded {
                width: 2,
                height: 2,
                uncompressed_size: 4,
                payload: vec![9, 8, 7, 6],
                oodle: false,
            }],
        ));

        let bytes = builder.build().unwrap();
        let tables_end = HEADER_SIZE + TEXTURE_ENTRY_SIZE + TFC_REF_SIZE;
        assert_eq!(bytes.len(), tables_end + 4);
        assert_eq!(&bytes[tables_end..], &[9, 8, 7, 6]);
        assert_eq!(&bytes[0..6], &MAGIC);
    }

    #[test]
    fn path_too_long_is_rejected() {
        let mut builder = ManifestBuilder::new("LE1", "Example");
        let tfc = builder.add_tfc_ref(TfcGuid::default(), "None");
        builder.add_entry(entry(&"x".repeat(MAX_FULL_PATH_LEN), tfc, vec![]));
        assert!(matches!(builder.build(), Err(ManifestError::PathTooLong { .. })));
    }

    #[test]
    fn tfc_name_too_long_is_rejected() {
        let mut builder = ManifestBuilder::new("LE1", "Example");
        builder.add_tfc_ref(TfcGuid::default(), &"x".repeat(MAX_TFC_NAME_LEN));
        assert!(matches!(builder.build(), Err(ManifestError::TfcNameTooLong { .. })));
    }

    #[test]
    fn too_many_mips_is_rejected() {
        let mut builder = ManifestBuilder::new("LE1", "Example");
        let tfc = builder.add_tfc_ref(TfcGuid::default(), "None");
        let mips = (0..MAX_MIP_COUNT + 1)
            .map(|_| MipDef::Empty { width: 1, height: 1 })
            .collect();
        builder.add_entry(entry("A.B", tfc, mips));
        assert!(matches!(builder.build(), Err(ManifestError::TooManyMips { .. })));
    }

    #[test]
    fn missing_tfc_ref_is_rejected() {
        let mut builder = ManifestBuilder::new("LE1", "Example");
        builder.add_entry(entry("A.B", 0, vec![]));
        assert!(matches!(builder.build(), Err(ManifestError::MissingTfcRef { .. })));
    }
}
