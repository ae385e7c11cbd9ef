//! Manifest mounting and entry lookup.
//!
//! [`ManifestLoader::load`] maps a manifest file read-only, validates the
//! header and both tables against the file bounds, and builds a path index
//! over every texture entry. Lookups return [`TextureEntry`] views borrowed
//! from the mapped memory; they are valid only while the loader lives.
//!
//! A manifest that fails any validation step is simply not mounted — the
//! caller logs the error and continues with the other override sources.

use std::collections::HashMap;
use std::fs::File;

use camino::Utf8Path;
use memmap2::Mmap;

use crate::error::{ManifestError, Result};
use crate::format::{
    pixel_format_name, ManifestHeader, MipEntry, TextureEntry, TfcGuid, TfcReference, HEADER_SIZE,
    TEXTURE_ENTRY_SIZE, TFC_REF_SIZE,
};
use crate::hash::target_hash;
use crate::{LAST_VERSION, MAX_MIP_COUNT, NO_TFC_NAME, SOURCE_NAME_PREFIX};

/// How a mismatch between the stored and computed target hash is treated.
///
/// The check catches manifests built for one pack folder being copied into
/// another. Authoring setups run [`Relaxed`](IdentityCheck::Relaxed) so a
/// renamed work-in-progress folder still loads; shipping builds run
/// [`Strict`](IdentityCheck::Strict) and refuse the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCheck {
    Strict,
    Relaxed,
}

/// A mip record resolved against the loader's mapped view.
///
/// `payload` is present exactly when the mip should carry an embedded
/// payload; external, original and empty mips resolve without one.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMip<'a> {
    pub entry: MipEntry,
    pub payload: Option<&'a [u8]>,
}

/// A loaded override manifest: one read-only memory map plus a path index.
///
/// All [`TextureEntry`] views and payload slices handed out borrow from the
/// map and are invalidated when the loader is dropped.
pub struct ManifestLoader {
    map: Mmap,
    header: ManifestHeader,
    tfc_refs: Vec<TfcReference>,
    /// Full path -> entry ordinal in the entry table. First-seen wins on
    /// duplicate paths.
    index: HashMap<String, usize>,
}

impl ManifestLoader {
    /// Load and validate a manifest file.
    ///
    /// `target` is the game target salt (e.g. `"LE1"`); `source_identity` is
    /// the override-source folder name with the
    /// [`SOURCE_NAME_PREFIX`] already stripped.
    pub fn load(
        path: &Utf8Path,
        target: &str,
        source_identity: &str,
        identity_check: IdentityCheck,
    ) -> Result<Self> {
        assert!(!source_identity.is_empty(), "empty source identity");
        assert!(
            !source_identity.starts_with(SOURCE_NAME_PREFIX),
            "source identity must have the {SOURCE_NAME_PREFIX} prefix stripped"
        );

        let file = File::open(path.as_std_path())?;
        // The map is never written through and the loader keeps it private;
        // concurrent truncation of a pack file mid-load is outside the
        // supported environment.
        let map = unsafe { Mmap::map(&file)? };

        let size = map.len() as u64;
        if (map.len()) < HEADER_SIZE {
            return Err(ManifestError::FileTooSmall { size, header: HEADER_SIZE });
        }

        let header = ManifestHeader::parse(&map);
        if !header.has_valid_magic() {
            return Err(ManifestError::InvalidMagic(header.magic));
        }
        if header.version > LAST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: header.version,
                last: LAST_VERSION,
            });
        }

        let expected = target_hash(target, source_identity);
        if header.target_hash != expected {
            match identity_check {
                IdentityCheck::Strict => {
                    return Err(ManifestError::TargetHashMismatch {
                        found: header.target_hash,
                        expected,
                    });
                }
                IdentityCheck::Relaxed => {
                    tracing::warn!(
                        "{}: mismatched serialized target hash {:#010x}, expected {:#010x}",
                        path,
                        header.target_hash,
                        expected
                    );
                }
            }
        }

        // TFC reference table bounds.
        let tfc_start = u64::from(header.tfc_ref_offset);
        let tfc_end = tfc_start + u64::from(header.tfc_ref_count) * TFC_REF_SIZE as u64;
        if tfc_end > size {
            return Err(ManifestError::TableOutOfBounds { table: "tfc reference", end: tfc_end, size });
        }
        if tfc_start % 4 != 0 || tfc_end % 4 != 0 {
            return Err(ManifestError::TableMisaligned {
                table: "tfc reference",
                start: tfc_start,
                end: tfc_end,
            });
        }

        // Texture entry table bounds, immediately after the header.
        let entry_start = HEADER_SIZE as u64;
        let entry_end = entry_start + u64::from(header.texture_count) * TEXTURE_ENTRY_SIZE as u64;
        if entry_end > size {
            return Err(ManifestError::TableOutOfBounds { table: "texture entry", end: entry_end, size });
        }
        if entry_start % 4 != 0 || entry_end % 4 != 0 {
            return Err(ManifestError::TableMisaligned {
                table: "texture entry",
                start: entry_start,
                end: entry_end,
            });
        }

        let mut tfc_refs = Vec::with_capacity(header.tfc_ref_count as usize);
        for i in 0..header.tfc_ref_count as usize {
            let start = tfc_start as usize + i * TFC_REF_SIZE;
            let reference = TfcReference::parse(&map[start..start + TFC_REF_SIZE])
                .ok_or(ManifestError::InvalidTfcName { index: i })?;
            tfc_refs.push(reference);
        }

        let mut loader = Self { map, header, tfc_refs, index: HashMap::new() };
        loader.build_index(path);
        Ok(loader)
    }

    /// Iterate every texture entry and index it by path.
    ///
    /// Entries with an undecodable or empty path, a TFC reference index
    /// outside the table, or an embedded mip whose payload range falls
    /// outside the file are dropped with a warning. Later duplicates of an
    /// already-indexed path are warned about and ignored (first-seen wins).
    fn build_index(&mut self, path: &Utf8Path) {
        let count = self.header.texture_count as usize;
        let mut index = HashMap::with_capacity(count);

        for ordinal in 0..count {
            let entry = self.entry_at(ordinal);

            let Some(full_path) = entry.full_path().filter(|p| !p.is_empty()) else {
                tracing::warn!("{}: entry {} has an invalid full path, dropped", path, ordinal);
                continue;
            };

            let tfc_ref_index = entry.tfc_ref_index();
            if tfc_ref_index < 0 || tfc_ref_index as usize >= self.tfc_refs.len() {
                tracing::warn!(
                    "{}: entry {} has tfc reference index {} out of bounds ({}), dropped",
                    path,
                    full_path,
                    tfc_ref_index,
                    self.tfc_refs.len()
                );
                continue;
            }

            if let Some(index) = self.bad_payload_range(entry) {
                let mip = entry.mip(index);
                tracing::warn!(
                    "{}: entry {} mip {} payload range {}+{} outside file bounds ({}), dropped",
                    path,
                    full_path,
                    index,
                    mip.compressed_offset,
                    mip.compressed_size,
                    self.map.len()
                );
                continue;
            }

            if pixel_format_name(entry.format()).is_none() {
                tracing::warn!("{}: entry {} has unknown pixel format code {}", path, full_path, entry.format());
            }

            let tfc_name = &self.tfc_refs[tfc_ref_index as usize].name;
            if tfc_name == NO_TFC_NAME {
                tracing::trace!("adding manifest entry {} with {} mip(s) (package stored)", full_path, entry.mip_count());
            } else {
                tracing::trace!(
                    "adding manifest entry {} with {} mip(s) in texture file cache '{}'",
                    full_path,
                    entry.mip_count(),
                    tfc_name
                );
            }

            if let Some(&kept) = index.get(&full_path) {
                tracing::warn!(
                    "{}: manifest entry {} was not unique, keeping entry {} and ignoring entry {}",
                    path,
                    full_path,
                    kept,
                    ordinal
                );
                continue;
            }
            index.insert(full_path, ordinal);
        }

        self.index = index;
    }

    /// Find the first declared mip of `entry` whose embedded payload range
    /// does not fit the mapped file, if any.
    ///
    /// Run during the index build so a corrupt manifest is rejected at load
    /// time instead of tripping the resolution asserts mid-rebuild. The
    /// declared count is clamped to the format bounds here; the rebuild
    /// still validates it for its own purposes.
    fn bad_payload_range(&self, entry: TextureEntry<'_>) -> Option<usize> {
        let declared = entry.mip_count().clamp(0, MAX_MIP_COUNT as i32) as usize;
        (0..declared).find(|&index| {
            let mip = entry.mip(index);
            mip.should_have_payload()
                && (mip.compressed_offset < 0
                    || mip.compressed_size < 0
                    || mip.compressed_offset as u64 + mip.compressed_size as u64
                        > self.map.len() as u64)
        })
    }

    /// The validated manifest header.
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// The whole mapped view of the manifest file.
    pub fn view(&self) -> &[u8] {
        &self.map
    }

    /// The parsed TFC indirection table.
    pub fn tfc_refs(&self) -> &[TfcReference] {
        &self.tfc_refs
    }

    /// Number of indexed texture entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a texture override entry by its full path.
    pub fn find_entry(&self, full_path: &str) -> Option<TextureEntry<'_>> {
        self.index.get(full_path).map(|&ordinal| self.entry_at(ordinal))
    }

    /// Resolve one mip record of `entry` against the mapped view.
    ///
    /// `entry` must have been handed out by this loader and `index` must be
    /// below `entry.mip_count()`; both are programmer errors otherwise. The
    /// payload range of an embedded mip is bounds-checked against the view
    /// and a violation panics — indexed entries had their ranges validated
    /// at load time, so the assert only backstops misuse.
    pub fn mip<'s>(&'s self, entry: TextureEntry<'_>, index: usize) -> ResolvedMip<'s> {
        assert!(self.owns(entry), "mismatched entry provenance");
        assert!(
            (index as i64) < i64::from(entry.mip_count()),
            "mip index ({}) out of bounds ({})",
            index,
            entry.mip_count()
        );

        let mip = entry.mip(index);
        let payload = mip.should_have_payload().then(|| {
            assert!(mip.compressed_offset >= 0 && mip.compressed_size >= 0, "negative mip payload range");
            let start = mip.compressed_offset as usize;
            let end = start + mip.compressed_size as usize;
            assert!(end <= self.map.len(), "mip payload range {start}..{end} out of view bounds ({})", self.map.len());
            &self.map[start..end]
        });

        ResolvedMip { entry: mip, payload }
    }

    /// The TFC guid referenced by `entry`.
    ///
    /// The reference index was validated during the index build; `entry`
    /// must have been handed out by this loader.
    pub fn tfc_guid(&self, entry: TextureEntry<'_>) -> TfcGuid {
        assert!(self.owns(entry), "mismatched entry provenance");
        self.tfc_refs[entry.tfc_ref_index() as usize].guid
    }

    /// The TFC name referenced by `entry`; [`NO_TFC_NAME`] for
    /// package-stored entries.
    pub fn tfc_name(&self, entry: TextureEntry<'_>) -> &str {
        assert!(self.owns(entry), "mismatched entry provenance");
        &self.tfc_refs[entry.tfc_ref_index() as usize].name
    }

    fn entry_at(&self, ordinal: usize) -> TextureEntry<'_> {
        let start = HEADER_SIZE + ordinal * TEXTURE_ENTRY_SIZE;
        TextureEntry::new(&self.map[start..start + TEXTURE_ENTRY_SIZE])
    }

    /// Whether an entry view points into this loader's mapped memory.
    fn owns(&self, entry: TextureEntry<'_>) -> bool {
        let base = self.map.as_ptr() as usize;
        let pointer = entry.as_bytes().as_ptr() as usize;
        pointer >= base && pointer + TEXTURE_ENTRY_SIZE <= base + self.map.len()
    }
}

impl std::fmt::Debug for ManifestLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestLoader")
            .field("header", &self.header)
            .field("tfc_refs", &self.tfc_refs.len())
            .field("entries", &self.index.len())
            .finish()
    }
}
