//! In-place texture rebuilding.
//!
//! [`rebuild_texture`] rewrites a host [`Texture2d`] from a matched manifest
//! entry: identity fields first, then the whole mip chain is released and
//! rebuilt level by level, decompressing embedded Oodle payloads on demand.
//!
//! The routine runs inside the host's deserialization hot path and must
//! never take control flow away from it: every failure degrades per-level
//! with a log entry, nothing is retried, and no error is returned.

use letex_manifest::{ManifestLoader, TextureEntry, MAX_MIP_COUNT, NO_TFC_NAME};

use crate::texture::{OodleDecompressor, Texture2d, TextureMip, TypeToken};

/// Rebuild `texture`'s identity fields and mip chain from `entry`.
///
/// `entry` must have been resolved from `manifest`. An entry whose declared
/// mip count is outside `1..=13` leaves the texture untouched; a mismatch
/// against the texture's current mip count is only warned about.
pub fn rebuild_texture(
    texture: &mut Texture2d,
    manifest: &ManifestLoader,
    entry: TextureEntry<'_>,
    oodle: &dyn OodleDecompressor,
) {
    let mip_count = entry.mip_count();
    if mip_count < 1 || mip_count as usize > MAX_MIP_COUNT {
        tracing::warn!("rebuild_texture: aborting due to invalid mip count {}", mip_count);
        return;
    }

    if mip_count as usize != texture.mips.len() {
        // Idk how much this would break.
        tracing::warn!(
            "rebuild_texture: updating with different mip count ({} -> {}), not well-tested",
            texture.mips.len(),
            mip_count
        );
    }

    // Assuming the first mip is the largest so we can use its size.
    let first = manifest.mip(entry, 0);

    let tfc_name = manifest.tfc_name(entry);
    texture.tfc_guid = manifest.tfc_guid(entry);
    texture.tfc_name = (tfc_name != NO_TFC_NAME).then(|| tfc_name.to_string());
    texture.size_x = i32::from(first.entry.width);
    texture.size_y = i32::from(first.entry.height);
    texture.original_size_x = texture.size_x;
    texture.original_size_y = texture.size_y;
    texture.format = entry.format();
    texture.lod_bias = entry.lod_bias();
    texture.never_stream = entry.never_stream();
    texture.srgb = entry.srgb();

    let preserved = release_mips(texture);

    let count = mip_count as usize;
    let mut mips = Vec::with_capacity(count);
    for index in 0..count {
        mips.push(build_mip(manifest, entry, index, preserved, oodle));
    }
    texture.mips = mips;

    // Mark the whole rebuilt chain as resident.
    texture.mip_tail_base_idx = mip_count - 1;
}

/// Release the texture's existing mip records, preserving the first
/// type-identity token encountered for reuse on the new records.
///
/// The existing records may predate this subsystem and carry heterogeneous
/// tokens; disagreements are warned about but the first one still wins.
/// Owned payload buffers are freed by dropping the records.
fn release_mips(texture: &mut Texture2d) -> Option<TypeToken> {
    let mut preserved = None;

    for mip in &texture.mips {
        match (preserved, mip.type_token) {
            (None, token) => preserved = token,
            (Some(kept), Some(token)) if kept != token => {
                tracing::warn!(
                    "rebuild_texture: different type tokens encountered: {:?} != {:?}",
                    kept,
                    token
                );
            }
            _ => {}
        }
    }

    texture.mips.clear();
    preserved
}

fn build_mip(
    manifest: &ManifestLoader,
    entry: TextureEntry<'_>,
    index: usize,
    preserved: Option<TypeToken>,
    oodle: &dyn OodleDecompressor,
) -> TextureMip {
    let resolved = manifest.mip(entry, index);
    let record = resolved.entry;

    let mut flags = TextureMip::SINGLE_USE;
    if record.is_external() {
        flags |= TextureMip::EXTERNAL | TextureMip::OODLE_COMPRESSION;
    }

    let mut next = TextureMip {
        type_token: preserved,
        flags,
        element_count: record.uncompressed_size,
        compressed_offset: record.compressed_offset,
        compressed_size: record.compressed_size,
        data: None,
        needs_free: false,
        width: i32::from(record.width),
        height: i32::from(record.height),
    };

    if let Some(payload) = resolved.payload {
        // The payload now lives in process memory; the stored offset into
        // the manifest's internal layout no longer applies.
        next.compressed_offset = 0;

        if record.is_oodle_compressed() {
            let mut buffer = vec![0u8; record.uncompressed_size.max(0) as usize];
            if !oodle.decompress(payload, &mut buffer) {
                // Keep the possibly partially filled buffer; a garbage mip
                // beats losing control flow mid-deserialization.
                tracing::error!(
                    "rebuild_texture: failed to decompress mip {} of {} ({} -> {} bytes)",
                    index,
                    entry.full_path().unwrap_or_default(),
                    record.compressed_size,
                    record.uncompressed_size
                );
            }
            next.data = Some(buffer);
        } else {
            next.data = Some(payload.to_vec());
        }
        next.needs_free = true;
    }

    next
}
