//! Target-identity hashing.
//!
//! The manifest header stores an FNV-1 hash of the game target name plus the
//! stripped pack folder name, so a manifest copied into the wrong folder can
//! be caught at load time. Characters are fed to the hash as UTF-16LE byte
//! pairs, matching how the pack authoring tools serialize the strings.

/// 32-bit FNV-1 (multiply, then xor) with per-byte input.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1(u32);

const FNV1_OFFSET: u32 = 0x811c_9dc5;
const FNV1_PRIME: u32 = 0x0100_0193;

impl Fnv1 {
    pub fn new() -> Self {
        Self(FNV1_OFFSET)
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.0 = self.0.wrapping_mul(FNV1_PRIME) ^ u32::from(byte);
    }

    /// Feed a string as UTF-16LE bytes, low byte first.
    pub fn write_utf16(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            let [lo, hi] = unit.to_le_bytes();
            self.write_byte(lo);
            self.write_byte(hi);
        }
    }

    pub fn finish(self) -> u32 {
        self.0
    }
}

impl Default for Fnv1 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the target hash for a manifest header.
///
/// `target` is the game target salt (e.g. `"LE1"`); `source_identity` is the
/// pack folder name with the [`SOURCE_NAME_PREFIX`](crate::SOURCE_NAME_PREFIX)
/// already stripped by the caller.
pub fn target_hash(target: &str, source_identity: &str) -> u32 {
    let mut hash = Fnv1::new();
    hash.write_utf16(target);
    hash.write_utf16(source_identity);
    hash.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1_empty_input_is_offset_basis() {
        assert_eq!(Fnv1::new().finish(), FNV1_OFFSET);
    }

    #[test]
    fn fnv1_single_byte() {
        let mut hash = Fnv1::new();
        hash.write_byte(0x61);
        assert_eq!(hash.finish(), FNV1_OFFSET.wrapping_mul(FNV1_PRIME) ^ 0x61);
    }

    #[test]
    fn utf16_feeds_both_bytes() {
        // 'Ā' is U+0100, exercising a non-zero high byte.
        let mut by_str = Fnv1::new();
        by_str.write_utf16("Ā");

        let mut by_bytes = Fnv1::new();
        by_bytes.write_byte(0x00);
        by_bytes.write_byte(0x01);

        assert_eq!(by_str.finish(), by_bytes.finish());
    }

    #[test]
    fn target_hash_is_order_dependent() {
        assert_ne!(target_hash("LE1", "Alpha"), target_hash("Alpha", "LE1"));
        assert_ne!(target_hash("LE1", "Alpha"), target_hash("LE1", "Beta"));
        assert_eq!(target_hash("LE1", "Alpha"), target_hash("LE1", "Alpha"));
    }
}
