//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is its own inverse: applying the same key twice restores the
//! original bytes.

/// Byte-by-byte XOR with `mask[i % 4]`.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// XOR in 4-byte words, then the unaligned tail.
///
/// Produces exactly the same bytes as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    // The tail starts on a multiple of 4, so it restarts at mask[0].
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}
