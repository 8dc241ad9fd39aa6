//! Palette-index bit packing (§4.2): a fixed array of small non-negative
//! integers packed into 64-bit words at a chosen width, no entry straddling a
//! word boundary (the pre-1.16 layout; see §9's "Modern bit-packing" note).

use crate::error::Error;

/// `width = max(4, ceil(log2(palette_size)))`. A palette of size 0 or 1 still
/// uses width 4.
pub fn width_for_palette_len(palette_len: usize) -> u32 {
    let bits = if palette_len <= 1 {
        0
    } else {
        (usize::BITS - (palette_len - 1).leading_zeros()).max(1)
    };
    bits.max(4)
}

fn entries_per_word(width: u32) -> usize {
    (64 / width) as usize
}

/// Packs `entries` into 64-bit words at `width` bits per entry. Lowest-index
/// entry occupies the least significant bits of the first word; entries never
/// straddle a word boundary, so the last word in each group may be padded
/// with zero bits above the final entry.
///
/// Each word is built unsigned and then reinterpreted bit-for-bit as signed,
/// because the destination NBT type (LONG) is signed (§4.2 "Signed-word
/// quirk").
pub fn pack(entries: &[u32], width: u32) -> Result<Vec<i64>, Error> {
    let per_word = entries_per_word(width);
    let max = 1u64 << width;
    let mut words = Vec::with_capacity(entries.len().div_ceil(per_word).max(1));

    for chunk in entries.chunks(per_word) {
        let mut word: u64 = 0;
        for &value in chunk.iter().rev() {
            if u64::from(value) >= max {
                return Err(Error::OutOfRange {
                    value: u64::from(value),
                    width,
                });
            }
            word = (word << width) | u64::from(value);
        }
        words.push(word as i64);
    }
    Ok(words)
}

/// Decodes `count` entries of `width` bits each from `words`. The LONG
/// payload is treated as an unsigned bit pattern, the mirror of `pack`'s
/// signed reinterpretation.
pub fn unpack(words: &[i64], width: u32, count: usize) -> Result<Vec<u32>, Error> {
    let per_word = entries_per_word(width);
    let expected_words = count.div_ceil(per_word).max(1);
    // Tolerate exactly one extra trailing all-zero LONG (a known real-world
    // Anvil over-padding quirk), but never a shortfall: a word count below
    // what `count` entries require means the array was actually truncated.
    if words.len() != expected_words && words.len() != expected_words + 1 {
        return Err(Error::CorruptLength {
            expected: expected_words,
            found: words.len(),
            width,
        });
    }

    let mask = (1u64 << width) - 1;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let word = words[i / per_word] as u64;
        let shift = (i % per_word) as u32 * width;
        out.push(((word >> shift) & mask) as u32);
    }
    Ok(out)
}
