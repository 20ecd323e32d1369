//! Bit-level packing primitives.
//!
//! Everything above this module works in terms of 64-bit words. `BitWriter`
//! packs integers LSB-first into a growing word buffer, `BitReader` is the
//! exact inverse, and the free functions provide positional `read_bits`,
//! `rank1` and sampled `select1` over a packed word slice.
//!
//! The unary ("upper bits") half of an Elias-Fano block calls `select1` once
//! per accessed element, so [`SelectIndex`] keeps the position of every
//! [`SELECT_SAMPLE_RATE`]-th set bit. A query jumps to the nearest sample and
//! scans forward by whole-word popcounts, keeping the scan bounded by the
//! sample spacing.

use crate::error::{Error, Result};

/// One select sample is kept per this many set bits.
pub const SELECT_SAMPLE_RATE: usize = 64;

/// Packs integers densely into a word buffer, LSB-first.
#[derive(Debug, Default)]
pub struct BitWriter {
    words: Vec<u64>,
    cur: u64,
    filled: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the `width` least-significant bits of `value`.
    ///
    /// Fails with [`Error::Validation`] if `value` does not fit in `width`
    /// bits or if `width > 64`. Writing zero bits is a no-op.
    pub fn put(&mut self, value: u64, width: u32) -> Result<()> {
        if width == 0 {
            return Ok(());
        }
        if width > 64 {
            return Err(Error::Validation(format!(
                "bit width {width} exceeds 64"
            )));
        }
        if width < 64 && value >> width != 0 {
            return Err(Error::Validation(format!(
                "value {value} does not fit in {width} bits"
            )));
        }

        self.put_truncated(value, width);
        Ok(())
    }

    /// Append `width` bits of `value`, silently discarding higher bits.
    ///
    /// Encode paths mask values before packing, so this cannot misbehave
    /// there; the validated [`BitWriter::put`] is the public entry point.
    pub(crate) fn put_truncated(&mut self, value: u64, width: u32) {
        if width == 0 {
            return;
        }
        let mut val = if width < 64 {
            value & ((1u64 << width) - 1)
        } else {
            value
        };
        let mut remain = width;
        while remain > 0 {
            let space = 64 - self.filled;
            let take = remain.min(space);
            let chunk = if take == 64 {
                val
            } else {
                val & ((1u64 << take) - 1)
            };
            self.cur |= chunk << self.filled;
            self.filled += take;
            val = if take == 64 { 0 } else { val >> take };
            remain -= take;
            if self.filled == 64 {
                self.words.push(self.cur);
                self.cur = 0;
                self.filled = 0;
            }
        }
    }

    /// Pad the current partial word with zeros and emit it.
    pub fn flush(&mut self) {
        if self.filled > 0 {
            self.words.push(self.cur);
            self.cur = 0;
            self.filled = 0;
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.words.len() * 64 + self.filled as usize
    }

    /// Consume the writer, flushing any partial word.
    pub fn into_words(mut self) -> Vec<u64> {
        self.flush();
        self.words
    }
}

/// Reads integers out of a densely-packed word slice, LSB-first.
///
/// Reading past the end of the slice yields zero bits; callers that packed
/// `n` fields read back exactly `n` fields and never see the padding.
#[derive(Debug)]
pub struct BitReader<'a> {
    words: &'a [u64],
    idx: usize,
    consumed: u32,
}

impl<'a> BitReader<'a> {
    /// Create a reader positioned at bit 0 of `words`.
    pub fn new(words: &'a [u64]) -> Self {
        Self {
            words,
            idx: 0,
            consumed: 0,
        }
    }

    /// Read `width` bits (`width <= 64`), packed into the least-significant
    /// positions of the result.
    pub fn get(&mut self, width: u32) -> u64 {
        debug_assert!(width <= 64);
        let mut res = 0u64;
        let mut produced = 0u32;
        let mut remain = width;
        while remain > 0 {
            if self.consumed == 64 {
                self.idx += 1;
                self.consumed = 0;
            }
            let cur = self.words.get(self.idx).copied().unwrap_or(0);
            let space = 64 - self.consumed;
            let take = remain.min(space);
            let mut chunk = cur >> self.consumed;
            if take < 64 {
                chunk &= (1u64 << take) - 1;
            }
            res |= chunk << produced;
            self.consumed += take;
            produced += take;
            remain -= take;
        }
        res
    }

    /// Reposition the cursor to an absolute bit offset.
    pub fn scan(&mut self, bit_offset: usize) {
        self.idx = bit_offset / 64;
        self.consumed = (bit_offset % 64) as u32;
    }
}

/// Read `width` bits at `bit_offset` from a packed word slice.
///
/// Positional companion to [`BitReader`]: total and side-effect-free, reads
/// past the end yield zero bits.
pub fn read_bits(words: &[u64], bit_offset: usize, width: u32) -> u64 {
    debug_assert!(width <= 64);
    if width == 0 {
        return 0;
    }
    let word_idx = bit_offset / 64;
    let shift = (bit_offset % 64) as u32;
    let lo = words.get(word_idx).copied().unwrap_or(0) >> shift;
    let mut res = lo;
    if shift + width > 64 {
        let hi = words.get(word_idx + 1).copied().unwrap_or(0);
        res |= hi << (64 - shift);
    }
    if width < 64 {
        res &= (1u64 << width) - 1;
    }
    res
}

/// Number of set bits in `words[..]` strictly before bit position `pos`.
pub fn rank1(words: &[u64], pos: usize) -> usize {
    let full_words = (pos / 64).min(words.len());
    let mut count = 0usize;
    for &w in &words[..full_words] {
        count += w.count_ones() as usize;
    }
    let rem = pos % 64;
    if rem > 0 && full_words < words.len() {
        let mask = (1u64 << rem) - 1;
        count += (words[full_words] & mask).count_ones() as usize;
    }
    count
}

/// Position of the `k`-th set bit (0-indexed) within a single word.
fn select_in_word(word: u64, k: usize) -> usize {
    #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
    {
        unsafe {
            let mask = 1u64 << k;
            let res = core::arch::x86_64::_pdep_u64(mask, word);
            return res.trailing_zeros() as usize;
        }
    }

    // Portable fallback: peel set bits until the k-th remains. Callers
    // guarantee the word has more than `k` set bits.
    let mut remaining = k;
    let mut w = word;
    loop {
        let bit = w.trailing_zeros() as usize;
        if remaining == 0 {
            return bit;
        }
        w &= w - 1;
        remaining -= 1;
    }
}

/// Sparse select index over a unary-coded word slice.
///
/// Stores the bit position of every [`SELECT_SAMPLE_RATE`]-th set bit, built
/// once at encode (or deserialize) time.
#[derive(Debug, Clone, Default)]
pub struct SelectIndex {
    samples: Vec<u32>,
}

impl SelectIndex {
    /// Build the index for `words`.
    pub fn build(words: &[u64]) -> Self {
        let mut samples = Vec::new();
        let mut seen = 0usize;
        for (i, &word) in words.iter().enumerate() {
            let ones = word.count_ones() as usize;
            // Sample every set bit whose rank is a multiple of the rate and
            // falls inside this word.
            let mut target = seen.next_multiple_of(SELECT_SAMPLE_RATE);
            while target < seen + ones {
                let pos = i * 64 + select_in_word(word, target - seen);
                samples.push(pos as u32);
                target += SELECT_SAMPLE_RATE;
            }
            seen += ones;
        }
        Self { samples }
    }

    /// Position of the `k`-th set bit of `words`, or `None` if fewer than
    /// `k + 1` bits are set.
    pub fn select1(&self, words: &[u64], k: usize) -> Option<usize> {
        let sample_idx = k / SELECT_SAMPLE_RATE;
        let start_pos = *self.samples.get(sample_idx)? as usize;
        let mut word_idx = start_pos / 64;
        let mut remaining = k - sample_idx * SELECT_SAMPLE_RATE;

        // The sampled bit itself is set-bit number sample_idx * RATE; mask
        // off everything below it in its word and walk forward.
        let mut word = words[word_idx] & (!0u64 << (start_pos % 64));
        loop {
            let ones = word.count_ones() as usize;
            if remaining < ones {
                return Some(word_idx * 64 + select_in_word(word, remaining));
            }
            remaining -= ones;
            word_idx += 1;
            if word_idx >= words.len() {
                return None;
            }
            word = words[word_idx];
        }
    }
}
