//! Elias-Fano encoding of a single partition.
//!
//! A block holds up to `block_size` sorted values, rebased so the first
//! element maps to 0. Each rebased value is split into a fixed-width lower
//! part and a unary-coded upper part:
//!
//! - `lower_bit_width = floor(log2(local_universe / count))` (0 when the
//!   ratio is below 2), where `local_universe = last + 1` after rebasing
//! - the `k`-th value contributes a set bit at position `(value >> L) + k`
//!   in the upper bit vector, which has `(last >> L) + count` bits
//!
//! Decoding recovers `value = ((select1(k) - k) << L) | lower[k]`. Repeated
//! values are handled natively: equal highs simply stack their set bits in
//! consecutive positions.
//!
//! The serialized payload is the lower region followed by the upper region,
//! bit-packed with no gap and zero-padded to a whole number of bytes.

use crate::bits::{self, BitReader, BitWriter, SelectIndex};
use crate::error::{Error, Result};

/// Per-block metadata snapshot.
///
/// Read-only and derived at encode (or deserialize) time; `byte_offset` is
/// the block's position within the concatenated payload region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockMeta {
    /// First (smallest) element of the block, in absolute coordinates.
    pub base_value: u64,
    /// Number of elements in the block.
    pub count: u32,
    /// Bit width of the largest upper part (introspection only).
    pub upper_bit_width: u8,
    /// Fixed width of each lower part.
    pub lower_bit_width: u8,
    /// Length of the packed payload in bytes.
    pub byte_length: u32,
    /// Offset of this block's payload within the payload region.
    pub byte_offset: u64,
}

/// One Elias-Fano-encoded partition.
#[derive(Debug, Clone)]
pub struct EfBlock {
    meta: BlockMeta,
    /// Lower parts, `count * lower_bit_width` bits.
    lower: Vec<u64>,
    /// Unary-coded upper parts.
    upper: Vec<u64>,
    select: SelectIndex,
}

impl EfBlock {
    /// Encode a sorted (possibly empty) run of absolute values.
    ///
    /// The caller (the sequence layer) has already validated monotonicity;
    /// this rebases against `values[0]` and picks the Elias-Fano split.
    pub fn encode(values: &[u64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                meta: BlockMeta::default(),
                lower: Vec::new(),
                upper: Vec::new(),
                select: SelectIndex::default(),
            };
        }
        debug_assert!(values.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(count <= crate::sequence::MAX_BLOCK_SIZE as usize);

        let base = values[0];
        let last = values[count - 1] - base;
        // Saturation only matters for last == u64::MAX, where the ratio is
        // already off by at most one and L is a heuristic anyway.
        let local_universe = last.saturating_add(1);

        let ratio = local_universe / count as u64;
        let l: u32 = if ratio > 0 {
            63 - ratio.leading_zeros()
        } else {
            0
        };

        let mut lower_writer = BitWriter::new();
        if l > 0 {
            for &v in values {
                lower_writer.put_truncated(v - base, l);
            }
        }
        let lower = lower_writer.into_words();

        let upper_bits = (last >> l) as usize + count;
        let mut upper = vec![0u64; upper_bits.div_ceil(64)];
        for (k, &v) in values.iter().enumerate() {
            let pos = ((v - base) >> l) as usize + k;
            upper[pos / 64] |= 1u64 << (pos % 64);
        }
        let select = SelectIndex::build(&upper);

        let high_last = last >> l;
        let upper_bit_width = if high_last == 0 {
            0
        } else {
            (64 - high_last.leading_zeros()) as u8
        };
        // At most ~66 bits per element with count capped at MAX_BLOCK_SIZE,
        // so the byte length fits u32.
        let byte_length = (count as u64 * l as u64 + upper_bits as u64).div_ceil(8) as u32;

        Self {
            meta: BlockMeta {
                base_value: base,
                count: count as u32,
                upper_bit_width,
                lower_bit_width: l as u8,
                byte_length,
                byte_offset: 0,
            },
            lower,
            upper,
            select,
        }
    }

    /// Reconstruct a block from its metadata and exact payload bytes.
    pub fn from_payload(meta: BlockMeta, payload: &[u8]) -> Result<Self> {
        if payload.len() != meta.byte_length as usize {
            return Err(Error::InvalidEncoding(format!(
                "block payload is {} bytes, metadata says {}",
                payload.len(),
                meta.byte_length
            )));
        }
        if meta.count == 0 {
            return Ok(Self {
                meta,
                lower: Vec::new(),
                upper: Vec::new(),
                select: SelectIndex::default(),
            });
        }

        let words = words_from_bytes(payload);
        let count = meta.count as usize;
        let l = meta.lower_bit_width as u32;
        if l > 63 {
            return Err(Error::InvalidEncoding(format!(
                "lower_bit_width {l} exceeds 63"
            )));
        }
        let lower_bits = count * l as usize;
        let total_bits = payload.len() * 8;
        if lower_bits > total_bits {
            return Err(Error::InvalidEncoding(format!(
                "block lower region ({lower_bits} bits) exceeds payload ({total_bits} bits)"
            )));
        }
        let upper_bits = total_bits - lower_bits;

        let mut reader = BitReader::new(&words);
        let lower = read_region(&mut reader, lower_bits);
        let upper = read_region(&mut reader, upper_bits);

        // The upper region must contain one set bit per element; trailing
        // byte padding is zeros and adds none.
        if bits::rank1(&upper, upper_bits) != count {
            return Err(Error::InvalidEncoding(format!(
                "block upper region does not contain {count} set bits"
            )));
        }

        let select = SelectIndex::build(&upper);
        let blk = Self {
            meta,
            lower,
            upper,
            select,
        };
        blk.check_no_overflow()?;
        Ok(blk)
    }

    /// Reject corrupt metadata whose decode arithmetic would overflow u64.
    /// Valid encodings never trip this: every value fit in u64 on input.
    fn check_no_overflow(&self) -> Result<()> {
        let count = self.meta.count as usize;
        let l = self.meta.lower_bit_width as u32;
        let mut lower_reader = BitReader::new(&self.lower);
        let mut k = 0usize;
        'outer: for (i, &word) in self.upper.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let pos = i * 64 + w.trailing_zeros() as usize;
                let high = (pos - k) as u64;
                let low = lower_reader.get(l);
                let fits = high
                    .checked_mul(1u64 << l)
                    .map(|v| v | low)
                    .and_then(|v| self.meta.base_value.checked_add(v))
                    .is_some();
                if !fits {
                    return Err(Error::InvalidEncoding(
                        "block values overflow u64".to_string(),
                    ));
                }
                k += 1;
                if k == count {
                    break 'outer;
                }
                w &= w - 1;
            }
        }
        Ok(())
    }

    /// Metadata for this block. `byte_offset` is assigned by the sequence.
    pub fn meta(&self) -> BlockMeta {
        self.meta
    }

    pub(crate) fn set_byte_offset(&mut self, offset: u64) {
        self.meta.byte_offset = offset;
    }

    /// Number of elements in the block.
    pub fn len(&self) -> usize {
        self.meta.count as usize
    }

    /// Return true if the block holds no elements.
    pub fn is_empty(&self) -> bool {
        self.meta.count == 0
    }

    /// Decode all elements, in order, in absolute coordinates.
    pub fn decode(&self) -> Vec<u64> {
        let count = self.meta.count as usize;
        let l = self.meta.lower_bit_width as u32;
        let base = self.meta.base_value;
        let mut out = Vec::with_capacity(count);
        let mut lower_reader = BitReader::new(&self.lower);

        // Sequential walk over the unary region; no select needed.
        let mut k = 0usize;
        'outer: for (i, &word) in self.upper.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let pos = i * 64 + w.trailing_zeros() as usize;
                let high = (pos - k) as u64;
                let low = lower_reader.get(l);
                out.push(base + ((high << l) | low));
                k += 1;
                if k == count {
                    break 'outer;
                }
                w &= w - 1;
            }
        }
        debug_assert_eq!(out.len(), count);
        out
    }

    /// Random access to the `k`-th element without decoding the block.
    pub fn get(&self, k: usize) -> Result<u64> {
        if k >= self.meta.count as usize {
            return Err(Error::IndexOutOfBounds(k));
        }
        let l = self.meta.lower_bit_width as u32;
        let pos = self
            .select
            .select1(&self.upper, k)
            .ok_or(Error::InvalidSelection(k))?;
        let high = (pos - k) as u64;
        let low = bits::read_bits(&self.lower, k * l as usize, l);
        Ok(self.meta.base_value + ((high << l) | low))
    }

    /// Append the packed payload (exactly `byte_length` bytes) to `out`.
    pub fn write_payload(&self, out: &mut Vec<u8>) {
        let count = self.meta.count as usize;
        if count == 0 {
            return;
        }
        let lower_bits = count * self.meta.lower_bit_width as usize;
        let total_bits = self.meta.byte_length as usize * 8;

        let mut writer = BitWriter::new();
        copy_bits(&mut writer, &self.lower, lower_bits);
        copy_bits(&mut writer, &self.upper, total_bits - lower_bits);
        let words = writer.into_words();

        let start = out.len();
        for w in words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out.truncate(start + self.meta.byte_length as usize);
    }
}

/// Re-pack a byte slice into u64 words, zero-padding the tail.
fn words_from_bytes(bytes: &[u8]) -> Vec<u64> {
    let mut words = Vec::with_capacity(bytes.len().div_ceil(8));
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        words.push(u64::from_le_bytes(buf));
    }
    words
}

fn read_region(reader: &mut BitReader<'_>, n_bits: usize) -> Vec<u64> {
    let mut out = Vec::with_capacity(n_bits.div_ceil(64));
    let mut remain = n_bits;
    while remain > 0 {
        let take = remain.min(64) as u32;
        out.push(reader.get(take));
        remain -= take as usize;
    }
    out
}

fn copy_bits(dst: &mut BitWriter, src: &[u64], n_bits: usize) {
    let mut reader = BitReader::new(src);
    let mut remain = n_bits;
    while remain > 0 {
        let take = remain.min(64) as u32;
        dst.put_truncated(reader.get(take), take);
        remain -= take as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: &[u64]) {
        let blk = EfBlock::encode(values);
        assert_eq!(blk.len(), values.len());
        assert_eq!(blk.decode(), values);
        for (k, &v) in values.iter().enumerate() {
            assert_eq!(blk.get(k).unwrap(), v, "k={k}");
        }
        assert!(blk.get(values.len()).is_err());

        // Payload round trip through the serialized form.
        let mut payload = Vec::new();
        blk.write_payload(&mut payload);
        assert_eq!(payload.len(), blk.meta().byte_length as usize);
        let blk2 = EfBlock::from_payload(blk.meta(), &payload).unwrap();
        assert_eq!(blk2.decode(), values);
    }

    #[test]
    fn block_roundtrip_basic() {
        roundtrip(&[10, 20, 30, 31, 32, 100, 1000]);
    }

    #[test]
    fn block_roundtrip_clustered() {
        let values: Vec<u64> = (0..1024).map(|i| 40_000 + (i * i) % 4096).collect();
        let mut values = values;
        values.sort_unstable();
        roundtrip(&values);
    }

    #[test]
    fn block_roundtrip_duplicates() {
        roundtrip(&[5, 5, 5, 5, 5]);
        roundtrip(&[0, 0, 1, 1, 1, 2, 7, 7, 7, 7]);
    }

    #[test]
    fn block_single_element() {
        let blk = EfBlock::encode(&[42]);
        assert_eq!(blk.meta().lower_bit_width, 0);
        assert_eq!(blk.meta().base_value, 42);
        assert_eq!(blk.decode(), vec![42]);
        assert_eq!(blk.get(0).unwrap(), 42);
    }

    #[test]
    fn block_empty() {
        let blk = EfBlock::encode(&[]);
        assert!(blk.is_empty());
        assert_eq!(blk.meta().byte_length, 0);
        assert_eq!(blk.decode(), Vec::<u64>::new());
        assert!(blk.get(0).is_err());
    }

    #[test]
    fn block_large_values() {
        roundtrip(&[u64::MAX - 100, u64::MAX - 50, u64::MAX - 1]);
    }

    #[test]
    fn block_rejects_wrong_payload_length() {
        let blk = EfBlock::encode(&[1, 2, 3]);
        let mut payload = Vec::new();
        blk.write_payload(&mut payload);
        payload.pop();
        assert!(EfBlock::from_payload(blk.meta(), &payload).is_err());
    }

    #[test]
    fn block_rejects_zeroed_payload() {
        let blk = EfBlock::encode(&[100, 200, 300, 400]);
        let zeros = vec![0u8; blk.meta().byte_length as usize];
        assert!(EfBlock::from_payload(blk.meta(), &zeros).is_err());
    }
}
