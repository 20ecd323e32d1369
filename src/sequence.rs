//! Partitioned Elias-Fano sequence: construction, decode, persistence.
//!
//! A [`Sequence`] owns an ordered list of independently-encoded blocks plus
//! their metadata. It is immutable after construction; every transformation
//! in [`crate::ops`] allocates a new value, which also makes concurrent
//! readers safe without synchronization.
//!
//! # Serialized format (version 1, little-endian)
//!
//! ```text
//! Header:   magic "PPEF" | version u32 | n_elem u64 | block_size u32
//!           | universe u64 | n_blocks u32
//! Metadata: n_blocks x { base_value u64, count u32, upper_bit_width u8,
//!           lower_bit_width u8, byte_length u32 }
//! Payload:  concatenated block payloads, each exactly byte_length bytes
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::block::{BlockMeta, EfBlock};
use crate::error::{Error, Result};

/// Default maximum number of elements per block.
pub const DEFAULT_BLOCK_SIZE: u32 = 128;

/// Largest accepted block size.
///
/// A block payload costs at most ~66 bits per element (63 lower bits plus
/// the unary upper part), so capping the element count here keeps every
/// block's `byte_length` within its u32 metadata field.
pub const MAX_BLOCK_SIZE: u32 = 1 << 28;

const MAGIC: [u8; 4] = *b"PPEF";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 4 + 8 + 4;
const META_RECORD_LEN: usize = 8 + 4 + 1 + 1 + 4;

/// A compressed, randomly-accessible sorted integer sequence.
#[derive(Debug, Clone)]
pub struct Sequence {
    n_elem: u64,
    block_size: u32,
    universe: u64,
    blocks: Vec<EfBlock>,
    meta: Vec<BlockMeta>,
}

impl Sequence {
    /// Encode a sorted slice of non-negative integers.
    ///
    /// Fails with [`Error::Validation`] if the input is not non-decreasing
    /// or `block_size` is zero. The universe is derived as `max + 1`.
    pub fn from_values(values: &[u64], block_size: u32) -> Result<Self> {
        Self::validate(values, block_size)?;
        let universe = values.last().map_or(0, |&v| v.saturating_add(1));
        Ok(Self::encode_sorted(values, block_size, universe))
    }

    /// Like [`Sequence::from_values`] with an explicit exclusive upper bound
    /// on element values.
    pub fn from_values_with_universe(
        values: &[u64],
        block_size: u32,
        universe: u64,
    ) -> Result<Self> {
        Self::validate(values, block_size)?;
        if let Some(&last) = values.last() {
            if last >= universe {
                return Err(Error::Validation(format!(
                    "value {last} is outside universe {universe}"
                )));
            }
        }
        Ok(Self::encode_sorted(values, block_size, universe))
    }

    fn validate(values: &[u64], block_size: u32) -> Result<()> {
        if block_size == 0 {
            return Err(Error::Validation("block_size must be >= 1".to_string()));
        }
        if block_size > MAX_BLOCK_SIZE {
            return Err(Error::Validation(format!(
                "block_size {block_size} exceeds maximum {MAX_BLOCK_SIZE}"
            )));
        }
        if let Some(i) = values.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::Validation(format!(
                "sequence is not non-decreasing at index {}: {} > {}",
                i + 1,
                values[i],
                values[i + 1]
            )));
        }
        Ok(())
    }

    /// Encode values already known to be sorted. Used internally by the set
    /// algebra, whose merge outputs are sorted by construction. Callers
    /// guarantee `block_size >= 1`.
    pub(crate) fn encode_sorted(values: &[u64], block_size: u32, universe: u64) -> Self {
        debug_assert!(block_size >= 1);
        let n_blocks = values.len().div_ceil(block_size as usize);
        let mut blocks = Vec::with_capacity(n_blocks);
        let mut meta = Vec::with_capacity(n_blocks);
        let mut offset = 0u64;
        for chunk in values.chunks(block_size as usize) {
            let mut blk = EfBlock::encode(chunk);
            blk.set_byte_offset(offset);
            offset += blk.meta().byte_length as u64;
            meta.push(blk.meta());
            blocks.push(blk);
        }
        debug!(
            "encoded {} values into {} blocks, {} payload bytes",
            values.len(),
            blocks.len(),
            offset
        );
        Self {
            n_elem: values.len() as u64,
            block_size,
            universe,
            blocks,
            meta,
        }
    }

    /// Number of logical elements (duplicates counted).
    pub fn len(&self) -> usize {
        self.n_elem as usize
    }

    /// Return true if the sequence holds no elements.
    pub fn is_empty(&self) -> bool {
        self.n_elem == 0
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Maximum number of elements per block.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Exclusive upper bound on element values.
    pub fn universe(&self) -> u64 {
        self.universe
    }

    /// Per-block metadata, in block order. No payload is decoded.
    pub fn get_meta(&self) -> &[BlockMeta] {
        &self.meta
    }

    /// Decode block `i` into absolute values.
    ///
    /// Fails with [`Error::IndexOutOfBounds`] if `i >= num_blocks()`.
    pub fn decode_block(&self, i: usize) -> Result<Vec<u64>> {
        let blk = self.blocks.get(i).ok_or(Error::IndexOutOfBounds(i))?;
        Ok(blk.decode())
    }

    /// Decode the whole sequence.
    pub fn decode(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.len());
        for blk in &self.blocks {
            out.extend(blk.decode());
        }
        out
    }

    /// Random access to the `i`-th element without decoding a whole block.
    pub fn get(&self, i: usize) -> Result<u64> {
        if i >= self.len() {
            return Err(Error::IndexOutOfBounds(i));
        }
        let b = i / self.block_size as usize;
        let off = i % self.block_size as usize;
        let blk = self.blocks.get(b).ok_or(Error::IndexOutOfBounds(i))?;
        blk.get(off)
    }

    /// Streaming iterator over decoded elements, one block at a time.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            seq: self,
            block_idx: 0,
            buf: Vec::new(),
            pos: 0,
            remaining: self.len(),
        }
    }

    /// Serialize to the version-1 binary format.
    pub fn serialize(&self) -> Vec<u8> {
        let payload_len: usize = self.meta.iter().map(|m| m.byte_length as usize).sum();
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.meta.len() * META_RECORD_LEN + payload_len);

        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.n_elem.to_le_bytes());
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.extend_from_slice(&self.universe.to_le_bytes());
        out.extend_from_slice(&(self.blocks.len() as u32).to_le_bytes());

        for m in &self.meta {
            out.extend_from_slice(&m.base_value.to_le_bytes());
            out.extend_from_slice(&m.count.to_le_bytes());
            out.push(m.upper_bit_width);
            out.push(m.lower_bit_width);
            out.extend_from_slice(&m.byte_length.to_le_bytes());
        }

        for blk in &self.blocks {
            blk.write_payload(&mut out);
        }
        out
    }

    /// Reconstruct a sequence from [`Sequence::serialize`] output.
    ///
    /// Fails with [`Error::InvalidEncoding`] on bad magic, unsupported
    /// version, truncation, or metadata inconsistent with the payload.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        fn take<'a>(bytes: &'a [u8], off: &mut usize, n: usize) -> Result<&'a [u8]> {
            if *off + n > bytes.len() {
                return Err(Error::InvalidEncoding(
                    "unexpected end of input".to_string(),
                ));
            }
            let slice = &bytes[*off..*off + n];
            *off += n;
            Ok(slice)
        }
        let mut off = 0usize;

        let magic = take(bytes, &mut off, 4)?;
        if magic != MAGIC {
            return Err(Error::InvalidEncoding(
                "bad magic for Sequence".to_string(),
            ));
        }
        let version = u32::from_le_bytes(take(bytes, &mut off, 4)?.try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::InvalidEncoding(format!(
                "unsupported format version {version}"
            )));
        }

        let n_elem = u64::from_le_bytes(take(bytes, &mut off, 8)?.try_into().unwrap());
        let block_size = u32::from_le_bytes(take(bytes, &mut off, 4)?.try_into().unwrap());
        let universe = u64::from_le_bytes(take(bytes, &mut off, 8)?.try_into().unwrap());
        let n_blocks = u32::from_le_bytes(take(bytes, &mut off, 4)?.try_into().unwrap()) as usize;

        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidEncoding(format!(
                "block_size {block_size} outside 1..={MAX_BLOCK_SIZE}"
            )));
        }
        // Bound allocation against total input to prevent allocation bombs.
        if n_blocks.saturating_mul(META_RECORD_LEN) > bytes.len() {
            return Err(Error::InvalidEncoding(format!(
                "n_blocks ({n_blocks}) too large for input ({} bytes)",
                bytes.len()
            )));
        }

        let mut meta = Vec::with_capacity(n_blocks);
        let mut payload_offset = 0u64;
        for _ in 0..n_blocks {
            let base_value = u64::from_le_bytes(take(bytes, &mut off, 8)?.try_into().unwrap());
            let count = u32::from_le_bytes(take(bytes, &mut off, 4)?.try_into().unwrap());
            let upper_bit_width = take(bytes, &mut off, 1)?[0];
            let lower_bit_width = take(bytes, &mut off, 1)?[0];
            let byte_length = u32::from_le_bytes(take(bytes, &mut off, 4)?.try_into().unwrap());
            meta.push(BlockMeta {
                base_value,
                count,
                upper_bit_width,
                lower_bit_width,
                byte_length,
                byte_offset: payload_offset,
            });
            payload_offset += byte_length as u64;
        }

        // `get` routes with `i / block_size`, so every block except the last
        // must be exactly full and the last must be non-empty.
        for (i, m) in meta.iter().enumerate() {
            let is_last = i + 1 == n_blocks;
            let consistent = if is_last {
                m.count >= 1 && m.count <= block_size
            } else {
                m.count == block_size
            };
            if !consistent {
                return Err(Error::InvalidEncoding(format!(
                    "block {i} holds {} elements, inconsistent with block_size {block_size}",
                    m.count
                )));
            }
        }

        let payload_len: usize = meta.iter().map(|m| m.byte_length as usize).sum();
        if bytes.len() - off != payload_len {
            return Err(Error::InvalidEncoding(format!(
                "payload is {} bytes, metadata expects {payload_len}",
                bytes.len() - off
            )));
        }

        let mut blocks = Vec::with_capacity(n_blocks);
        for m in &meta {
            let payload = take(bytes, &mut off, m.byte_length as usize)?;
            blocks.push(EfBlock::from_payload(*m, payload)?);
        }

        // Blocks must chain in sorted order: no block may start before the
        // previous block's last element.
        let mut prev_last: Option<u64> = None;
        for (i, blk) in blocks.iter().enumerate() {
            let base = blk.meta().base_value;
            if let Some(p) = prev_last {
                if base < p {
                    return Err(Error::InvalidEncoding(format!(
                        "block {i} starts at {base}, before the previous block's end {p}"
                    )));
                }
            }
            prev_last = Some(blk.get(blk.len() - 1)?);
        }

        let actual_n: u64 = meta.iter().map(|m| m.count as u64).sum();
        if actual_n != n_elem {
            return Err(Error::InvalidEncoding(format!(
                "n_elem ({n_elem}) does not match sum of block counts ({actual_n})"
            )));
        }

        Ok(Self {
            n_elem,
            block_size,
            universe,
            blocks,
            meta,
        })
    }

    /// Write the serialized form to `path`.
    ///
    /// The bytes go to a sibling temporary file first and are atomically
    /// renamed into place, so a failed save never corrupts an existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.serialize();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        debug!("saved {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    /// Read a sequence previously written with [`Sequence::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!("loaded {} bytes from {}", bytes.len(), path.display());
        Self::deserialize(&bytes)
    }
}

/// Streaming iterator over a sequence's decoded elements.
///
/// Decodes one block at a time, so the working set stays at `block_size`
/// values regardless of sequence length.
#[derive(Debug)]
pub struct Iter<'a> {
    seq: &'a Sequence,
    block_idx: usize,
    buf: Vec<u64>,
    pos: usize,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.pos >= self.buf.len() {
            if self.block_idx >= self.seq.num_blocks() {
                return None;
            }
            self.buf = self.seq.blocks[self.block_idx].decode();
            self.block_idx += 1;
            self.pos = 0;
        }
        let v = self.buf[self.pos];
        self.pos += 1;
        self.remaining -= 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Sequence {
    type Item = u64;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
