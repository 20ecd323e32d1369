//! Set algebra over compressed sequences.
//!
//! Every operation streams its operands block-by-block through
//! [`Sequence::iter`], emits a sorted value stream, and re-encodes it into a
//! new [`Sequence`]; operands are never mutated. Intersect, union and
//! difference share one two-pointer merge skeleton parameterized by
//! [`MergeKind`].
//!
//! # Multiset policy
//!
//! Inputs may contain duplicates, and the merge handles them as follows:
//!
//! - `intersect`: operands advance in lockstep on equal fronts, so a value
//!   appears `min(count_a, count_b)` times in the result
//! - `union`: equal fronts are emitted once and both operands advance, so a
//!   value appears `max(count_a, count_b)` times
//! - `difference`: value-based; a value present in `b` is removed from the
//!   result entirely, regardless of multiplicities on either side
//!
//! Callers that want classic set semantics apply [`Sequence::unique`] to the
//! operands first.

use std::ops::{BitAnd, BitOr, Sub};

use crate::error::{Error, Result};
use crate::sequence::{Sequence, MAX_BLOCK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeKind {
    Intersect,
    Union,
    Difference,
}

impl Sequence {
    /// Elements present in both `self` and `other` (see module docs for the
    /// duplicate policy). The result uses `self`'s block size.
    pub fn intersect(&self, other: &Sequence) -> Sequence {
        self.merge(other, MergeKind::Intersect, self.block_size())
    }

    /// [`Sequence::intersect`] with an explicit result block size.
    pub fn intersect_with_block_size(&self, other: &Sequence, block_size: u32) -> Sequence {
        self.merge(other, MergeKind::Intersect, block_size.clamp(1, MAX_BLOCK_SIZE))
    }

    /// Sorted merge of `self` and `other`, collapsing fronts equal across
    /// both streams. The result uses `self`'s block size.
    pub fn union(&self, other: &Sequence) -> Sequence {
        self.merge(other, MergeKind::Union, self.block_size())
    }

    /// [`Sequence::union`] with an explicit result block size.
    pub fn union_with_block_size(&self, other: &Sequence, block_size: u32) -> Sequence {
        self.merge(other, MergeKind::Union, block_size.clamp(1, MAX_BLOCK_SIZE))
    }

    /// Elements of `self` whose value does not appear in `other`. The result
    /// uses `self`'s block size.
    pub fn difference(&self, other: &Sequence) -> Sequence {
        self.merge(other, MergeKind::Difference, self.block_size())
    }

    /// [`Sequence::difference`] with an explicit result block size.
    pub fn difference_with_block_size(&self, other: &Sequence, block_size: u32) -> Sequence {
        self.merge(other, MergeKind::Difference, block_size.clamp(1, MAX_BLOCK_SIZE))
    }

    fn merge(&self, other: &Sequence, kind: MergeKind, block_size: u32) -> Sequence {
        use MergeKind::*;

        let mut a = self.iter().peekable();
        let mut b = other.iter().peekable();
        let mut out = Vec::new();

        loop {
            match (a.peek().copied(), b.peek().copied()) {
                (Some(x), Some(y)) if x < y => {
                    if kind != Intersect {
                        out.push(x);
                    }
                    a.next();
                }
                (Some(x), Some(y)) if y < x => {
                    if kind == Union {
                        out.push(y);
                    }
                    b.next();
                }
                (Some(x), Some(_)) => match kind {
                    Intersect | Union => {
                        out.push(x);
                        a.next();
                        b.next();
                    }
                    Difference => {
                        // Value-based removal: skip the whole equal run on
                        // both sides.
                        while a.peek() == Some(&x) {
                            a.next();
                        }
                        while b.peek() == Some(&x) {
                            b.next();
                        }
                    }
                },
                (Some(x), None) => {
                    if kind != Intersect {
                        out.push(x);
                    }
                    a.next();
                }
                (None, Some(y)) => {
                    if kind == Union {
                        out.push(y);
                    }
                    b.next();
                }
                (None, None) => break,
            }
        }

        Self::from_merged(out, block_size)
    }

    /// Collapse consecutive equal elements into one occurrence.
    pub fn unique(&self) -> Sequence {
        let mut out = Vec::new();
        let mut prev = None;
        for v in self.iter() {
            if prev != Some(v) {
                out.push(v);
                prev = Some(v);
            }
        }
        Self::from_merged(out, self.block_size())
    }

    /// Keep only values whose multiplicity lies in `[min_count, max_count]`.
    ///
    /// With `write_multiset` the qualifying values keep their original
    /// multiplicity; otherwise each appears exactly once. A `min_count` of
    /// zero is equivalent to one, since every present value occurs at least
    /// once. Fails with [`Error::Validation`] if `min_count` exceeds
    /// `max_count`.
    pub fn filter_by_count(
        &self,
        min_count: usize,
        max_count: usize,
        write_multiset: bool,
    ) -> Result<Sequence> {
        if min_count > max_count {
            return Err(Error::Validation(format!(
                "min_count ({min_count}) exceeds max_count ({max_count})"
            )));
        }
        let min_count = min_count.max(1);

        let mut out = Vec::new();
        let mut emit = |value: u64, count: usize| {
            if (min_count..=max_count).contains(&count) {
                let reps = if write_multiset { count } else { 1 };
                out.extend(std::iter::repeat(value).take(reps));
            }
        };

        let mut run: Option<(u64, usize)> = None;
        for v in self.iter() {
            match run {
                Some((value, count)) if value == v => run = Some((value, count + 1)),
                Some((value, count)) => {
                    emit(value, count);
                    run = Some((v, 1));
                }
                None => run = Some((v, 1)),
            }
        }
        if let Some((value, count)) = run {
            emit(value, count);
        }

        Ok(Self::from_merged(out, self.block_size()))
    }

    /// Re-encode a sorted merge output; the universe is re-derived from the
    /// result, exactly as plain construction would.
    fn from_merged(values: Vec<u64>, block_size: u32) -> Sequence {
        let universe = values.last().map_or(0, |&v| v.saturating_add(1));
        Sequence::encode_sorted(&values, block_size, universe)
    }
}

impl BitAnd for &Sequence {
    type Output = Sequence;

    fn bitand(self, rhs: &Sequence) -> Sequence {
        self.intersect(rhs)
    }
}

impl BitOr for &Sequence {
    type Output = Sequence;

    fn bitor(self, rhs: &Sequence) -> Sequence {
        self.union(rhs)
    }
}

impl Sub for &Sequence {
    type Output = Sequence;

    fn sub(self, rhs: &Sequence) -> Sequence {
        self.difference(rhs)
    }
}
