//! # Partitioned Elias-Fano Sequences
//!
//! *Compressed sorted integers with random block access and set algebra.*
//!
//! ## Intuition First
//!
//! A posting list is a long sorted run of document ids. Stored as plain
//! integers it wastes space; gzip-style compression saves space but forces a
//! full decompress before you can read element 40,000 or intersect two
//! lists. Elias-Fano encoding sits in between: the sequence stays within a
//! constant factor of its information-theoretic size, yet any element can be
//! read back without touching the rest.
//!
//! ## The Problem
//!
//! Plain Elias-Fano picks a single split `L = floor(log2(U/n))` from the
//! *global* universe `U`. Real id sequences are clustered, so a global `L`
//! overpays inside dense regions. Partitioning the sequence into fixed-size
//! blocks and encoding each against its own local range recovers that loss
//! and bounds the cost of decoding any one block.
//!
//! ## Historical Context
//!
//! ```text
//! 1971  Fano      Partitioned bit representations for associative memory
//! 1974  Elias     Efficient storage of monotone sequences
//! 2013  Ottaviano Partitioned Elias-Fano indexes for inverted lists
//! ```
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **`Sequence`**: an immutable, partitioned, Elias-Fano-compressed
//!   sequence of `u64`s with per-block decode, single-element access, and a
//!   versioned binary persistence format.
//! - **Set algebra** over sequences: `intersect` (`&`), `union` (`|`),
//!   `difference` (`-`), `unique`, and `filter_by_count`, all streaming over
//!   the compressed form and producing new sequences.
//!
//! Duplicates are first-class: the encoding is non-strictly monotone, so
//! multisets round-trip exactly.
//!
//! ```rust
//! use pefseq::{Sequence, DEFAULT_BLOCK_SIZE};
//!
//! let a = Sequence::from_values(&[2, 3, 5, 7, 11], DEFAULT_BLOCK_SIZE).unwrap();
//! let b = Sequence::from_values(&[3, 4, 5, 6, 7], DEFAULT_BLOCK_SIZE).unwrap();
//! assert_eq!((&a & &b).decode(), vec![3, 5, 7]);
//!
//! let bytes = a.serialize();
//! let back = Sequence::deserialize(&bytes).unwrap();
//! assert_eq!(back.decode(), a.decode());
//! ```
//!
//! ## References
//!
//! - Elias, P. (1974). "Efficient storage and retrieval by content and
//!   address of static files."
//! - Vigna, S. (2013). "Quasi-succinct indices."
//! - Ottaviano, G., & Venturini, R. (2014). "Partitioned Elias-Fano
//!   indexes."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bits;
pub mod block;
pub mod error;
pub mod ops;
pub mod sequence;

pub use block::BlockMeta;
pub use error::{Error, Result};
pub use sequence::{Sequence, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
