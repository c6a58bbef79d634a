//! Block-structured solver vectors.
//!
//! The restoration phase works in an enlarged variable space: the elastic
//! reformulation appends violation variables to the original ones. Every
//! restoration-space vector is therefore partitioned into an ordered sequence
//! of blocks, and block 0 holds the corresponding original-space vector.
//! Transferring a restoration result back to the original space is exactly
//! "take block 0".
//!
//! Blocks nest: when restoration is entered from within a restoration run,
//! block 0 of the inner vector is itself a composite vector. All elementwise
//! operations here preserve the block structure of the receiver.
//!
//! Extracting the original-space block is a checked operation. In correct
//! operation it never fails; a failure indicates a vector with the wrong
//! layout reached the transfer step, which is a programming error surfaced
//! as a typed [`LayoutError`] rather than a panic.

use thiserror::Error;

/// Structural error for block-vector accesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A composite vector was required but a dense one was found.
    #[error("expected a composite vector with an original-space block 0, found a dense vector of length {len}")]
    NotComposite { len: usize },

    /// A composite vector has no blocks at all.
    #[error("composite vector has no blocks")]
    EmptyComposite,

    /// A dense vector was required but a composite one was found.
    #[error("expected a dense vector, found a composite vector with {blocks} blocks")]
    NotDense { blocks: usize },

    /// Flat data of the wrong total length was supplied.
    #[error("flat data has length {found}, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },
}

/// A vector that is either a plain dense vector or an ordered sequence of
/// sub-vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockVec {
    /// Contiguous storage, used by all original-space vectors.
    Dense(Vec<f64>),

    /// Ordered sub-blocks; block 0 is the original-space vector.
    Composite(Vec<BlockVec>),
}

impl BlockVec {
    /// Dense vector from raw values.
    pub fn dense(values: Vec<f64>) -> Self {
        BlockVec::Dense(values)
    }

    /// Composite vector from ordered blocks.
    pub fn composite(blocks: Vec<BlockVec>) -> Self {
        BlockVec::Composite(blocks)
    }

    /// Dense all-zero vector of the given length.
    pub fn zeros(len: usize) -> Self {
        BlockVec::Dense(vec![0.0; len])
    }

    /// Total number of scalar entries across all blocks.
    pub fn len(&self) -> usize {
        match self {
            BlockVec::Dense(v) => v.len(),
            BlockVec::Composite(blocks) => blocks.iter().map(BlockVec::len).sum(),
        }
    }

    /// True if the vector holds no scalar entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The original-space block of a composite vector.
    ///
    /// Block 0 of a restoration-space vector is defined to be the
    /// corresponding original-space vector, so this is the whole transfer
    /// operation.
    pub fn original_block(&self) -> Result<&BlockVec, LayoutError> {
        match self {
            BlockVec::Dense(v) => Err(LayoutError::NotComposite { len: v.len() }),
            BlockVec::Composite(blocks) => blocks.first().ok_or(LayoutError::EmptyComposite),
        }
    }

    /// View a dense vector's entries.
    pub fn as_dense(&self) -> Result<&[f64], LayoutError> {
        match self {
            BlockVec::Dense(v) => Ok(v),
            BlockVec::Composite(blocks) => Err(LayoutError::NotDense { blocks: blocks.len() }),
        }
    }

    /// Mutable view of a dense vector's entries.
    pub fn as_dense_mut(&mut self) -> Result<&mut [f64], LayoutError> {
        match self {
            BlockVec::Dense(v) => Ok(v),
            BlockVec::Composite(blocks) => Err(LayoutError::NotDense { blocks: blocks.len() }),
        }
    }

    /// Copy the logical contents contiguously into `out`.
    pub fn flatten_into(&self, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.len());
        self.flatten_inner(out);
    }

    fn flatten_inner(&self, out: &mut [f64]) {
        match self {
            BlockVec::Dense(v) => out[..v.len()].copy_from_slice(v),
            BlockVec::Composite(blocks) => {
                let mut offset = 0;
                for block in blocks {
                    let len = block.len();
                    block.flatten_inner(&mut out[offset..offset + len]);
                    offset += len;
                }
            }
        }
    }

    /// Overwrite the entries from flat data, preserving the block structure.
    pub fn copy_from_flat(&mut self, src: &[f64]) -> Result<(), LayoutError> {
        let len = self.len();
        if src.len() != len {
            return Err(LayoutError::LengthMismatch { expected: len, found: src.len() });
        }
        self.copy_from_flat_inner(src);
        Ok(())
    }

    fn copy_from_flat_inner(&mut self, src: &[f64]) {
        match self {
            BlockVec::Dense(v) => {
                let n = v.len();
                v.copy_from_slice(&src[..n]);
            }
            BlockVec::Composite(blocks) => {
                let mut offset = 0;
                for block in blocks {
                    let len = block.len();
                    block.copy_from_flat_inner(&src[offset..offset + len]);
                    offset += len;
                }
            }
        }
    }

    /// Set every entry to `value`, preserving the block structure.
    pub fn fill(&mut self, value: f64) {
        match self {
            BlockVec::Dense(v) => v.fill(value),
            BlockVec::Composite(blocks) => {
                for block in blocks {
                    block.fill(value);
                }
            }
        }
    }

    /// Maximum absolute entry (0 for an empty vector).
    pub fn amax(&self) -> f64 {
        match self {
            BlockVec::Dense(v) => v.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs())),
            BlockVec::Composite(blocks) => {
                blocks.iter().fold(0.0_f64, |acc, b| acc.max(b.amax()))
            }
        }
    }
}
