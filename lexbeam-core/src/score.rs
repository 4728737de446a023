use crate::{LexbeamError, Result};

/// Borrowed dense view over a `(rows x vocab)` score matrix produced by the
/// scorer. Convention: lower scores are better.
///
/// Row indices address flattened (batch item, beam slot) hypotheses. Index
/// violations are internal invariant failures and panic rather than return
/// an error.
#[derive(Debug, Clone, Copy)]
pub struct ScoreMatrix<'a> {
    data: &'a [f32],
    vocab_size: usize,
}

impl<'a> ScoreMatrix<'a> {
    pub fn new(data: &'a [f32], vocab_size: usize) -> Result<Self> {
        if vocab_size == 0 {
            return Err(LexbeamError::InvalidArgument(
                "vocab_size must be nonzero".into(),
            ));
        }
        if data.len() % vocab_size != 0 {
            return Err(LexbeamError::ShapeMismatch {
                expected: vocab_size,
                got: data.len(),
            });
        }
        Ok(Self { data, vocab_size })
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.vocab_size
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn row(&self, row: usize) -> &'a [f32] {
        &self.data[row * self.vocab_size..(row + 1) * self.vocab_size]
    }

    pub fn get(&self, row: usize, col: u32) -> f32 {
        self.row(row)[col as usize]
    }

    /// Column of the best (lowest) score in `row`; ties resolve to the
    /// lowest column index.
    pub fn argmin_row(&self, row: usize) -> u32 {
        let mut best = 0usize;
        let mut best_score = f32::INFINITY;
        for (col, &score) in self.row(row).iter().enumerate() {
            if score < best_score {
                best = col;
                best_score = score;
            }
        }
        best as u32
    }
}
