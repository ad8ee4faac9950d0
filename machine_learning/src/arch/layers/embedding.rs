use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::{MlErr, Result};

/// A frozen lookup table that represents a token sequence by the mean of its embeddings.
///
/// The table is not part of the trainable parameters, it's loaded once from precomputed
/// word vectors.
#[derive(Debug, Clone)]
pub struct EmbeddingBag {
    table: Array2<f32>,
}

impl EmbeddingBag {
    /// Creates a new `EmbeddingBag`.
    ///
    /// # Arguments
    /// * `table` - A `vocabulary x dim` matrix with one embedding per row.
    pub fn new(table: Array2<f32>) -> Self {
        Self { table }
    }

    /// Builds the table out of one row of values per vocabulary entry.
    ///
    /// # Returns
    /// An error if the rows don't all have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let vocabulary = rows.len();
        let mut data = Vec::with_capacity(vocabulary * dim);

        for row in rows {
            if row.len() != dim {
                return Err(MlErr::SizeMismatch {
                    what: "embedding row",
                    got: row.len(),
                    expected: dim,
                });
            }
            data.extend(row);
        }

        let table = Array2::from_shape_vec((vocabulary, dim), data).map_err(|_| {
            MlErr::SizeMismatch {
                what: "embedding table",
                got: vocabulary * dim,
                expected: vocabulary * dim,
            }
        })?;

        Ok(Self::new(table))
    }

    pub fn vocabulary(&self) -> usize {
        self.table.nrows()
    }

    pub fn dim(&self) -> usize {
        self.table.ncols()
    }

    pub fn table(&self) -> ArrayView2<'_, f32> {
        self.table.view()
    }

    /// Embeds a batch of token sequences, one output row per sequence. Empty sequences are
    /// embedded as zeros.
    pub fn forward(&self, sequences: &[Vec<u32>]) -> Result<Array2<f32>> {
        let rows = sequences
            .par_iter()
            .map(|tokens| self.bag(tokens))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array2::zeros((sequences.len(), self.dim()));
        for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(rows) {
            dst.assign(&src);
        }

        Ok(out)
    }

    fn bag(&self, tokens: &[u32]) -> Result<Array1<f32>> {
        let mut acc = Array1::zeros(self.dim());
        if tokens.is_empty() {
            return Ok(acc);
        }

        for &token in tokens {
            if token as usize >= self.vocabulary() {
                return Err(MlErr::TokenOutOfRange {
                    token,
                    vocabulary: self.vocabulary(),
                });
            }
            acc += &self.table.row(token as usize);
        }

        acc /= tokens.len() as f32;
        Ok(acc)
    }
}
