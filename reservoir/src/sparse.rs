use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::{ReservoirError, Result};

/// Portable form of a sparse matrix: parallel arrays of row index, column index and
/// value, plus the shape. Entries are stored in row-major order without duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseTriplets {
    pub nrows: usize,
    pub ncols: usize,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<f64>,
}

impl From<&CsrMatrix<f64>> for SparseTriplets {
    fn from(matrix: &CsrMatrix<f64>) -> Self {
        let nnz = matrix.nnz();
        let mut triplets = SparseTriplets {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
        };
        for (i, j, v) in matrix.triplet_iter() {
            triplets.rows.push(i);
            triplets.cols.push(j);
            triplets.values.push(*v);
        }
        triplets
    }
}

impl TryFrom<SparseTriplets> for CsrMatrix<f64> {
    type Error = ReservoirError;

    fn try_from(triplets: SparseTriplets) -> Result<Self> {
        // Converting to CSR would silently sum duplicates, so insist on the
        // strictly increasing order that `From<&CsrMatrix>` produces.
        let positions = triplets.rows.iter().zip(triplets.cols.iter());
        let ordered = positions
            .clone()
            .zip(positions.skip(1))
            .all(|(prev, next)| prev < next);
        if !ordered {
            return Err(ReservoirError::Format {
                reason: "sparse entries are duplicated or out of order".to_string(),
            });
        }

        let coo = CooMatrix::try_from_triplets(
            triplets.nrows,
            triplets.ncols,
            triplets.rows,
            triplets.cols,
            triplets.values,
        )
        .map_err(|e| ReservoirError::Format {
            reason: format!("invalid sparse triplets: {e}"),
        })?;

        Ok(CsrMatrix::from(&coo))
    }
}
