use nalgebra::{Complex, DMatrix, DVector, Normed, Schur};
use nalgebra_sparse::CsrMatrix;
use nanorand::{Rng, WyRand};

use crate::{ReservoirError, Result};

/// Matrices up to this size are densified and decomposed directly
const DENSE_MAX_SIZE: usize = 128;

/// Cap on the QR sweeps of the Schur decomposition, per row of the matrix
const MAX_SWEEPS_PER_ROW: usize = 100;

/// The Krylov space is built on `(matrix / norm)^KRYLOV_POWER`, which keeps the
/// dominant eigenvalue apart from the bulk of the spectrum
const KRYLOV_POWER: i32 = 8;

/// Dimension of the first Krylov space whose Ritz values are inspected
const INITIAL_KRYLOV_DIM: usize = 16;

/// A Ritz pair counts as converged once its residual drops below this, relative to the Ritz value
const RESIDUAL_TOL: f64 = 1e-10;

/// Relative size of a new Krylov direction below which the space is invariant
const BREAKDOWN_TOL: f64 = 1e-13;

const START_VECTOR_SEED: u64 = 0x5eed;

/// The largest absolute eigenvalue of a square matrix.
///
/// The adjacency matrix is not symmetric, so its eigenvalues are in general complex.
/// Small matrices get a dense real Schur decomposition. Larger ones go through
/// `krylov_spectral_radius`, which only needs sparse matrix-vector products.
pub fn spectral_radius(matrix: &CsrMatrix<f64>) -> Result<f64> {
    if matrix.nrows() != matrix.ncols() {
        return Err(ReservoirError::DimensionMismatch {
            context: "spectral radius of a non-square matrix",
            expected: matrix.nrows(),
            actual: matrix.ncols(),
        });
    }
    let n = matrix.nrows();

    let radius = if n <= DENSE_MAX_SIZE {
        dominant_eigenvalue(DMatrix::from(matrix))?.norm()
    } else {
        krylov_spectral_radius(matrix)?
    };

    if !radius.is_finite() {
        return Err(ReservoirError::SpectralRadius {
            reason: format!("spectral radius is {radius}"),
        });
    }
    debug!("spectral radius of {n}x{n} matrix with {} nonzeros: {radius}", matrix.nnz());

    Ok(radius)
}

/// Spectral radius from the Arnoldi process on a power of the matrix.
///
/// The Krylov space grows until the largest Ritz value has converged or the space
/// becomes invariant. In the worst case it spans the whole space, where the Ritz
/// values are the exact eigenvalues.
pub(crate) fn krylov_spectral_radius(matrix: &CsrMatrix<f64>) -> Result<f64> {
    let n = matrix.nrows();
    // any induced norm bounds the spectral radius, so the powered operator stays bounded
    let norm = matrix
        .row_iter()
        .map(|row| row.values().iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    if norm == 0.0 {
        return Ok(0.0);
    }

    let operator = |v: &DVector<f64>| {
        let mut w = v.clone();
        for _ in 0..KRYLOV_POWER {
            w = (matrix * &w) / norm;
        }
        w
    };

    let mut rng = WyRand::new_seed(START_VECTOR_SEED);
    let start = DVector::from_fn(n, |_, _| 2.0 * rng.generate::<f64>() - 1.0);
    let mut arnoldi = Arnoldi::new(start);

    let mut dim = INITIAL_KRYLOV_DIM.min(n);
    loop {
        let invariant = arnoldi.extend(&operator, dim);
        let hessenberg = arnoldi.hessenberg();
        let theta = dominant_eigenvalue(hessenberg.clone())?;
        let to_radius = |theta: Complex<f64>| norm * theta.norm().powf(1.0 / KRYLOV_POWER as f64);

        if invariant || arnoldi.steps() == n {
            debug!("Krylov space of dimension {} is invariant", arnoldi.steps());
            return Ok(to_radius(theta));
        }

        let residual = arnoldi.next_norm() * eigenvector_tail(&hessenberg, theta);
        trace!(
            "Krylov dimension {}: dominant Ritz value {theta}, residual {residual:e}",
            arnoldi.steps()
        );
        if residual <= RESIDUAL_TOL * theta.norm() {
            return Ok(to_radius(theta));
        }
        dim = (dim + dim / 2).min(n);
    }
}

/// Eigenvalue of largest modulus, from the real Schur form
fn dominant_eigenvalue(matrix: DMatrix<f64>) -> Result<Complex<f64>> {
    let n = matrix.nrows();
    let schur = Schur::try_new(matrix, f64::EPSILON, MAX_SWEEPS_PER_ROW * n.max(1)).ok_or_else(
        || ReservoirError::SpectralRadius {
            reason: format!("Schur decomposition of the {n}x{n} matrix did not converge"),
        },
    )?;
    let eigenvalues = schur.complex_eigenvalues();
    if eigenvalues.iter().any(|l| !(l.re.is_finite() && l.im.is_finite())) {
        return Err(ReservoirError::SpectralRadius {
            reason: format!("the {n}x{n} matrix has non-finite eigenvalues"),
        });
    }

    Ok(eigenvalues
        .iter()
        .copied()
        .fold(Complex::new(0.0, 0.0), |best, l| if l.norm() > best.norm() { l } else { best }))
}

/// Modulus of the last entry of the unit eigenvector of `h` belonging to `theta`.
/// Falls back to 1 when inverse iteration fails, which reads as not converged.
fn eigenvector_tail(h: &DMatrix<f64>, theta: Complex<f64>) -> f64 {
    let k = h.nrows();
    let mut shifted = h.map(|v| Complex::new(v, 0.0));
    for i in 0..k {
        shifted[(i, i)] -= theta;
    }
    let lu = shifted.lu();

    let mut y = DVector::from_element(k, Complex::new(1.0, 0.0));
    for _ in 0..3 {
        let next = match lu.solve(&y) {
            Some(next) => next,
            None => return 1.0,
        };
        let norm = next.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return 1.0;
        }
        y = next.unscale(norm);
    }

    y[k - 1].norm()
}

/// Arnoldi process with full reorthogonalization.
///
/// After `k` steps `basis` holds `k + 1` orthonormal vectors `v_0 .. v_k` (only `k`
/// once the space is invariant) and `columns[j]` holds the `j + 2` nonzero entries
/// of column `j` of the upper Hessenberg projection.
struct Arnoldi {
    basis: Vec<DVector<f64>>,
    columns: Vec<DVector<f64>>,
}

impl Arnoldi {
    fn new(start: DVector<f64>) -> Self {
        let norm = start.norm();
        Self {
            basis: vec![start / norm],
            columns: Vec::new(),
        }
    }

    #[inline(always)]
    fn steps(&self) -> usize {
        self.columns.len()
    }

    /// Norm of the component of the last product orthogonal to the basis
    fn next_norm(&self) -> f64 {
        self.columns.last().map_or(0.0, |column| column[column.len() - 1])
    }

    /// Step until the space has dimension `dim`.
    /// Returns true if the space turned out invariant under `operator` before that.
    fn extend<F>(&mut self, operator: &F, dim: usize) -> bool
    where
        F: Fn(&DVector<f64>) -> DVector<f64>,
    {
        while self.steps() < dim {
            let j = self.steps();
            let mut w = operator(&self.basis[j]);
            let scale = w.norm();

            // Gram-Schmidt twice
            let mut column = DVector::zeros(j + 2);
            for _ in 0..2 {
                for (i, v) in self.basis.iter().enumerate() {
                    let c = v.dot(&w);
                    w.axpy(-c, v, 1.0);
                    column[i] += c;
                }
            }
            let beta = w.norm();
            column[j + 1] = beta;
            self.columns.push(column);

            if beta <= BREAKDOWN_TOL * scale {
                return true;
            }
            self.basis.push(w / beta);
        }
        false
    }

    /// The square `steps x steps` Hessenberg projection
    fn hessenberg(&self) -> DMatrix<f64> {
        let k = self.steps();
        DMatrix::from_fn(k, k, |i, j| if i <= j + 1 { self.columns[j][i] } else { 0.0 })
    }
}
