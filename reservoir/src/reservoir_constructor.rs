use nalgebra_sparse::{CooMatrix, CsrMatrix};
use nanorand::{Rng, WyRand};

use crate::{spectral_radius, ReservoirError, ReservoirHyperparameters, Result, WeightDistribution};

/// Provides the abstraction needed for custom implementations of the reservoir generation process
pub trait ReservoirConstructor {
    /// The `state_size x input_size` coupling of inputs into the state
    fn construct_input_coupling(
        &mut self,
        hyperparameters: &ReservoirHyperparameters,
    ) -> Result<CsrMatrix<f64>>;

    /// The `state_size x state_size` recurrent adjacency matrix
    fn construct_adjacency(
        &mut self,
        hyperparameters: &ReservoirHyperparameters,
    ) -> Result<CsrMatrix<f64>>;
}

/// Draws sparse random weights from the given generator and normalizes the
/// adjacency matrix to the configured spectral radius
pub struct SparseRandomConstructor<'a> {
    rng: &'a mut WyRand,
}

impl<'a> SparseRandomConstructor<'a> {
    /// Borrow `rng` for every weight drawn by this constructor
    pub fn new(rng: &'a mut WyRand) -> Self {
        Self { rng }
    }

    fn sample_sparse(
        &mut self,
        nrows: usize,
        ncols: usize,
        sparsity: f64,
        distribution: &WeightDistribution,
        scaling: f64,
    ) -> CsrMatrix<f64> {
        let density = 1.0 - sparsity;
        let mut coo = CooMatrix::new(nrows, ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                if self.rng.generate::<f64>() < density {
                    coo.push(i, j, distribution.sample(self.rng) * scaling);
                }
            }
        }
        CsrMatrix::from(&coo)
    }
}

impl<'a> ReservoirConstructor for SparseRandomConstructor<'a> {
    fn construct_input_coupling(
        &mut self,
        hyperparameters: &ReservoirHyperparameters,
    ) -> Result<CsrMatrix<f64>> {
        Ok(self.sample_sparse(
            hyperparameters.state_size,
            hyperparameters.input_size,
            hyperparameters.input_coupling_sparsity,
            &hyperparameters.input_weight_distribution,
            hyperparameters.input_coupling_scaling,
        ))
    }

    fn construct_adjacency(
        &mut self,
        hyperparameters: &ReservoirHyperparameters,
    ) -> Result<CsrMatrix<f64>> {
        let mut adjacency = self.sample_sparse(
            hyperparameters.state_size,
            hyperparameters.state_size,
            hyperparameters.adjacency_matrix_sparsity,
            &hyperparameters.adjacency_weight_distribution,
            1.0,
        );

        let spec_rad = spectral_radius(&adjacency)?;
        if spec_rad <= 0.0 {
            return Err(ReservoirError::SpectralRadius {
                reason: format!(
                    "sampled adjacency matrix ({} nonzeros) has no nonzero eigenvalue, \
                     try a lower adjacency_matrix_sparsity",
                    adjacency.nnz()
                ),
            });
        }
        let factor = hyperparameters.spectral_radius / spec_rad;
        adjacency.values_mut().iter_mut().for_each(|v| *v *= factor);

        Ok(adjacency)
    }
}
