//! Regressors mapping reservoir features onto targets

#![warn(missing_docs)]

#[macro_use]
extern crate log;

use nalgebra::DMatrix;

mod error;
mod tikhonov_regularization;

pub use error::{LinRegError, Result};
pub use tikhonov_regularization::TikhonovRegularization;

/// Anything that can be fitted on a design matrix and then used to predict from it.
/// Rows are samples, columns are features (or outputs for targets and predictions).
pub trait Regressor {
    /// Fit the regressor, mapping features to targets
    ///
    /// # Parameters
    /// features: One row per sample
    /// targets: One row per sample, with as many columns as there are outputs
    fn fit(&mut self, features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<()>;

    /// Predict one row of outputs for every row of features
    fn predict(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}
