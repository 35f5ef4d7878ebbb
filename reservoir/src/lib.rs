//! Reservoir computing: a fixed, sparse, randomly connected recurrent network
//! driven by inputs, with a trained readout mapping its state onto predictions.

#[macro_use]
extern crate log;

mod error;
mod hybrid;
mod hyperparameters;
mod io;
mod model;
mod readout;
mod reservoir;
mod reservoir_constructor;
mod sparse;
mod spectral;

pub use error::{ReservoirError, Result};
pub use hybrid::HybridReservoirComputingModel;
pub use hyperparameters::{ReservoirHyperparameters, WeightDistribution};
pub use model::ReservoirComputingModel;
pub use readout::{square_half, ReservoirComputingReadout};
pub use reservoir::Reservoir;
pub use reservoir_constructor::{ReservoirConstructor, SparseRandomConstructor};
pub use sparse::SparseTriplets;
pub use spectral::spectral_radius;

pub type StateVector = nalgebra::DVector<f64>;
