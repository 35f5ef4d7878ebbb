use std::path::Path;

use lin_reg::Regressor;
use nalgebra::{DMatrix, DVector};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    io::{read_json, write_json},
    ReservoirError, Result, StateVector,
};

const READOUT_NAME: &str = "readout.json";

/// Keep the first half of the state as is and square the second half.
/// For odd lengths the squared half is the longer one.
pub fn square_half(state: &StateVector) -> StateVector {
    let half = state.len() / 2;
    let mut squared = state.clone();
    squared.rows_mut(half, state.len() - half).apply(|v| *v = *v * *v);
    squared
}

/// Maps the reservoir state onto outputs through a fitted regressor.
///
/// With `square_half_hidden_state` set, the second half of every state is squared
/// before it reaches the regressor, both when fitting and when predicting.
/// This injects a fixed nonlinearity into an otherwise linear readout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservoirComputingReadout<R> {
    regressor: R,
    square_half_hidden_state: bool,
}

impl<R> ReservoirComputingReadout<R> {
    /// Wrap an unfitted `regressor`.
    /// `square_half_hidden_state` selects whether states pass through `square_half`
    pub fn new(regressor: R, square_half_hidden_state: bool) -> Self {
        Self {
            regressor,
            square_half_hidden_state,
        }
    }

    #[inline(always)]
    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    #[inline(always)]
    pub fn square_half_hidden_state(&self) -> bool {
        self.square_half_hidden_state
    }

    fn transform(&self, state: &StateVector) -> StateVector {
        if self.square_half_hidden_state {
            square_half(state)
        } else {
            state.clone()
        }
    }

    /// Apply the transform to every row of `states`
    fn transform_rows(&self, states: &DMatrix<f64>) -> DMatrix<f64> {
        let mut features = states.clone();
        if self.square_half_hidden_state {
            let half = states.ncols() / 2;
            features.columns_mut(half, states.ncols() - half).apply(|v| *v = *v * *v);
        }
        features
    }
}

impl<R> ReservoirComputingReadout<R>
where
    R: Regressor,
{
    /// Train the readout layer
    ///
    /// # Arguments:
    /// states: One reservoir state per row
    /// targets: The desired output for each state, one per row
    pub fn fit(&mut self, states: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<()> {
        check_samples(states, targets)?;
        let features = self.transform_rows(states);
        self.regressor.fit(&features, targets)?;

        Ok(())
    }

    /// Train on states with extra hybrid features appended after the transformed state
    pub fn fit_hybrid(
        &mut self,
        states: &DMatrix<f64>,
        hybrid_inputs: &DMatrix<f64>,
        targets: &DMatrix<f64>,
    ) -> Result<()> {
        check_samples(states, targets)?;
        check_samples(hybrid_inputs, targets)?;
        let transformed = self.transform_rows(states);

        let features = DMatrix::from_fn(
            states.nrows(),
            states.ncols() + hybrid_inputs.ncols(),
            |i, j| {
                if j < states.ncols() {
                    transformed[(i, j)]
                } else {
                    hybrid_inputs[(i, j - states.ncols())]
                }
            },
        );
        self.regressor.fit(&features, targets)?;

        Ok(())
    }

    /// Predict the outputs for a single state
    pub fn predict(&self, state: &StateVector) -> Result<DVector<f64>> {
        self.predict_features(self.transform(state))
    }

    /// Predict from a single state and its hybrid input
    pub fn predict_hybrid(
        &self,
        state: &StateVector,
        hybrid_input: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let transformed = self.transform(state);
        let features = DVector::from_iterator(
            state.len() + hybrid_input.len(),
            transformed.iter().chain(hybrid_input.iter()).copied(),
        );
        self.predict_features(features)
    }

    fn predict_features(&self, features: DVector<f64>) -> Result<DVector<f64>> {
        let features = DMatrix::from_row_slice(1, features.len(), features.as_slice());
        let pred = self.regressor.predict(&features)?;
        if pred.nrows() != 1 {
            return Err(ReservoirError::DimensionMismatch {
                context: "rows predicted for a single state",
                expected: 1,
                actual: pred.nrows(),
            });
        }

        Ok(pred.row(0).transpose())
    }
}

impl<R> ReservoirComputingReadout<R>
where
    R: Serialize,
{
    /// Write the regressor weights and the transform flag as JSON into the directory `path`
    pub fn dump(&self, path: &Path) -> Result<()> {
        write_json(&path.join(READOUT_NAME), self)
    }
}

impl<R> ReservoirComputingReadout<R>
where
    R: DeserializeOwned,
{
    /// Read a readout written by `dump` from the directory `path`
    pub fn load(path: &Path) -> Result<Self> {
        read_json(&path.join(READOUT_NAME))
    }
}

fn check_samples(features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<()> {
    if features.nrows() != targets.nrows() {
        return Err(ReservoirError::DimensionMismatch {
            context: "samples of readout features and targets",
            expected: targets.nrows(),
            actual: features.nrows(),
        });
    }
    Ok(())
}
