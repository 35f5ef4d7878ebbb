use std::path::Path;

use common::ReservoirComputer;
use lin_reg::Regressor;
use nalgebra::{DMatrix, DVector};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    io::{read_json, write_json},
    ReservoirComputingModel, ReservoirError, Result,
};

const HYBRID_VARIABLES_NAME: &str = "hybrid_variables.json";

#[derive(Debug, Serialize, Deserialize)]
struct HybridVariables {
    hybrid_variables: Vec<String>,
}

/// A reservoir model whose readout also sees an external "hybrid" input,
/// e.g. the forecast of a physical model, appended after the reservoir state.
#[derive(Debug, Clone)]
pub struct HybridReservoirComputingModel<R> {
    model: ReservoirComputingModel<R>,
    hybrid_variables: Vec<String>,
}

impl<R> HybridReservoirComputingModel<R> {
    /// Wrap a model whose readout expects `hybrid_variables` after the reservoir state
    pub fn new(model: ReservoirComputingModel<R>, hybrid_variables: Vec<String>) -> Self {
        Self {
            model,
            hybrid_variables,
        }
    }

    #[inline(always)]
    pub fn model(&self) -> &ReservoirComputingModel<R> {
        &self.model
    }

    #[inline(always)]
    pub fn hybrid_variables(&self) -> &[String] {
        &self.hybrid_variables
    }
}

impl<R> HybridReservoirComputingModel<R>
where
    R: Regressor,
{
    /// Read the current state and the given hybrid input through the readout
    pub fn predict(&self, hybrid_input: &DVector<f64>) -> Result<DVector<f64>> {
        self.model.readout().predict_hybrid(self.model.state(), hybrid_input)
    }

    /// Zero the reservoir state
    pub fn reset_state(&mut self) {
        self.model.reset_state();
    }

    /// Advance the reservoir by one input. Hybrid inputs only enter through `predict`
    pub fn increment_state(&mut self, input: &DVector<f64>) -> Result<()> {
        self.model.increment_state(input)
    }

    /// Drive the reservoir through `inputs` in order, stopping at the first rejected one
    pub fn synchronize<'a, I>(&mut self, inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a DVector<f64>>,
    {
        self.model.synchronize(inputs)
    }

    /// Train like `ReservoirComputingModel::train`, with one row of hybrid input per time step
    pub fn train(
        &mut self,
        inputs: &DMatrix<f64>,
        hybrid_inputs: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        n_synchronize: usize,
    ) -> Result<()> {
        if inputs.nrows() != targets.nrows() || hybrid_inputs.nrows() != targets.nrows() {
            return Err(ReservoirError::Training {
                reason: format!(
                    "{} input, {} hybrid input and {} target time steps",
                    inputs.nrows(),
                    hybrid_inputs.nrows(),
                    targets.nrows()
                ),
            });
        }
        let states = self.model.harvest_states(inputs, n_synchronize)?;
        let harvest_len = states.nrows();
        let hybrid_inputs = hybrid_inputs.rows(n_synchronize, harvest_len).into_owned();
        let targets = targets.rows(n_synchronize, harvest_len).into_owned();
        self.model.readout_mut().fit_hybrid(&states, &hybrid_inputs, &targets)?;
        info!("trained hybrid readout on {harvest_len} states");

        Ok(())
    }
}

impl<R> HybridReservoirComputingModel<R>
where
    R: Serialize,
{
    /// Dump the wrapped model and the hybrid variable names into the directory `path`
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.model.dump(path)?;
        write_json(
            &path.join(HYBRID_VARIABLES_NAME),
            &HybridVariables {
                hybrid_variables: self.hybrid_variables.clone(),
            },
        )
    }
}

impl<R> HybridReservoirComputingModel<R>
where
    R: DeserializeOwned,
{
    /// Load a hybrid model written by `dump`. The state starts at zero
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model = ReservoirComputingModel::load(path)?;
        let variables: HybridVariables = read_json(&path.join(HYBRID_VARIABLES_NAME))?;

        Ok(Self::new(model, variables.hybrid_variables))
    }
}
