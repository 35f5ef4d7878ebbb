use std::path::Path;

use common::{RCParams, ReservoirComputer};
use lin_reg::Regressor;
use nalgebra::{DMatrix, DVector};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    io::{read_json, write_json},
    Reservoir, ReservoirComputingReadout, ReservoirError, Result, StateVector,
};

const RESERVOIR_SUBDIR: &str = "reservoir";
const READOUT_SUBDIR: &str = "readout";
const METADATA_NAME: &str = "metadata.json";

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    input_variables: Vec<String>,
    output_variables: Vec<String>,
}

/// A reservoir together with the readout trained on its states
#[derive(Debug, Clone)]
pub struct ReservoirComputingModel<R> {
    input_variables: Vec<String>,
    output_variables: Vec<String>,
    reservoir: Reservoir,
    readout: ReservoirComputingReadout<R>,
}

impl<R> ReservoirComputingModel<R> {
    /// # Arguments
    /// input_variables: names of the quantities making up the reservoir input
    /// output_variables: names of the quantities the readout predicts
    pub fn new(
        input_variables: Vec<String>,
        output_variables: Vec<String>,
        reservoir: Reservoir,
        readout: ReservoirComputingReadout<R>,
    ) -> Self {
        Self {
            input_variables,
            output_variables,
            reservoir,
            readout,
        }
    }

    #[inline(always)]
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    #[inline(always)]
    pub fn output_variables(&self) -> &[String] {
        &self.output_variables
    }

    #[inline(always)]
    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    #[inline(always)]
    pub fn reservoir_mut(&mut self) -> &mut Reservoir {
        &mut self.reservoir
    }

    #[inline(always)]
    pub fn readout(&self) -> &ReservoirComputingReadout<R> {
        &self.readout
    }

    #[inline(always)]
    pub fn readout_mut(&mut self) -> &mut ReservoirComputingReadout<R> {
        &mut self.readout
    }

    /// Drive the reservoir from a zero state through `inputs` (one time step per row)
    /// and collect the states observed after the first `n_synchronize` steps, one per row.
    pub(crate) fn harvest_states(
        &mut self,
        inputs: &DMatrix<f64>,
        n_synchronize: usize,
    ) -> Result<DMatrix<f64>> {
        if n_synchronize >= inputs.nrows() {
            return Err(ReservoirError::Training {
                reason: format!(
                    "{} synchronization steps leave none of the {} time steps to train on",
                    n_synchronize,
                    inputs.nrows()
                ),
            });
        }
        let harvest_len = inputs.nrows() - n_synchronize;

        self.reservoir.reset_state();
        let mut design: DMatrix<f64> =
            DMatrix::zeros(harvest_len, self.reservoir.hyperparameters().state_size);
        for i in 0..inputs.nrows() {
            self.reservoir.increment_state(&inputs.row(i).transpose())?;

            // discard earlier states, the reservoir has to synchronize first
            if i >= n_synchronize {
                design.set_row(i - n_synchronize, &self.reservoir.state().transpose());
            }
        }

        Ok(design)
    }
}

impl<R> ReservoirComputingModel<R>
where
    R: Regressor,
{
    /// Train the readout on the states the true inputs drive the reservoir through.
    ///
    /// Rows are time steps. The state after the input of row `t` is paired with the
    /// target of row `t`, skipping the first `n_synchronize` rows. Afterwards the
    /// reservoir is left synchronized on the whole input sequence.
    pub fn train(
        &mut self,
        inputs: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        n_synchronize: usize,
    ) -> Result<()> {
        if inputs.nrows() != targets.nrows() {
            return Err(ReservoirError::Training {
                reason: format!(
                    "{} input time steps but {} target time steps",
                    inputs.nrows(),
                    targets.nrows()
                ),
            });
        }
        let states = self.harvest_states(inputs, n_synchronize)?;
        let targets = targets.rows(n_synchronize, states.nrows()).into_owned();
        self.readout.fit(&states, &targets)?;
        info!(
            "trained readout on {} states after {} synchronization steps",
            states.nrows(),
            n_synchronize
        );

        Ok(())
    }

    /// Closed loop step: predict, then feed the prediction back in as the next input.
    /// Requires the readout to predict vectors of the reservoir input size.
    pub fn autonomous_step(&mut self) -> Result<DVector<f64>> {
        let prediction = self.predict()?;
        self.reservoir.increment_state(&prediction)?;

        Ok(prediction)
    }
}

impl<R> ReservoirComputingModel<R>
where
    R: Serialize,
{
    /// Write the reservoir, the readout and the metadata into the directory `path`
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.reservoir.dump(&path.join(RESERVOIR_SUBDIR))?;
        self.readout.dump(&path.join(READOUT_SUBDIR))?;
        write_json(
            &path.join(METADATA_NAME),
            &Metadata {
                input_variables: self.input_variables.clone(),
                output_variables: self.output_variables.clone(),
            },
        )?;
        info!("dumped reservoir computing model to {}", path.display());

        Ok(())
    }
}

impl<R> ReservoirComputingModel<R>
where
    R: DeserializeOwned,
{
    /// Load a model written by `dump`, with the reservoir state reset to zeros
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reservoir = Reservoir::load(&path.join(RESERVOIR_SUBDIR))?;
        let readout = ReservoirComputingReadout::load(&path.join(READOUT_SUBDIR))?;
        let metadata: Metadata = read_json(&path.join(METADATA_NAME))?;
        info!("loaded reservoir computing model from {}", path.display());

        Ok(Self::new(
            metadata.input_variables,
            metadata.output_variables,
            reservoir,
            readout,
        ))
    }
}

impl<R> ReservoirComputer for ReservoirComputingModel<R>
where
    R: Regressor,
{
    type Error = ReservoirError;

    #[inline(always)]
    fn params(&self) -> &dyn RCParams {
        self.reservoir.hyperparameters()
    }

    #[inline(always)]
    fn reset_state(&mut self) {
        self.reservoir.reset_state();
    }

    #[inline(always)]
    fn increment_state(&mut self, input: &DVector<f64>) -> Result<()> {
        self.reservoir.increment_state(input)
    }

    #[inline(always)]
    fn synchronize<'a, I>(&mut self, inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a DVector<f64>>,
    {
        self.reservoir.synchronize(inputs)
    }

    /// Read the current state through the readout, leaving the state untouched
    #[inline]
    fn predict(&self) -> Result<DVector<f64>> {
        self.readout.predict(self.reservoir.state())
    }

    #[inline(always)]
    fn state(&self) -> &StateVector {
        self.reservoir.state()
    }
}
