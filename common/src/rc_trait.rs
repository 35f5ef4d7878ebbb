use nalgebra::DVector;

/// The ReservoirComputer trait
///
/// A reservoir computer carries an internal state that is driven by inputs,
/// and a readout that maps that state onto predictions.
/// Results depend on the exact order of the inputs, so a single instance
/// must not be driven from several places at once.
pub trait ReservoirComputer {
    /// The error returned when an input or the readout does not fit the reservoir
    type Error;

    /// The reservoir parameters
    fn params(&self) -> &dyn RCParams;

    /// Set the internal state back to zeros
    fn reset_state(&mut self);

    /// Update the reservoir computer state with the newest observed input
    fn increment_state(&mut self, input: &DVector<f64>) -> Result<(), Self::Error>;

    /// Feed a sequence of inputs in order, keeping only the final state.
    /// Stops at the first input that is rejected, leaving the state where it got to.
    fn synchronize<'a, I>(&mut self, inputs: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = &'a DVector<f64>>,
    {
        for input in inputs {
            self.increment_state(input)?;
        }
        Ok(())
    }

    /// Performs a readout of the current reservoir state
    fn predict(&self) -> Result<DVector<f64>, Self::Error>;

    /// The current internal state
    fn state(&self) -> &DVector<f64>;
}

/// Any reservoir computer parameter struct must implement this.
pub trait RCParams {
    /// Length of the input vectors
    fn input_size(&self) -> usize;

    /// The number of inner nodes (`neurons`) in the network
    fn reservoir_size(&self) -> usize;
}
