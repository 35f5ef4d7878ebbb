use std::path::Path;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use nanorand::WyRand;

use crate::{
    io::{read_json, write_json},
    ReservoirConstructor, ReservoirError, ReservoirHyperparameters, Result, SparseRandomConstructor,
    SparseTriplets, StateVector,
};

const HYPERPARAMETERS_NAME: &str = "hyperparameters.json";
const W_IN_NAME: &str = "w_in.json";
const W_RES_NAME: &str = "w_res.json";

/// A fixed, sparsely and randomly connected recurrent network.
/// Its state follows `state <- tanh(W_res * state + W_in * input)`.
#[derive(Debug, Clone)]
pub struct Reservoir {
    hyperparameters: ReservoirHyperparameters,
    /// state_size x input_size
    w_in: CsrMatrix<f64>,
    /// state_size x state_size, normalized to the configured spectral radius
    w_res: CsrMatrix<f64>,
    state: StateVector,
}

impl Reservoir {
    /// Create a new reservoir, with random initialization drawn from `rng`
    pub fn new(hyperparameters: ReservoirHyperparameters, rng: &mut WyRand) -> Result<Self> {
        Self::with_constructor(hyperparameters, SparseRandomConstructor::new(rng))
    }

    /// Create a new reservoir seeded from `hyperparameters.seed`, or from entropy if unset
    pub fn from_seed(hyperparameters: ReservoirHyperparameters) -> Result<Self> {
        let mut rng = match hyperparameters.seed {
            Some(seed) => WyRand::new_seed(seed),
            None => WyRand::new(),
        };
        Self::new(hyperparameters, &mut rng)
    }

    /// Create a new reservoir whose matrices come from `constructor`
    pub fn with_constructor<C>(
        hyperparameters: ReservoirHyperparameters,
        mut constructor: C,
    ) -> Result<Self>
    where
        C: ReservoirConstructor,
    {
        hyperparameters.validate()?;
        let w_in = constructor.construct_input_coupling(&hyperparameters)?;
        let w_res = constructor.construct_adjacency(&hyperparameters)?;

        Self::from_matrices(hyperparameters, w_in, w_res)
    }

    /// Assemble a reservoir from existing matrices, with a zero state.
    /// The adjacency matrix is used as given, without normalization.
    pub fn from_matrices(
        hyperparameters: ReservoirHyperparameters,
        w_in: CsrMatrix<f64>,
        w_res: CsrMatrix<f64>,
    ) -> Result<Self> {
        hyperparameters.validate()?;
        let n = hyperparameters.state_size;
        let checks = [
            ("input coupling rows", n, w_in.nrows()),
            ("input coupling columns", hyperparameters.input_size, w_in.ncols()),
            ("adjacency rows", n, w_res.nrows()),
            ("adjacency columns", n, w_res.ncols()),
        ];
        for (context, expected, actual) in checks {
            if expected != actual {
                return Err(ReservoirError::DimensionMismatch {
                    context,
                    expected,
                    actual,
                });
            }
        }
        info!(
            "reservoir with {} nodes, {} inputs, {} input couplings and {} adjacencies",
            n,
            hyperparameters.input_size,
            w_in.nnz(),
            w_res.nnz()
        );

        Ok(Self {
            hyperparameters,
            w_in,
            w_res,
            state: StateVector::zeros(n),
        })
    }

    #[inline(always)]
    pub fn hyperparameters(&self) -> &ReservoirHyperparameters {
        &self.hyperparameters
    }

    #[inline(always)]
    pub fn w_in(&self) -> &CsrMatrix<f64> {
        &self.w_in
    }

    #[inline(always)]
    pub fn w_res(&self) -> &CsrMatrix<f64> {
        &self.w_res
    }

    #[inline(always)]
    pub fn state(&self) -> &StateVector {
        &self.state
    }

    /// Overwrite the internal state, e.g. to resume from a stored state
    pub fn set_state(&mut self, state: StateVector) -> Result<()> {
        if state.len() != self.hyperparameters.state_size {
            return Err(ReservoirError::DimensionMismatch {
                context: "reservoir state",
                expected: self.hyperparameters.state_size,
                actual: state.len(),
            });
        }
        self.state = state;
        Ok(())
    }

    /// Resets the state to zeros
    pub fn reset_state(&mut self) {
        self.state = StateVector::zeros(self.hyperparameters.state_size);
    }

    /// Advance the state by one step of the given input
    pub fn increment_state(&mut self, input: &DVector<f64>) -> Result<()> {
        if input.len() != self.hyperparameters.input_size {
            return Err(ReservoirError::DimensionMismatch {
                context: "reservoir input",
                expected: self.hyperparameters.input_size,
                actual: input.len(),
            });
        }

        let mut state = &self.w_res * &self.state + &self.w_in * input;
        state.apply(|v| *v = v.tanh());
        self.state = state;
        trace!("state norm after increment: {}", self.state.norm());

        Ok(())
    }

    /// Feed the inputs in order, keeping only the final state
    pub fn synchronize<'a, I>(&mut self, inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a DVector<f64>>,
    {
        let mut steps = 0;
        for input in inputs {
            self.increment_state(input)?;
            steps += 1;
        }
        debug!("synchronized reservoir over {steps} steps");

        Ok(())
    }

    /// Write hyperparameters and both matrices into the directory `path`
    pub fn dump(&self, path: &Path) -> Result<()> {
        write_json(&path.join(HYPERPARAMETERS_NAME), &self.hyperparameters)?;
        write_json(&path.join(W_IN_NAME), &SparseTriplets::from(&self.w_in))?;
        write_json(&path.join(W_RES_NAME), &SparseTriplets::from(&self.w_res))?;

        Ok(())
    }

    /// Restore a reservoir written by `dump`. The state starts out as zeros.
    pub fn load(path: &Path) -> Result<Self> {
        let hyperparameters: ReservoirHyperparameters =
            read_json(&path.join(HYPERPARAMETERS_NAME))?;
        let w_in: SparseTriplets = read_json(&path.join(W_IN_NAME))?;
        let w_res: SparseTriplets = read_json(&path.join(W_RES_NAME))?;

        let n = hyperparameters.state_size;
        if (w_in.nrows, w_in.ncols) != (n, hyperparameters.input_size)
            || (w_res.nrows, w_res.ncols) != (n, n)
        {
            return Err(ReservoirError::Format {
                reason: format!(
                    "stored shapes {}x{} and {}x{} do not fit {} inputs and {} nodes",
                    w_in.nrows, w_in.ncols, w_res.nrows, w_res.ncols, hyperparameters.input_size, n
                ),
            });
        }

        Self::from_matrices(hyperparameters, w_in.try_into()?, w_res.try_into()?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use nalgebra::DMatrix;
    use round::round;

    use super::*;
    use crate::spectral_radius;

    fn ones(nrows: usize, ncols: usize) -> CsrMatrix<f64> {
        CsrMatrix::from(&DMatrix::from_element(nrows, ncols, 1.0))
    }

    #[test]
    fn adjacency_is_normalized_to_spectral_radius() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let hp = ReservoirHyperparameters::new(3, 100, 0.9, 0.8, 0.0).with_seed(0);
        let reservoir = Reservoir::from_seed(hp).unwrap();

        let spec_rad = spectral_radius(reservoir.w_res()).unwrap();
        assert!((spec_rad - 0.8).abs() / 0.8 < 1e-6, "spectral radius {spec_rad}");
    }

    #[test]
    fn large_reservoir_is_normalized_quickly() {
        let hp = ReservoirHyperparameters::new(15, 1000, 0.9, 1.0, 0.0).with_seed(0);

        let t0 = Instant::now();
        let reservoir = Reservoir::from_seed(hp).unwrap();
        let elapsed = t0.elapsed();
        info!("built 1000 node reservoir in {}ms", elapsed.as_millis());

        let spec_rad = spectral_radius(reservoir.w_res()).unwrap();
        assert!((spec_rad - 1.0).abs() < 1e-6, "spectral radius {spec_rad}");
        assert!(elapsed.as_millis() < 1000, "construction took {}ms", elapsed.as_millis());
    }

    #[test]
    fn starts_from_zero_state() {
        let hp = ReservoirHyperparameters::new(3, 20, 0.5, 1.0, 0.0).with_seed(0);
        let reservoir = Reservoir::from_seed(hp).unwrap();

        assert_eq!(reservoir.state(), &StateVector::zeros(20));
    }

    #[test]
    fn increment_with_ones() {
        let hp = ReservoirHyperparameters::new(2, 3, 0.0, 1.0, 0.0);
        let mut reservoir = Reservoir::from_matrices(hp, ones(3, 2), ones(3, 3)).unwrap();

        reservoir.increment_state(&DVector::from_vec(vec![0.5, 0.5])).unwrap();
        let expected = 1.0_f64.tanh();
        assert!(reservoir.state().iter().all(|v| *v == expected));

        // second step: tanh(3 * tanh(1) + 1)
        reservoir.increment_state(&DVector::from_vec(vec![0.5, 0.5])).unwrap();
        let expected = (3.0 * 1.0_f64.tanh() + 1.0).tanh();
        assert!(reservoir.state().iter().all(|v| round(*v - expected, 12) == 0.0));
    }

    #[test]
    fn state_stays_bounded() {
        let hp = ReservoirHyperparameters::new(2, 50, 0.5, 1.5, 0.0).with_seed(5);
        let mut reservoir = Reservoir::from_seed(hp).unwrap();
        let input = DVector::from_vec(vec![100.0, -100.0]);

        for _ in 0..20 {
            reservoir.increment_state(&input).unwrap();
            assert!(reservoir.state().iter().all(|v| v.abs() <= 1.0));
        }
    }

    #[test]
    fn zero_input_on_zero_state_keeps_zero_state() {
        let hp = ReservoirHyperparameters::new(2, 10, 0.5, 1.0, 0.0).with_seed(1);
        let mut reservoir = Reservoir::from_seed(hp).unwrap();

        reservoir.increment_state(&DVector::zeros(2)).unwrap();
        assert_eq!(reservoir.state(), &StateVector::zeros(10));
    }

    #[test]
    fn wrong_input_length_is_rejected() {
        let hp = ReservoirHyperparameters::new(2, 10, 0.5, 1.0, 0.0).with_seed(1);
        let mut reservoir = Reservoir::from_seed(hp).unwrap();

        let res = reservoir.increment_state(&DVector::zeros(3));
        assert!(matches!(
            res,
            Err(ReservoirError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
        assert_eq!(reservoir.state(), &StateVector::zeros(10));
    }

    #[test]
    fn synchronize_equals_repeated_increments() {
        let hp = ReservoirHyperparameters::new(2, 30, 0.7, 0.9, 0.0).with_seed(2);
        let mut a = Reservoir::from_seed(hp).unwrap();
        let mut b = a.clone();
        let inputs: Vec<DVector<f64>> =
            (0..10).map(|i| DVector::from_vec(vec![(i as f64).sin(), 1.0])).collect();

        a.synchronize(&inputs).unwrap();
        for input in &inputs {
            b.increment_state(input).unwrap();
        }

        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn reset_returns_to_zero_state() {
        let hp = ReservoirHyperparameters::new(2, 30, 0.7, 0.9, 0.0).with_seed(2);
        let mut reservoir = Reservoir::from_seed(hp).unwrap();
        reservoir.increment_state(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
        assert_ne!(reservoir.state(), &StateVector::zeros(30));

        reservoir.reset_state();
        assert_eq!(reservoir.state(), &StateVector::zeros(30));
    }

    #[test]
    fn mismatched_matrices_are_rejected() {
        let hp = ReservoirHyperparameters::new(2, 3, 0.0, 1.0, 0.0);

        assert!(matches!(
            Reservoir::from_matrices(hp, ones(3, 4), ones(3, 3)),
            Err(ReservoirError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn too_sparse_adjacency_fails_at_construction() {
        // a single node with sparsity close to one almost surely has no self loop
        let hp = ReservoirHyperparameters::new(1, 1, 0.999_999, 1.0, 0.0);
        let mut rng = WyRand::new_seed(0);

        assert!(matches!(
            Reservoir::new(hp, &mut rng),
            Err(ReservoirError::SpectralRadius { .. })
        ));
    }

    #[test]
    fn dump_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let hp = ReservoirHyperparameters::new(4, 60, 0.8, 1.0, 0.3).with_seed(9);
        let reservoir = Reservoir::from_seed(hp).unwrap();

        reservoir.dump(dir.path()).unwrap();
        let loaded = Reservoir::load(dir.path()).unwrap();

        assert_eq!(loaded.hyperparameters(), reservoir.hyperparameters());
        assert_eq!(loaded.w_in(), reservoir.w_in());
        assert_eq!(loaded.w_res(), reservoir.w_res());
    }
}
