use std::{f64::consts::PI, path::Path};

use common::RCParams;
use nanorand::{Rng, WyRand};
use serde::{Deserialize, Serialize};

use crate::{
    io::{read_json, write_json},
    ReservoirError, Result,
};

/// Distribution of the nonzero entries of a randomly generated weight matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightDistribution {
    /// Uniform in [low, high)
    Uniform { low: f64, high: f64 },
    /// Gaussian
    Normal { mean: f64, std_dev: f64 },
}

impl Default for WeightDistribution {
    fn default() -> Self {
        WeightDistribution::Uniform {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl WeightDistribution {
    /// Draw a single weight
    pub fn sample(&self, rng: &mut WyRand) -> f64 {
        match *self {
            WeightDistribution::Uniform { low, high } => low + rng.generate::<f64>() * (high - low),
            WeightDistribution::Normal { mean, std_dev } => {
                // Box-Muller, 1 - u keeps the logarithm finite
                let u1 = 1.0 - rng.generate::<f64>();
                let u2 = rng.generate::<f64>();
                mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
            }
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let valid = match *self {
            WeightDistribution::Uniform { low, high } => {
                low.is_finite() && high.is_finite() && low < high
            }
            WeightDistribution::Normal { mean, std_dev } => {
                mean.is_finite() && std_dev.is_finite() && std_dev >= 0.0
            }
        };
        if valid {
            Ok(())
        } else {
            Err(ReservoirError::InvalidHyperparameters {
                reason: format!("{name} is not a proper distribution: {self:?}"),
            })
        }
    }
}

/// The parameters of the reservoir
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirHyperparameters {
    /// Length of the input vectors
    pub input_size: usize,
    /// Number of nodes in the reservoir
    pub state_size: usize,
    /// Probability that an entry of the recurrent adjacency matrix is zero, in [0, 1).
    /// Each entry is drawn independently, so the realized fraction only matches on average.
    pub adjacency_matrix_sparsity: f64,
    /// Largest eigenvalue magnitude of the adjacency matrix after normalization.
    /// The spectral radius determines how fast the influence of an input
    /// dies out in a reservoir with time, and how stable the reservoir
    /// activations are.
    pub spectral_radius: f64,
    /// Probability that an entry of the input coupling matrix is zero, in [0, 1)
    pub input_coupling_sparsity: f64,
    /// Scales the input coupling weights
    #[serde(default = "default_input_coupling_scaling")]
    pub input_coupling_scaling: f64,
    /// Distribution of the nonzero input coupling weights, before `input_coupling_scaling`
    #[serde(default)]
    pub input_weight_distribution: WeightDistribution,
    /// Distribution of the nonzero adjacency weights, before spectral normalization
    #[serde(default)]
    pub adjacency_weight_distribution: WeightDistribution,
    /// Optional seed for Rng
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_input_coupling_scaling() -> f64 {
    1.0
}

impl ReservoirHyperparameters {
    /// Hyperparameters with uniform [-1, 1) weights, unit input scaling and no seed
    pub fn new(
        input_size: usize,
        state_size: usize,
        adjacency_matrix_sparsity: f64,
        spectral_radius: f64,
        input_coupling_sparsity: f64,
    ) -> Self {
        Self {
            input_size,
            state_size,
            adjacency_matrix_sparsity,
            spectral_radius,
            input_coupling_sparsity,
            input_coupling_scaling: default_input_coupling_scaling(),
            input_weight_distribution: WeightDistribution::default(),
            adjacency_weight_distribution: WeightDistribution::default(),
            seed: None,
        }
    }

    /// Builder style seed setter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every field for a usable value.
    /// The first violation is reported as `InvalidHyperparameters`
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(ReservoirError::InvalidHyperparameters { reason });

        if self.input_size == 0 {
            return invalid("input_size must be positive".to_string());
        }
        if self.state_size == 0 {
            return invalid("state_size must be positive".to_string());
        }
        for (name, sparsity) in [
            ("adjacency_matrix_sparsity", self.adjacency_matrix_sparsity),
            ("input_coupling_sparsity", self.input_coupling_sparsity),
        ] {
            if !(0.0..1.0).contains(&sparsity) {
                return invalid(format!("{name} must be in [0, 1), got {sparsity}"));
            }
        }
        if !(self.spectral_radius.is_finite() && self.spectral_radius > 0.0) {
            return invalid(format!(
                "spectral_radius must be positive, got {}",
                self.spectral_radius
            ));
        }
        if !self.input_coupling_scaling.is_finite() {
            return invalid("input_coupling_scaling must be finite".to_string());
        }
        self.input_weight_distribution.validate("input_weight_distribution")?;
        self.adjacency_weight_distribution.validate("adjacency_weight_distribution")?;

        Ok(())
    }

    /// Read and validate hyperparameters from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let hyperparameters: Self = read_json(path.as_ref())?;
        hyperparameters.validate()?;
        Ok(hyperparameters)
    }

    /// Write the hyperparameters as JSON
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json(path.as_ref(), self)
    }
}

impl RCParams for ReservoirHyperparameters {
    #[inline(always)]
    fn input_size(&self) -> usize {
        self.input_size
    }

    #[inline(always)]
    fn reservoir_size(&self) -> usize {
        self.state_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        ReservoirHyperparameters::new(10, 100, 0.9, 1.0, 0.0).validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let base = ReservoirHyperparameters::new(10, 100, 0.9, 1.0, 0.0);

        let cases = [
            ReservoirHyperparameters {
                input_size: 0,
                ..base.clone()
            },
            ReservoirHyperparameters {
                state_size: 0,
                ..base.clone()
            },
            ReservoirHyperparameters {
                adjacency_matrix_sparsity: 1.0,
                ..base.clone()
            },
            ReservoirHyperparameters {
                input_coupling_sparsity: -0.1,
                ..base.clone()
            },
            ReservoirHyperparameters {
                spectral_radius: 0.0,
                ..base.clone()
            },
            ReservoirHyperparameters {
                spectral_radius: f64::NAN,
                ..base.clone()
            },
            ReservoirHyperparameters {
                input_weight_distribution: WeightDistribution::Uniform {
                    low: 1.0,
                    high: -1.0,
                },
                ..base.clone()
            },
            ReservoirHyperparameters {
                adjacency_weight_distribution: WeightDistribution::Normal {
                    mean: 0.0,
                    std_dev: -1.0,
                },
                ..base.clone()
            },
        ];
        for hp in cases {
            assert!(
                matches!(hp.validate(), Err(ReservoirError::InvalidHyperparameters { .. })),
                "{hp:?} should be rejected"
            );
        }
    }

    #[test]
    fn uniform_samples_stay_in_range() {
        let mut rng = WyRand::new_seed(0);
        let dist = WeightDistribution::Uniform {
            low: -0.5,
            high: 2.0,
        };
        for _ in 0..1000 {
            let v = dist.sample(&mut rng);
            assert!((-0.5..2.0).contains(&v));
        }
    }

    #[test]
    fn normal_samples_have_expected_moments() {
        let mut rng = WyRand::new_seed(0);
        let dist = WeightDistribution::Normal {
            mean: 1.0,
            std_dev: 2.0,
        };
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        assert!((mean - 1.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std_dev {}", var.sqrt());
    }

    #[test]
    fn missing_optional_fields_get_defaults() {
        let json = r#"{
            "input_size": 3,
            "state_size": 20,
            "adjacency_matrix_sparsity": 0.5,
            "spectral_radius": 0.9,
            "input_coupling_sparsity": 0.0
        }"#;
        let hp: ReservoirHyperparameters = serde_json::from_str(json).unwrap();

        assert_eq!(hp, ReservoirHyperparameters::new(3, 20, 0.5, 0.9, 0.0));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperparameters.json");
        let hp = ReservoirHyperparameters {
            input_weight_distribution: WeightDistribution::Normal {
                mean: 0.0,
                std_dev: 0.3,
            },
            ..ReservoirHyperparameters::new(3, 20, 0.5, 0.9, 0.1).with_seed(42)
        };

        hp.to_file(&path).unwrap();

        assert_eq!(ReservoirHyperparameters::from_file(&path).unwrap(), hp);
    }

    #[test]
    fn invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperparameters.json");
        ReservoirHyperparameters::new(3, 0, 0.5, 0.9, 0.1).to_file(&path).unwrap();

        assert!(matches!(
            ReservoirHyperparameters::from_file(&path),
            Err(ReservoirError::InvalidHyperparameters { .. })
        ));
    }
}
