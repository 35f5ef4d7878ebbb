use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{LinRegError, Regressor, Result};

/// Tikhonov regularization aka ridge regression
/// It is particularly useful to mitigate the problem of multicollinearity in
/// linear regression.
/// The intercept is fitted alongside the coefficients but is not penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikhonovRegularization {
    /// Ridge parameter
    pub regularization_coeff: f64,
    weights: Option<LinearWeights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearWeights {
    /// n_features x n_outputs
    coefficients: DMatrix<f64>,
    /// One per output
    intercepts: DVector<f64>,
}

impl TikhonovRegularization {
    /// An unfitted ridge regressor
    pub fn new(regularization_coeff: f64) -> Self {
        Self {
            regularization_coeff,
            weights: None,
        }
    }

    /// A regressor that is already fitted with the given weights
    ///
    /// # Arguments
    /// coefficients: n_features rows and n_outputs columns
    /// intercepts: one entry per output
    pub fn from_coefficients(coefficients: DMatrix<f64>, intercepts: DVector<f64>) -> Result<Self> {
        if coefficients.ncols() != intercepts.len() {
            return Err(LinRegError::ShapeMismatch {
                reason: format!(
                    "{} coefficient columns but {} intercepts",
                    coefficients.ncols(),
                    intercepts.len()
                ),
            });
        }
        Ok(Self {
            regularization_coeff: 0.0,
            weights: Some(LinearWeights {
                coefficients,
                intercepts,
            }),
        })
    }

    /// The fitted coefficients, if any
    #[inline(always)]
    pub fn coefficients(&self) -> Option<&DMatrix<f64>> {
        self.weights.as_ref().map(|w| &w.coefficients)
    }

    /// The fitted intercepts, if any
    #[inline(always)]
    pub fn intercepts(&self) -> Option<&DVector<f64>> {
        self.weights.as_ref().map(|w| &w.intercepts)
    }
}

impl Regressor for TikhonovRegularization {
    fn fit(&mut self, features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<()> {
        if features.nrows() != targets.nrows() {
            return Err(LinRegError::ShapeMismatch {
                reason: format!(
                    "{} feature samples but {} target samples",
                    features.nrows(),
                    targets.nrows()
                ),
            });
        }
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(LinRegError::EmptyDesign);
        }
        let n_features = features.ncols();

        // first column being just ones, for the intercept
        let design = features.clone().insert_column(0, 1.0);

        let dim = n_features + 1;
        let mut reg_m: DMatrix<f64> =
            DMatrix::from_diagonal_element(dim, dim, self.regularization_coeff);
        reg_m[(0, 0)] = 0.0;

        let p0 = design.transpose() * &design + reg_m;
        let p1 = design.transpose() * targets;
        let solution = p0.lu().solve(&p1).ok_or(LinRegError::SingularSystem)?;
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(LinRegError::SingularSystem);
        }

        let intercepts = solution.row(0).transpose();
        let coefficients = solution.rows(1, n_features).into_owned();
        debug!(
            "fitted ridge readout: {} samples, {} features, {} outputs",
            features.nrows(),
            n_features,
            targets.ncols()
        );

        self.weights = Some(LinearWeights {
            coefficients,
            intercepts,
        });

        Ok(())
    }

    fn predict(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let weights = self.weights.as_ref().ok_or(LinRegError::NotFitted)?;
        if features.ncols() != weights.coefficients.nrows() {
            return Err(LinRegError::ShapeMismatch {
                reason: format!(
                    "fitted on {} features, got {}",
                    weights.coefficients.nrows(),
                    features.ncols()
                ),
            });
        }

        let mut pred = features * &weights.coefficients;
        for (j, intercept) in weights.intercepts.iter().enumerate() {
            pred.column_mut(j).add_scalar_mut(*intercept);
        }

        Ok(pred)
    }
}

#[cfg(test)]
mod tests {
    use round::round;

    use super::*;

    #[test]
    fn tikhonov_regularization() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let features: DMatrix<f64> =
            DMatrix::from_vec(4, 2, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 2.0]);
        let targets: DMatrix<f64> = DMatrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]);
        info!("features: {}, targets: {}", features, targets);

        let mut regressor = TikhonovRegularization::new(0.0);
        regressor.fit(&features, &targets).unwrap();

        let mut coefficients = regressor.coefficients().unwrap().clone();
        coefficients.iter_mut().for_each(|v| *v = round(*v, 1));
        info!("coefficients: {}", coefficients);

        assert_eq!(coefficients, DMatrix::from_vec(2, 1, vec![1.0, 0.0]));
        assert_eq!(round(regressor.intercepts().unwrap()[0], 1), 1.0);
    }

    #[test]
    fn tikhonov_regularization_shifted() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let features: DMatrix<f64> =
            DMatrix::from_vec(4, 2, vec![0.0, 100.0, 200.0, 300.0, 0.0, 0.0, 100.0, 200.0]);
        let targets: DMatrix<f64> = DMatrix::from_vec(4, 1, vec![100.0, 200.0, 300.0, 400.0]);

        let mut regressor = TikhonovRegularization::new(0.0);
        regressor.fit(&features, &targets).unwrap();

        let mut coefficients = regressor.coefficients().unwrap().clone();
        coefficients.iter_mut().for_each(|v| *v = round(*v, 1));

        assert_eq!(coefficients, DMatrix::from_vec(2, 1, vec![1.0, 0.0]));
        assert_eq!(round(regressor.intercepts().unwrap()[0], 1), 100.0);
    }

    #[test]
    fn ridge_penalty_shrinks_coefficients() {
        let features: DMatrix<f64> =
            DMatrix::from_vec(5, 1, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        let targets: DMatrix<f64> = DMatrix::from_vec(5, 1, vec![-4.0, -2.0, 0.0, 2.0, 4.0]);

        let mut plain = TikhonovRegularization::new(0.0);
        plain.fit(&features, &targets).unwrap();
        let mut ridge = TikhonovRegularization::new(10.0);
        ridge.fit(&features, &targets).unwrap();

        let plain_coef = plain.coefficients().unwrap()[(0, 0)];
        let ridge_coef = ridge.coefficients().unwrap()[(0, 0)];
        assert_eq!(round(plain_coef, 6), 2.0);
        // x'x = 10, so the ridge solution is 20 / (10 + 10)
        assert_eq!(round(ridge_coef, 6), 1.0);
    }

    /// Tests how to perform a readout from a single state with given weights
    #[test]
    fn readout_from_state() {
        let regressor = TikhonovRegularization::from_coefficients(
            DMatrix::from_vec(2, 1, vec![1.0, 0.0]),
            DVector::from_vec(vec![1.0]),
        )
        .unwrap();

        let state: DMatrix<f64> = DMatrix::from_row_slice(1, 2, &[3.0, 2.0]);
        let o = regressor.predict(&state).unwrap();
        info!("o: {}", o);

        assert_eq!(o, DMatrix::from_vec(1, 1, vec![4.0]));
    }

    #[test]
    fn multiple_outputs_get_their_own_intercept() {
        let regressor = TikhonovRegularization::from_coefficients(
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]),
            DVector::from_vec(vec![10.0, 20.0]),
        )
        .unwrap();

        let features: DMatrix<f64> = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let pred = regressor.predict(&features).unwrap();

        assert_eq!(pred, DMatrix::from_row_slice(2, 2, &[14.0, 26.0, 13.0, 24.0]));
    }

    #[test]
    fn predict_before_fit_fails() {
        let regressor = TikhonovRegularization::new(0.1);
        let features: DMatrix<f64> = DMatrix::zeros(1, 3);

        assert!(matches!(regressor.predict(&features), Err(LinRegError::NotFitted)));
    }

    #[test]
    fn mismatched_sample_counts_fail() {
        let mut regressor = TikhonovRegularization::new(0.1);
        let features: DMatrix<f64> = DMatrix::zeros(4, 3);
        let targets: DMatrix<f64> = DMatrix::zeros(3, 1);

        assert!(matches!(
            regressor.fit(&features, &targets),
            Err(LinRegError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn wrong_feature_count_fails() {
        let regressor = TikhonovRegularization::from_coefficients(
            DMatrix::zeros(3, 1),
            DVector::zeros(1),
        )
        .unwrap();
        let features: DMatrix<f64> = DMatrix::zeros(1, 4);

        assert!(matches!(regressor.predict(&features), Err(LinRegError::ShapeMismatch { .. })));
    }

    #[test]
    fn weights_survive_serialization() {
        let mut regressor = TikhonovRegularization::new(1e-3);
        let features: DMatrix<f64> = DMatrix::from_fn(10, 3, |i, j| ((i * 3 + j) as f64).sin());
        let targets: DMatrix<f64> = DMatrix::from_fn(10, 2, |i, j| ((i + j) as f64).cos());
        regressor.fit(&features, &targets).unwrap();

        let json = serde_json::to_string(&regressor).unwrap();
        let restored: TikhonovRegularization = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.coefficients(), regressor.coefficients());
        assert_eq!(restored.intercepts(), regressor.intercepts());
        assert_eq!(restored.predict(&features).unwrap(), regressor.predict(&features).unwrap());
    }
}
