use thiserror::Error;

/// Result type alias of the regressors
pub type Result<T> = std::result::Result<T, LinRegError>;

/// Errors that can occur while fitting or evaluating a regressor
#[derive(Debug, Error)]
pub enum LinRegError {
    /// Dimensions of the given matrices do not fit together
    #[error("shape mismatch: {reason}")]
    ShapeMismatch {
        /// What did not match
        reason: String,
    },

    /// `predict` was called before `fit`
    #[error("regressor has not been fitted yet")]
    NotFitted,

    /// The regularized normal equations could not be solved
    #[error("normal equations are singular, consider a larger regularization coefficient")]
    SingularSystem,

    /// Fitting requires at least one sample and one feature
    #[error("cannot fit on an empty design matrix")]
    EmptyDesign,
}
