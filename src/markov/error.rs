//! Chain definition errors.

use crate::symbol::Symbol;
use thiserror::Error;

/// Problems found while validating the rows of a chain.
///
/// These are expected outcomes of building a chain from untrusted data, so
/// they are returned as values and accumulated rather than stopping at the
/// first one.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    #[error("State '{state}' has more than one row")]
    DuplicateRow { state: Symbol },

    #[error("Row '{from}' lists target '{to}' more than once")]
    DuplicateTarget { from: Symbol, to: Symbol },

    #[error("Probability {probability} of '{from}' -> '{to}' is outside [0, 1]")]
    InvalidProbability {
        from: Symbol,
        to: Symbol,
        probability: f64,
    },

    #[error("Row '{state}' sums to {sum}, expected 0.0 or 1.0")]
    InvalidRowSum { state: Symbol, sum: f64 },

    #[error("Row '{from}' references unknown state '{to}'")]
    UnknownTarget { from: Symbol, to: Symbol },
}
