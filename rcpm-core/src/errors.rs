use crate::FloatValue;
use thiserror::Error;

/// Error type for invalid operations.
///
/// Every variant is fatal: each one indicates an inconsistent model
/// configuration or a caller protocol violation, never a transient
/// condition, so the daily step is aborted and nothing is retried.
#[derive(Error, Debug)]
pub enum RcpmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{organ}: {resource} allocation of {amount} offered where demand is zero")]
    InvalidAllocation {
        organ: String,
        resource: &'static str,
        amount: FloatValue,
    },

    #[error("{organ}: {flow} of {amount} exceeds the declared supply of {supply}")]
    AllocationOverflow {
        organ: String,
        flow: &'static str,
        amount: FloatValue,
        supply: FloatValue,
    },

    #[error("{organ}: distributed dry matter {distributed} does not match the requested total {requested}")]
    AllocationMismatch {
        organ: String,
        distributed: FloatValue,
        requested: FloatValue,
    },

    #[error("{organ}: distributed nitrogen {distributed} does not match the allocated total {allocated}")]
    NAllocationMismatch {
        organ: String,
        distributed: FloatValue,
        allocated: FloatValue,
    },

    #[error("{organ}: cannot partition {amount} across a zero total weight")]
    Partition { organ: String, amount: FloatValue },

    #[error("{organ}: computed {quantity} is negative ({value})")]
    NegativeFlow {
        organ: String,
        quantity: &'static str,
        value: FloatValue,
    },
}

/// Convenience type for `Result<T, RcpmError>`.
pub type RcpmResult<T> = Result<T, RcpmError>;
