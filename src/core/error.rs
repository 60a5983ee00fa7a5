use thiserror::Error;

/// Run-level failures. Either one aborts the run before any trial is sampled.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid configuration `{parameter}`: {message}")]
    Configuration {
        parameter: &'static str,
        message: String,
    },

    #[error("invalid price data: {message}")]
    Data { message: String },
}

impl SimulationError {
    pub(crate) fn config(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            parameter,
            message: message.into(),
        }
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }
}

/// Why a single trial was discarded. Never fatal to a run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTrial {
    #[error("window [{start}, {end}] exceeds series of {len} prices")]
    WindowOutOfRange { start: usize, end: usize, len: usize },

    #[error("window holds {actual} prices, expected {expected}")]
    TruncatedWindow { expected: usize, actual: usize },

    #[error("non-finite daily return at window offset {offset}")]
    NonFiniteReturn { offset: usize },

    #[error("trial request out of domain: {field}")]
    InvalidRequest { field: &'static str },
}
