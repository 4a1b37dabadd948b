//! Error taxonomy of the calculation core.
//!
//! Every fallible operation returns [`PowerGridError`]. Errors raised while one
//! scenario of a batch is processed are collected into a [`BatchError`] by the
//! batch engine, and every error is turned into a poll-able code and message at
//! the foreign boundary (see [`crate::handle`]).

use std::fmt;

use derive_more::{Deref, Display, IntoIterator};
use tabled::{Table, Tabled, settings::Style};
use thiserror::Error;

use crate::meta_data::{ID, Idx};

/// Coarse classification of a [`PowerGridError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Malformed dataset or buffer shape.
    #[display("shape")]
    Shape,
    /// Unknown dataset, component, attribute or object id.
    #[display("not found")]
    NotFound,
    /// Duplicate or mistyped identifier at model construction.
    #[display("conflict")]
    Conflict,
    /// Calculation type, method or strategy combination that is not implemented.
    #[display("unsupported configuration")]
    UnsupportedConfiguration,
    /// Iterative solve did not converge, or the linear system could not be factorized.
    #[display("convergence")]
    Convergence,
    /// Aggregate of per-scenario failures.
    #[display("batch")]
    Batch,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerGridError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Cannot find {kind} with name: {name}")]
    NameNotFound { kind: &'static str, name: String },

    #[error("The id cannot be found: {0}")]
    IdNotFound(ID),

    #[error("Conflicting id detected: {0}")]
    ConflictId(ID),

    #[error("Wrong type for object with id {0}")]
    IdWrongType(ID),

    #[error("{what} is not implemented for {value}!")]
    NotImplemented { what: &'static str, value: String },

    #[error("The calculation method is invalid for this calculation!")]
    InvalidCalculationMethod,

    #[error(
        "Iteration failed to converge after {iterations} iterations! Max deviation: {max_deviation}, error tolerance: {tolerance}."
    )]
    IterationDiverge {
        iterations: usize,
        max_deviation: f64,
        tolerance: f64,
    },

    #[error("Sparse matrix error, possibly singular matrix! {0}")]
    SparseMatrix(String),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl PowerGridError {
    pub(crate) fn dataset(msg: impl Into<String>) -> Self {
        PowerGridError::Dataset(msg.into())
    }

    pub(crate) fn name_not_found(kind: &'static str, name: &str) -> Self {
        PowerGridError::NameNotFound {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn not_implemented(what: &'static str, value: impl fmt::Display) -> Self {
        PowerGridError::NotImplemented {
            what,
            value: value.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PowerGridError::Dataset(_) => ErrorKind::Shape,
            PowerGridError::NameNotFound { .. } | PowerGridError::IdNotFound(_) => {
                ErrorKind::NotFound
            }
            PowerGridError::ConflictId(_) | PowerGridError::IdWrongType(_) => ErrorKind::Conflict,
            PowerGridError::NotImplemented { .. } | PowerGridError::InvalidCalculationMethod => {
                ErrorKind::UnsupportedConfiguration
            }
            PowerGridError::IterationDiverge { .. } | PowerGridError::SparseMatrix(_) => {
                ErrorKind::Convergence
            }
            PowerGridError::Batch(_) => ErrorKind::Batch,
        }
    }
}

/// One failed scenario of a batch calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedScenario {
    pub scenario: Idx,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Tabled)]
struct FailedScenarioRow {
    scenario: Idx,
    kind: ErrorKind,
    message: String,
}

/// Aggregate error of a batch calculation.
///
/// Produced only when at least one scenario failed. The failures are kept in
/// ascending scenario order regardless of the order in which workers finished.
#[derive(Debug, Clone, PartialEq, Deref, IntoIterator)]
pub struct BatchError {
    #[into_iterator(owned, ref)]
    failed: Vec<FailedScenario>,
}

impl BatchError {
    pub fn new(mut failed: Vec<FailedScenario>) -> Self {
        failed.sort_by_key(|f| f.scenario);
        Self { failed }
    }

    pub fn n_failed_scenarios(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_scenarios(&self) -> &[FailedScenario] {
        &self.failed
    }

    pub fn summary(&self) -> String {
        let rows = self.failed.iter().map(|f| FailedScenarioRow {
            scenario: f.scenario,
            kind: f.kind,
            message: f.message.clone(),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "There are errors in the batch calculation.")?;
        f.write_str(&self.summary())
    }
}

impl std::error::Error for BatchError {}

pub type Result<T, E = PowerGridError> = std::result::Result<T, E>;
