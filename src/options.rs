//! Calculation options.
//!
//! [`Options`] keeps the raw integer codes the foreign interface passes in.
//! [`Options::resolve`] turns them into a validated [`CalculationConfig`].

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PowerGridError, Result},
    meta_data::{Idx, IntS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(i8)]
pub enum CalculationType {
    PowerFlow = 0,
    StateEstimation = 1,
    ShortCircuit = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(i8)]
pub enum CalculationMethod {
    DefaultMethod = -128,
    Linear = 0,
    NewtonRaphson = 1,
    IterativeLinear = 2,
    IterativeCurrent = 3,
    LinearCurrent = 4,
    Iec60909 = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(i8)]
pub enum TapChangingStrategy {
    Disabled = 0,
    AnyValidTap = 1,
    MaxVoltageTap = 2,
    MinVoltageTap = 3,
    FastAnyTap = 4,
}

/// How batch scenarios are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threading {
    Sequential,
    /// One worker per available hardware thread.
    Auto,
    Workers(usize),
}

impl Threading {
    pub fn from_code(code: Idx) -> Self {
        match code {
            0 => Threading::Sequential,
            n if n < 0 => Threading::Auto,
            n => Threading::Workers(usize::try_from(n).unwrap_or(1)),
        }
    }

    /// Number of workers to run; 1 means run sequentially.
    pub fn n_workers(self) -> usize {
        match self {
            Threading::Sequential => 1,
            Threading::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Threading::Workers(n) => n.max(1),
        }
    }
}

fn default_calculation_type() -> IntS {
    CalculationType::PowerFlow as IntS
}
fn default_calculation_method() -> IntS {
    CalculationMethod::NewtonRaphson as IntS
}
fn default_symmetric() -> IntS {
    1
}
fn default_max_iter() -> Idx {
    20
}
fn default_err_tol() -> f64 {
    1e-8
}
fn default_tap_changing_strategy() -> IntS {
    TapChangingStrategy::Disabled as IntS
}

/// Raw calculation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_calculation_type")]
    pub calculation_type: IntS,
    #[serde(default = "default_calculation_method")]
    pub calculation_method: IntS,
    #[serde(default = "default_symmetric")]
    pub symmetric: IntS,
    #[serde(default = "default_max_iter")]
    pub max_iter: Idx,
    #[serde(default = "default_err_tol")]
    pub err_tol: f64,
    /// 0 sequential, negative for one worker per hardware thread, N for N workers.
    #[serde(default)]
    pub threading: Idx,
    #[serde(default = "default_tap_changing_strategy")]
    pub tap_changing_strategy: IntS,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            calculation_type: default_calculation_type(),
            calculation_method: default_calculation_method(),
            symmetric: default_symmetric(),
            max_iter: default_max_iter(),
            err_tol: default_err_tol(),
            threading: 0,
            tap_changing_strategy: default_tap_changing_strategy(),
        }
    }
}

/// Validated options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationConfig {
    pub calculation_type: CalculationType,
    pub method: CalculationMethod,
    pub symmetric: bool,
    pub max_iter: usize,
    pub err_tol: f64,
    pub threading: Threading,
    pub tap_changing_strategy: TapChangingStrategy,
}

impl Options {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn resolve(&self) -> Result<CalculationConfig> {
        let calculation_type = CalculationType::from_i8(self.calculation_type).ok_or_else(|| {
            PowerGridError::not_implemented("CalculationType", self.calculation_type)
        })?;
        let method = CalculationMethod::from_i8(self.calculation_method).ok_or_else(|| {
            PowerGridError::not_implemented("CalculationMethod", self.calculation_method)
        })?;
        let tap_changing_strategy = TapChangingStrategy::from_i8(self.tap_changing_strategy)
            .ok_or_else(|| {
                PowerGridError::not_implemented("TapChangingStrategy", self.tap_changing_strategy)
            })?;

        use CalculationMethod::*;
        let method = match (calculation_type, method) {
            (CalculationType::PowerFlow, DefaultMethod) => NewtonRaphson,
            (CalculationType::PowerFlow, Linear | NewtonRaphson | IterativeCurrent | LinearCurrent) => method,
            (CalculationType::StateEstimation, DefaultMethod) => IterativeLinear,
            (CalculationType::StateEstimation, IterativeLinear | NewtonRaphson) => method,
            (CalculationType::ShortCircuit, DefaultMethod | Iec60909) => Iec60909,
            _ => return Err(PowerGridError::InvalidCalculationMethod),
        };
        if calculation_type != CalculationType::PowerFlow {
            return Err(PowerGridError::not_implemented(
                "CalculationType",
                format!("{calculation_type:?}"),
            ));
        }

        Ok(CalculationConfig {
            calculation_type,
            method,
            symmetric: self.symmetric != 0,
            max_iter: usize::try_from(self.max_iter).unwrap_or(0),
            err_tol: self.err_tol,
            threading: Threading::from_code(self.threading),
            tap_changing_strategy,
        })
    }
}
