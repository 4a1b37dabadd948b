use std::f64::consts::PI;
use std::fmt::Debug;

use const_format::concatcp;
use rustgrid_proc_macro::Record;

use crate::meta_data::{AttributeType, ID, IntS};

const OUTPUT_SUFFIX: &str = "_output";

pub const SYM_OUTPUT: &str = concatcp!("sym", OUTPUT_SUFFIX);
pub const ASYM_OUTPUT: &str = concatcp!("asym", OUTPUT_SUFFIX);

/// Data shape of calculation results.
///
/// Symmetric results carry one value per quantity, asymmetric results one
/// value per phase. The model always solves the balanced positive sequence
/// network and expands it into the requested shape through this trait.
pub trait SymmetryTag: Copy + Send + Sync + 'static {
    type Real: AttributeType + Debug + PartialEq;

    const IS_SYMMETRIC: bool;
    const OUTPUT_DATASET: &'static str;

    fn replicate(value: f64) -> Self::Real;

    /// Phase angles of a balanced set whose first phase is at `theta`.
    fn angles(theta: f64) -> Self::Real;

    /// Voltage magnitude in V given the per-unit value and the rated line voltage.
    fn voltage(u_pu: f64, u_rated: f64) -> Self::Real;

    /// Power in W or var given the three phase total.
    fn power(total: f64) -> Self::Real;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symmetric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Asymmetric;

impl SymmetryTag for Symmetric {
    type Real = f64;

    const IS_SYMMETRIC: bool = true;
    const OUTPUT_DATASET: &'static str = SYM_OUTPUT;

    fn replicate(value: f64) -> f64 {
        value
    }
    fn angles(theta: f64) -> f64 {
        theta
    }
    fn voltage(u_pu: f64, u_rated: f64) -> f64 {
        u_pu * u_rated
    }
    fn power(total: f64) -> f64 {
        total
    }
}

impl SymmetryTag for Asymmetric {
    type Real = [f64; 3];

    const IS_SYMMETRIC: bool = false;
    const OUTPUT_DATASET: &'static str = ASYM_OUTPUT;

    fn replicate(value: f64) -> [f64; 3] {
        [value; 3]
    }
    fn angles(theta: f64) -> [f64; 3] {
        [theta, theta - 2.0 * PI / 3.0, theta + 2.0 * PI / 3.0]
    }
    fn voltage(u_pu: f64, u_rated: f64) -> [f64; 3] {
        [u_pu * u_rated / 3f64.sqrt(); 3]
    }
    fn power(total: f64) -> [f64; 3] {
        [total / 3.0; 3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct NodeOutput<S: SymmetryTag> {
    pub id: ID,
    pub energized: IntS,
    pub u_pu: S::Real,
    pub u: S::Real,
    pub u_angle: S::Real,
    pub p: S::Real,
    pub q: S::Real,
}

/// Output of `line` and `generic_branch`.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct BranchOutput<S: SymmetryTag> {
    pub id: ID,
    pub energized: IntS,
    pub loading: f64,
    pub p_from: S::Real,
    pub q_from: S::Real,
    pub i_from: S::Real,
    pub s_from: S::Real,
    pub p_to: S::Real,
    pub q_to: S::Real,
    pub i_to: S::Real,
    pub s_to: S::Real,
}

/// Output of `source`, `sym_load` and `sym_gen`.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct ApplianceOutput<S: SymmetryTag> {
    pub id: ID,
    pub energized: IntS,
    pub p: S::Real,
    pub q: S::Real,
    pub i: S::Real,
    pub s: S::Real,
    pub pf: S::Real,
}
