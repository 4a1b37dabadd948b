use rustgrid_proc_macro::Record;

use crate::meta_data::{ID, IntS};

#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct NodeInput {
    pub id: ID,
    /// Rated line-to-line voltage in V.
    pub u_rated: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct LineInput {
    pub id: ID,
    pub from_node: ID,
    pub to_node: ID,
    pub from_status: IntS,
    pub to_status: IntS,
    /// Positive sequence series resistance in ohm.
    pub r1: f64,
    /// Positive sequence series reactance in ohm.
    pub x1: f64,
    /// Positive sequence shunt capacitance in F.
    pub c1: f64,
    /// Loss angle of the shunt capacitance.
    pub tan1: f64,
    /// Rated current in A, used for loading.
    pub i_n: f64,
}

/// A branch specified directly by its admittances and an off-nominal ratio.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct GenericBranchInput {
    pub id: ID,
    pub from_node: ID,
    pub to_node: ID,
    pub from_status: IntS,
    pub to_status: IntS,
    pub r1: f64,
    pub x1: f64,
    pub g1: f64,
    pub b1: f64,
    pub k: f64,
    pub theta: f64,
    /// Rated apparent power in VA, used for loading.
    pub sn: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct SourceInput {
    pub id: ID,
    pub node: ID,
    pub status: IntS,
    pub u_ref: f64,
    pub u_ref_angle: f64,
    /// Short circuit power in VA.
    pub sk: f64,
    pub rx_ratio: f64,
}

/// Input of `sym_load` and `sym_gen`.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct LoadGenInput {
    pub id: ID,
    pub node: ID,
    pub status: IntS,
    #[record(rename = "type")]
    pub load_type: IntS,
    pub p_specified: f64,
    pub q_specified: f64,
}
