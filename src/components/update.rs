use rustgrid_proc_macro::Record;

use crate::meta_data::{ID, IntS};

/// Update of `line` and `generic_branch`.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct BranchUpdate {
    pub id: ID,
    pub from_status: IntS,
    pub to_status: IntS,
}

#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct SourceUpdate {
    pub id: ID,
    pub status: IntS,
    pub u_ref: f64,
    pub u_ref_angle: f64,
}

/// Update of `sym_load` and `sym_gen`.
#[derive(Debug, Clone, Copy, PartialEq, Record)]
#[repr(C)]
pub struct LoadGenUpdate {
    pub id: ID,
    pub status: IntS,
    pub p_specified: f64,
    pub q_specified: f64,
}
