//! Component record types and the names they are registered under.

mod input;
mod output;
mod update;

pub use input::*;
pub use output::*;
pub use update::*;

pub const INPUT: &str = "input";
pub const UPDATE: &str = "update";

pub const NODE: &str = "node";
pub const LINE: &str = "line";
pub const GENERIC_BRANCH: &str = "generic_branch";
pub const SOURCE: &str = "source";
pub const SYM_LOAD: &str = "sym_load";
pub const SYM_GEN: &str = "sym_gen";

/// Component kinds known to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Node,
    Line,
    GenericBranch,
    Source,
    SymLoad,
    SymGen,
}

impl ComponentType {
    pub const ALL: [ComponentType; 6] = [
        ComponentType::Node,
        ComponentType::Line,
        ComponentType::GenericBranch,
        ComponentType::Source,
        ComponentType::SymLoad,
        ComponentType::SymGen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Node => NODE,
            ComponentType::Line => LINE,
            ComponentType::GenericBranch => GENERIC_BRANCH,
            ComponentType::Source => SOURCE,
            ComponentType::SymLoad => SYM_LOAD,
            ComponentType::SymGen => SYM_GEN,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}
