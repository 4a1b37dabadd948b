//! Numeric kernels of the power flow solvers.

pub(crate) mod dsbus_dv;
pub(crate) mod linear_pf;
pub(crate) mod newtonpf;

pub mod solver;
pub use linear_pf::{iterative_current_pf, linear_current_pf, linear_pf};
pub use newtonpf::{BusInjection, newton_pf};
