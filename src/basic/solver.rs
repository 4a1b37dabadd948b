mod rsparse;
pub use rsparse::*;

use crate::error::Result;

pub type DefaultSolver = RSparseSolver;

#[allow(non_snake_case)]
/// A trait for solving sparse linear systems.
pub trait Solve {
    /// Solves `A x = b` in place.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, overwritten with the solution.
    fn solve(&mut self, Ap: &[usize], Ai: &[usize], Ax: &[f64], b: &mut [f64]) -> Result<()>;

    /// Drops the cached symbolic analysis so the next solve may use a new sparsity pattern.
    fn reset(&mut self);
}
