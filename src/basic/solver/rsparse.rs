use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;
use crate::error::{PowerGridError, Result};

/// LU solver on top of `rsparse`, reusing the symbolic analysis between solves.
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
    symbolic: Option<Symb>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(&mut self, Ap: &[usize], Ai: &[usize], Ax: &[f64], b: &mut [f64]) -> Result<()> {
        let n = Ap.len() - 1;
        if b.len() != n {
            return Err(PowerGridError::SparseMatrix(format!(
                "right-hand side has length {}, expected {n}",
                b.len()
            )));
        }
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p: Ap.iter().map(|&v| v as isize).collect(),
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        let symbolic = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        self.x.resize(n, 0.0);
        let numeric = lu(&a, symbolic, 1e-6)
            .map_err(|_| PowerGridError::SparseMatrix("LU factorization failed".into()))?;
        ipvec(&numeric.pinv, b, &mut self.x); // x = P*b
        lsolve(&numeric.l, &mut self.x); // x = L\x
        usolve(&numeric.u, &mut self.x); // x = U\x
        ipvec(&symbolic.q, &self.x, b); // b = Q*x
        if b.iter().any(|v| !v.is_finite()) {
            return Err(PowerGridError::SparseMatrix(
                "solution is not finite".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(p) => {
            for k in 0..b.len() {
                x[p[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_small_system() {
        // [4 1 0; 1 3 0; 0 0 2] in CSC
        let ap = [0, 2, 4, 5];
        let ai = [0, 1, 0, 1, 2];
        let ax = [4.0, 1.0, 1.0, 3.0, 2.0];
        let mut b = [6.0, 7.0, 4.0];
        let mut solver = RSparseSolver::default();
        solver.solve(&ap, &ai, &ax, &mut b).unwrap();
        assert!((b[0] - 1.0).abs() < 1e-12);
        assert!((b[1] - 2.0).abs() < 1e-12);
        assert!((b[2] - 2.0).abs() < 1e-12);

        let mut b = [4.0, 3.0, 2.0];
        solver.solve(&ap, &ai, &ax, &mut b).unwrap();
        assert!((b[0] - 9.0 / 11.0).abs() < 1e-12);
    }
}
