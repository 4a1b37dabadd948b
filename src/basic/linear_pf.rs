use nalgebra::*;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use tracing::debug;

use super::newtonpf::BusInjection;
use crate::error::{PowerGridError, Result};

fn factorize(ybus: &DMatrix<Complex64>) -> Result<LU<Complex64, Dyn, Dyn>> {
    let lu = ybus.clone().lu();
    if !lu.is_invertible() {
        return Err(PowerGridError::SparseMatrix(
            "admittance matrix is singular".into(),
        ));
    }
    Ok(lu)
}

fn solve(lu: &LU<Complex64, Dyn, Dyn>, rhs: &DVector<Complex64>) -> Result<DVector<Complex64>> {
    lu.solve(rhs)
        .ok_or_else(|| PowerGridError::SparseMatrix("admittance matrix is singular".into()))
}

/// Current drawn into the network by every injection at voltages `v`.
fn injected_current(injections: &[BusInjection], v: &DVector<Complex64>) -> DVector<Complex64> {
    let mut i = DVector::zeros(v.len());
    for inj in injections {
        let u = v[inj.bus];
        if u.norm() > 0.0 {
            i[inj.bus] += (inj.power(u.norm()) / u).conj();
        }
    }
    i
}

/// Linear power flow: every injection becomes the admittance it has at 1 p.u.
pub fn linear_pf(
    ybus: &CscMatrix<Complex64>,
    i_src: &DVector<Complex64>,
    injections: &[BusInjection],
) -> Result<DVector<Complex64>> {
    let mut y = DMatrix::from(ybus);
    for inj in injections {
        // s = -|V|^2 conj(y_shunt) at |V| = 1
        y[(inj.bus, inj.bus)] -= inj.s.conj();
    }
    solve(&factorize(&y)?, i_src)
}

/// Fixed point iteration on `Ybus V = i_src + I(V)` with a constant factorization.
pub fn iterative_current_pf(
    ybus: &CscMatrix<Complex64>,
    i_src: &DVector<Complex64>,
    injections: &[BusInjection],
    v_init: &DVector<Complex64>,
    tolerance: f64,
    max_iter: usize,
) -> Result<(DVector<Complex64>, usize)> {
    let mut v = v_init.clone();
    if v.is_empty() {
        return Ok((v, 0));
    }
    let lu = factorize(&DMatrix::from(ybus))?;
    let mut max_deviation = f64::INFINITY;
    for iteration in 1..=max_iter {
        let v_new = solve(&lu, &(i_src + injected_current(injections, &v)))?;
        max_deviation = (&v_new - &v).iter().map(|d| d.norm()).fold(0.0, f64::max);
        v = v_new;
        debug!(iteration, max_deviation, "iterative current step");
        if max_deviation < tolerance {
            return Ok((v, iteration));
        }
    }
    Err(PowerGridError::IterationDiverge {
        iterations: max_iter,
        max_deviation,
        tolerance,
    })
}

/// A single iterative current step from `v_init`.
pub fn linear_current_pf(
    ybus: &CscMatrix<Complex64>,
    i_src: &DVector<Complex64>,
    injections: &[BusInjection],
    v_init: &DVector<Complex64>,
) -> Result<DVector<Complex64>> {
    if v_init.is_empty() {
        return Ok(v_init.clone());
    }
    let lu = factorize(&DMatrix::from(ybus))?;
    solve(&lu, &(i_src + injected_current(injections, v_init)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn one_bus(y: Complex64) -> (CscMatrix<Complex64>, DVector<Complex64>) {
        let mut coo = CooMatrix::new(1, 1);
        coo.push(0, 0, y);
        (CscMatrix::from(&coo), DVector::from_element(1, y))
    }

    #[test]
    fn test_linear_impedance_load() {
        // 1 p.u. behind j1, load of j1 at 1 p.u. as impedance: voltage divider 1/2
        let (ybus, i_src) = one_bus(Complex64::new(0.0, -1.0));
        let injections = [BusInjection {
            bus: 0,
            s: Complex64::new(0.0, -1.0),
            exponent: 2.0,
        }];
        let v = linear_pf(&ybus, &i_src, &injections).unwrap();
        assert!((v[0].norm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_iterative_current() {
        let (ybus, i_src) = one_bus(Complex64::new(0.0, -1.0));
        let injections = [BusInjection {
            bus: 0,
            s: Complex64::new(0.0, -0.5),
            exponent: 1.0,
        }];
        let v0 = DVector::from_element(1, Complex64::new(1.0, 0.0));
        let (v, _) = iterative_current_pf(&ybus, &i_src, &injections, &v0, 1e-12, 50).unwrap();
        assert!((v[0].norm() - 0.5).abs() < 1e-9);
        let one_step = linear_current_pf(&ybus, &i_src, &injections, &v0).unwrap();
        assert!((one_step[0].norm() - 0.5).abs() < 1e-9);
    }
}
