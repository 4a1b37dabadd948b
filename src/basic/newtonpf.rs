use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;
use tracing::debug;

use super::{dsbus_dv::dSbus_dV, solver::Solve};
use crate::error::{PowerGridError, Result};

/// A voltage dependent power injection `s * |V|^exponent` at one bus, in p.u.
///
/// The exponent is 0 for constant power, 1 for constant current and 2 for
/// constant impedance behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusInjection {
    pub bus: usize,
    pub s: Complex64,
    pub exponent: f64,
}

impl BusInjection {
    pub fn power(&self, v_m: f64) -> Complex64 {
        self.s * v_m.powf(self.exponent)
    }

    fn d_power_d_vm(&self, v_m: f64) -> Complex64 {
        if self.exponent == 0.0 {
            Complex64::new(0.0, 0.0)
        } else {
            self.s * self.exponent * v_m.powf(self.exponent - 1.0)
        }
    }
}

/// Newton-Raphson power flow in polar coordinates.
///
/// Every bus is a load bus. Voltage sources enter as their Norton equivalent:
/// the source admittance is part of `Ybus` and the source current is `i_src`,
/// so the mismatch of bus `k` is `V_k * conj((Ybus V - i_src)_k) - S_k(|V_k|)`.
///
/// Returns the solved voltages and the number of iterations. Convergence is
/// reached when the largest voltage change of an iteration is below `tolerance`.
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    i_src: &DVector<Complex64>,
    injections: &[BusInjection],
    v_init: &DVector<Complex64>,
    tolerance: f64,
    max_iter: usize,
    solver: &mut Solver,
) -> Result<(DVector<Complex64>, usize)> {
    let n_bus = v_init.len();
    let mut v = v_init.clone();
    if n_bus == 0 {
        return Ok((v, 0));
    }
    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());
    let mut max_deviation = f64::INFINITY;

    for iteration in 1..=max_iter {
        let ibus = Ybus * &v - i_src;
        let (s_inj, ds_inj_dvm) = injected_power(injections, &v_m);
        let mis = v.component_mul(&ibus.conjugate()) - s_inj;

        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &ibus);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, &ds_inj_dvm);
        let (Ap, Ai, Ax) = jacobian.disassemble();

        let mut F = assemble_f(&mis);
        solver.solve(&Ap, &Ai, &Ax, F.as_mut_slice())?;

        let v_old = v.clone();
        update_v(&mut v_a, &mut v_m, &F, &mut v);
        max_deviation = v
            .iter()
            .zip(v_old.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);
        debug!(iteration, max_deviation, "newton-raphson step");
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

/// Injected power per bus and its derivative with respect to the voltage magnitude.
fn injected_power(
    injections: &[BusInjection],
    v_m: &DVector<f64>,
) -> (DVector<Complex64>, DVector<Complex64>) {
    let mut s = DVector::zeros(v_m.len());
    let mut ds = DVector::zeros(v_m.len());
    for inj in injections {
        s[inj.bus] += inj.power(v_m[inj.bus]);
        ds[inj.bus] += inj.d_power_d_vm(v_m[inj.bus]);
    }
    (s, ds)
}

#[inline(always)]
fn assemble_f(mis: &DVector<Complex64>) -> DVector<f64> {
    let n_bus = mis.len();
    DVector::from_fn(2 * n_bus, |i, _| {
        if i < n_bus {
            mis[i].re
        } else {
            mis[i - n_bus].im
        }
    })
}

/// Real Jacobian `[dP/dθ dP/d|V|; dQ/dθ dQ/d|V|]` of the mismatch.
#[allow(non_snake_case)]
#[inline(always)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    ds_inj_dvm: &DVector<Complex64>,
) -> CscMatrix<f64> {
    let n_bus = ds_dvm.nrows();
    let mut J = CooMatrix::new(2 * n_bus, 2 * n_bus);
    for (r, c, v) in ds_dva.triplet_iter() {
        J.push(r, c, v.re);
        J.push(n_bus + r, c, v.im);
    }
    for (r, c, v) in ds_dvm.triplet_iter() {
        J.push(r, n_bus + c, v.re);
        J.push(n_bus + r, n_bus + c, v.im);
    }
    for (k, d) in ds_inj_dvm.iter().enumerate() {
        J.push(k, n_bus + k, -d.re);
        J.push(n_bus + k, n_bus + k, -d.im);
    }
    CscMatrix::from(&J)
}

#[inline(always)]
fn update_v(
    v_a: &mut DVector<f64>,
    v_m: &mut DVector<f64>,
    dx: &DVector<f64>,
    v: &mut DVector<Complex64>,
) {
    let n_bus = v.len();
    v_a.zip_apply(&dx.rows_range(0..n_bus), |a, b| *a -= b);
    v_m.zip_apply(&dx.rows_range(n_bus..2 * n_bus), |a, b| *a -= b);
    v.zip_zip_apply(v_m, v_a, |e, vm, va| *e = Complex64::from_polar(vm, va));
}
