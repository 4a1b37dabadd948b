use nalgebra::*;
use nalgebra_sparse::CscMatrix;

fn conjugate(mut m: CscMatrix<Complex<f64>>) -> CscMatrix<Complex<f64>> {
    m.values_mut().iter_mut().for_each(|v| *v = v.conj());
    m
}

fn diagonal(values: &DVector<Complex<f64>>) -> CscMatrix<Complex<f64>> {
    let mut diag = CscMatrix::identity(values.len());
    diag.values_mut().copy_from_slice(values.as_slice());
    diag
}

/// Computes the derivatives of the bus power injections with respect to voltage magnitudes and angles.
///
/// `ibus` is the bus current vector `Ybus * v` minus any constant current
/// injections, so that source equivalents in Norton form are covered too.
///
/// # Returns
///
/// A tuple `(dS_dVm, dS_dVa)`.
///
/// # Notes
///
/// * This method is from MatPower:
///   R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
///   their Derivatives using Complex Matrix Notation", MATPOWER
///   Technical Note 2, February 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex<f64>>,
    v: &DVector<Complex<f64>>,
    ibus: &DVector<Complex<f64>>,
) -> (CscMatrix<Complex<f64>>, CscMatrix<Complex<f64>>) {
    let Vnorm = v.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex::new(1.0, 0.0) });
    let diagVnorm = diagonal(&Vnorm);
    let diagV = diagonal(v);
    let diagIbus = diagonal(ibus);

    let dS_dVm = &diagV * conjugate(Ybus * &diagVnorm) + conjugate(diagIbus.clone()) * &diagVnorm;
    let dS_dVa = &diagV * conjugate(diagIbus - Ybus * &diagV) * Complex::<f64>::i();
    (dS_dVm, dS_dVa)
}
