use std::ffi::c_char;
use std::ptr;

use super::{PGM_Handle, PGM_Idx, PGM_Options, c_str, call_with, deref_mut};
use crate::{
    error::{PowerGridError, Result},
    meta_data::IntS,
    options::Options,
};

fn to_code(value: PGM_Idx, what: &'static str) -> Result<IntS> {
    IntS::try_from(value).map_err(|_| PowerGridError::not_implemented(what, value))
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_options(handle: *mut PGM_Handle) -> *mut PGM_Options {
    unsafe { call_with(handle, ptr::null_mut(), || Ok(Box::into_raw(Box::default()))) }
}

/// Options from a JSON object; absent keys take their defaults.
///
/// # Safety
/// `json` must be null or a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_options_from_json(
    handle: *mut PGM_Handle,
    json: *const c_char,
) -> *mut PGM_Options {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            let options = Options::from_json(c_str(json)?)
                .map_err(|err| PowerGridError::dataset(format!("Invalid options: {err}")))?;
            Ok(Box::into_raw(Box::new(options)))
        })
    }
}

/// # Safety
/// `opt` must be null or come from [`PGM_create_options`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_options(opt: *mut PGM_Options) {
    if !opt.is_null() {
        drop(unsafe { Box::from_raw(opt) });
    }
}

macro_rules! option_setter {
    ($(#[$doc:meta])* $name:ident, $value:ty, |$options:ident, $arg:ident| $body:expr) => {
        $(#[$doc])*
        ///
        /// # Safety
        /// `opt` must be null or a live options object.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(handle: *mut PGM_Handle, opt: *mut PGM_Options, $arg: $value) {
            unsafe {
                call_with(handle, (), || {
                    let $options = deref_mut(opt, "options")?;
                    $body;
                    Ok(())
                })
            }
        }
    };
}

option_setter!(PGM_set_calculation_type, PGM_Idx, |options, value| {
    options.calculation_type = to_code(value, "CalculationType")?
});
option_setter!(PGM_set_calculation_method, PGM_Idx, |options, value| {
    options.calculation_method = to_code(value, "CalculationMethod")?
});
option_setter!(
    /// Nonzero for symmetric calculations.
    PGM_set_symmetric, PGM_Idx, |options, value| {
    options.symmetric = IntS::from(value != 0)
});
option_setter!(PGM_set_err_tol, f64, |options, value| options.err_tol = value);
option_setter!(PGM_set_max_iter, PGM_Idx, |options, value| options.max_iter = value);
option_setter!(
    /// 0 sequential, negative for one worker per hardware thread, N for N workers.
    PGM_set_threading, PGM_Idx, |options, value| {
    options.threading = value
});
option_setter!(PGM_set_tap_changing_strategy, PGM_Idx, |options, value| {
    options.tap_changing_strategy = to_code(value, "TapChangingStrategy")?
});
