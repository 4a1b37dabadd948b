use std::ffi::c_char;
use std::ptr;

use super::{PGM_Handle, PGM_Idx};
use crate::handle::{Handle, PGM_NO_ERROR};

#[unsafe(no_mangle)]
pub extern "C" fn PGM_create_handle() -> *mut PGM_Handle {
    Box::into_raw(Box::new(Handle::new()))
}

/// # Safety
/// `handle` must be null or come from [`PGM_create_handle`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_handle(handle: *mut PGM_Handle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_error_code(handle: *const PGM_Handle) -> PGM_Idx {
    unsafe { handle.as_ref() }.map_or(PGM_NO_ERROR, Handle::error_code)
}

/// The message stays valid until the next call with the same handle.
///
/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_error_message(handle: *const PGM_Handle) -> *const c_char {
    unsafe { handle.as_ref() }.map_or(c"".as_ptr(), |h| h.error_message().as_ptr())
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_n_failed_scenarios(handle: *const PGM_Handle) -> PGM_Idx {
    unsafe { handle.as_ref() }.map_or(0, Handle::n_failed_scenarios)
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_failed_scenarios(handle: *const PGM_Handle) -> *const PGM_Idx {
    unsafe { handle.as_ref() }.map_or(ptr::null(), |h| h.failed_scenarios().as_ptr())
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_batch_errors(handle: *const PGM_Handle) -> *const *const c_char {
    unsafe { handle.as_ref() }.map_or(ptr::null(), |h| h.batch_errors().as_ptr())
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_clear_error(handle: *mut PGM_Handle) {
    if let Some(handle) = unsafe { handle.as_mut() } {
        handle.clear();
    }
}
