//! Error context handed across the foreign interface.
//!
//! Every foreign call runs through [`Handle::call`]: the handle is cleared,
//! the call runs under `catch_unwind`, and any failure is stored as an error
//! code and message the caller polls afterwards.

use std::any::Any;
use std::ffi::{CStr, CString, c_char};
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::{error::PowerGridError, meta_data::Idx};

pub const PGM_NO_ERROR: Idx = 0;
pub const PGM_REGULAR_ERROR: Idx = 1;
pub const PGM_BATCH_ERROR: Idx = 2;

fn to_c_string(message: impl Into<String>) -> CString {
    let message: String = message.into();
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Caller-owned error state of the last call.
#[derive(Debug, Default)]
pub struct Handle {
    err_code: Idx,
    err_msg: CString,
    failed_scenarios: Vec<Idx>,
    batch_errs: Vec<CString>,
    batch_err_ptrs: Vec<*const c_char>,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.err_code = PGM_NO_ERROR;
        self.err_msg = CString::default();
        self.failed_scenarios.clear();
        self.batch_err_ptrs.clear();
        self.batch_errs.clear();
    }

    pub fn error_code(&self) -> Idx {
        self.err_code
    }

    pub fn error_message(&self) -> &CStr {
        &self.err_msg
    }

    pub fn n_failed_scenarios(&self) -> Idx {
        self.failed_scenarios.len() as Idx
    }

    /// Failed scenario indices in ascending order.
    pub fn failed_scenarios(&self) -> &[Idx] {
        &self.failed_scenarios
    }

    /// Messages matching [`Handle::failed_scenarios`], as C string pointers owned by the handle.
    pub fn batch_errors(&self) -> &[*const c_char] {
        &self.batch_err_ptrs
    }

    pub fn set_error(&mut self, err: PowerGridError) {
        self.clear();
        match err {
            PowerGridError::Batch(batch) => {
                self.err_code = PGM_BATCH_ERROR;
                self.err_msg = to_c_string(batch.to_string());
                for failed in batch.iter() {
                    self.failed_scenarios.push(failed.scenario);
                    self.batch_errs.push(to_c_string(failed.message.as_str()));
                }
                self.batch_err_ptrs = self.batch_errs.iter().map(|m| m.as_ptr()).collect();
            }
            err => {
                self.err_code = PGM_REGULAR_ERROR;
                self.err_msg = to_c_string(err.to_string());
            }
        }
    }

    /// Runs `f` and records its failure; returns `None` when it failed or panicked.
    pub fn call<T>(&mut self, f: impl FnOnce() -> crate::error::Result<T>) -> Option<T> {
        self.clear();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.set_error(err);
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "panic caught at the foreign interface");
                self.err_code = PGM_REGULAR_ERROR;
                self.err_msg = to_c_string(format!("Unexpected internal error: {message}"));
                None
            }
        }
    }
}
