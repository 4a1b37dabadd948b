//! C interface.
//!
//! Objects cross the boundary as opaque pointers created and destroyed by the
//! functions below. Every function takes the caller's [`Handle`] first and
//! reports failures only through it; a failed call returns null, zero or
//! leaves its output untouched.

#![allow(non_snake_case, non_camel_case_types)]

mod buffer;
mod dataset;
mod handle;
mod meta_data;
mod model;
mod options;

pub use buffer::*;
pub use dataset::*;
pub use handle::*;
pub use meta_data::*;
pub use model::*;
pub use options::*;

use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char};
use std::sync::LazyLock;

use crate::{
    dataset::{ConstDataset, DatasetDescription, MutableDataset},
    error::{PowerGridError, Result},
    handle::Handle,
    meta_data::{self as md, ID, Idx},
    model::MainModel,
    options::Options,
};

pub type PGM_ID = ID;
pub type PGM_Idx = Idx;
pub type PGM_Handle = Handle;
pub type PGM_MetaDataset = md::MetaDataset;
pub type PGM_MetaComponent = md::MetaComponent;
pub type PGM_MetaAttribute = md::MetaAttribute;
pub type PGM_Options = Options;
pub type PGM_ConstDataset = ConstDataset<'static>;
pub type PGM_MutableDataset = MutableDataset<'static>;
pub type PGM_DatasetInfo = DatasetDescription;
pub type PGM_PowerGridModel = MainModel;

/// Schema names as C strings, built once from the registry.
static C_NAMES: LazyLock<HashMap<&'static str, CString>> = LazyLock::new(|| {
    let mut names = HashMap::new();
    let mut intern = |name: &'static str| {
        names
            .entry(name)
            .or_insert_with(|| CString::new(name).unwrap_or_default());
    };
    for dataset in &md::meta_data().datasets {
        intern(dataset.name);
        for component in &dataset.components {
            intern(component.name);
            for attribute in &component.attributes {
                intern(attribute.name);
            }
        }
    }
    names
});

fn c_name(name: &str) -> *const c_char {
    C_NAMES.get(name).map_or(c"".as_ptr(), |n| n.as_ptr())
}

/// # Safety
/// `ptr` must be null or point to a NUL terminated string alive for `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(PowerGridError::dataset("Null pointer passed as a name"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|err| PowerGridError::dataset(format!("Name is not valid UTF-8: {err}")))
}

/// # Safety
/// `ptr` must be null or point to a live `T` not mutated for `'a`.
unsafe fn deref<'a, T>(ptr: *const T, what: &str) -> Result<&'a T> {
    unsafe { ptr.as_ref() }
        .ok_or_else(|| PowerGridError::dataset(format!("Null pointer passed as {what}")))
}

/// # Safety
/// `ptr` must be null or point to a live `T` not aliased for `'a`.
unsafe fn deref_mut<'a, T>(ptr: *mut T, what: &str) -> Result<&'a mut T> {
    unsafe { ptr.as_mut() }
        .ok_or_else(|| PowerGridError::dataset(format!("Null pointer passed as {what}")))
}

fn to_index(value: Idx, len: usize, what: &str) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| PowerGridError::dataset(format!("Index {value} of {what} out of range")))
}

/// Runs `f` under `handle`, returning `fallback` when it fails.
///
/// # Safety
/// `handle` must be null or point to a live handle not used concurrently.
unsafe fn call_with<T>(handle: *mut Handle, fallback: T, f: impl FnOnce() -> Result<T>) -> T {
    let mut scratch = Handle::new();
    let handle = unsafe { handle.as_mut() }.unwrap_or(&mut scratch);
    handle.call(f).unwrap_or(fallback)
}
