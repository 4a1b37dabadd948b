use std::ffi::c_char;
use std::ptr;
use std::slice;

use super::{
    PGM_ConstDataset, PGM_Handle, PGM_ID, PGM_Idx, PGM_MutableDataset, PGM_Options,
    PGM_PowerGridModel, c_str, call_with, deref, deref_mut,
};
use crate::{
    error::{PowerGridError, Result},
    model::MainModel,
};

/// # Safety
/// `input` must be null or a live dataset whose buffers stay valid during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_model(
    handle: *mut PGM_Handle,
    system_frequency: f64,
    input: *const PGM_ConstDataset,
) -> *mut PGM_PowerGridModel {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            let model = MainModel::new(system_frequency, deref(input, "input dataset")?)?;
            Ok(Box::into_raw(Box::new(model)))
        })
    }
}

/// # Safety
/// `model` must be null or a live model; `update` null or a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_update_model(
    handle: *mut PGM_Handle,
    model: *mut PGM_PowerGridModel,
    update: *const PGM_ConstDataset,
) {
    unsafe {
        call_with(handle, (), || {
            deref_mut(model, "model")?.update(deref(update, "update dataset")?)
        })
    }
}

/// # Safety
/// `model` must be null or a live model.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_copy_model(
    handle: *mut PGM_Handle,
    model: *const PGM_PowerGridModel,
) -> *mut PGM_PowerGridModel {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            Ok(Box::into_raw(Box::new(deref(model, "model")?.clone())))
        })
    }
}

/// Writes the position of every id in `ids` within its component into `indexer`.
///
/// # Safety
/// `ids` must hold `size` ids and `indexer` room for `size` indices.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_get_indexer(
    handle: *mut PGM_Handle,
    model: *const PGM_PowerGridModel,
    component: *const c_char,
    size: PGM_Idx,
    ids: *const PGM_ID,
    indexer: *mut PGM_Idx,
) {
    unsafe {
        call_with(handle, (), || {
            let model = deref(model, "model")?;
            let size = usize::try_from(size)
                .map_err(|_| PowerGridError::dataset(format!("Negative size: {size}")))?;
            if size == 0 {
                return Ok(());
            }
            if ids.is_null() || indexer.is_null() {
                return Err(PowerGridError::dataset("Null pointer passed as id array"));
            }
            let positions = model.get_indexer(c_str(component)?, slice::from_raw_parts(ids, size))?;
            slice::from_raw_parts_mut(indexer, size).copy_from_slice(&positions);
            Ok(())
        })
    }
}

/// Runs a calculation. `batch_dataset` may be null for a calculation without update.
///
/// # Safety
/// All non-null pointers must be live objects whose buffers stay valid during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_calculate(
    handle: *mut PGM_Handle,
    model: *mut PGM_PowerGridModel,
    opt: *const PGM_Options,
    output_dataset: *mut PGM_MutableDataset,
    batch_dataset: *const PGM_ConstDataset,
) {
    unsafe {
        call_with(handle, (), || -> Result<()> {
            let model = deref_mut(model, "model")?;
            let options = deref(opt, "options")?;
            let output = deref_mut(output_dataset, "output dataset")?;
            model.calculate(options, output, batch_dataset.as_ref())
        })
    }
}

/// # Safety
/// `model` must be null or come from [`PGM_create_model`] or [`PGM_copy_model`]
/// and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_model(model: *mut PGM_PowerGridModel) {
    if !model.is_null() {
        drop(unsafe { Box::from_raw(model) });
    }
}
