use std::ffi::{c_char, c_void};
use std::ptr;

use super::{
    PGM_ConstDataset, PGM_DatasetInfo, PGM_Handle, PGM_Idx, PGM_MutableDataset, c_name, c_str,
    call_with, deref, deref_mut, to_index,
};
use crate::dataset::{ConstDataset, MutableDataset};

/// # Safety
/// `dataset` must be null or a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_dataset_const(
    handle: *mut PGM_Handle,
    dataset: *const c_char,
    is_batch: PGM_Idx,
    batch_size: PGM_Idx,
) -> *mut PGM_ConstDataset {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            let dataset = ConstDataset::new(is_batch != 0, batch_size, c_str(dataset)?)?;
            Ok(Box::into_raw(Box::new(dataset)))
        })
    }
}

/// # Safety
/// `dataset` must be null or come from [`PGM_create_dataset_const`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_dataset_const(dataset: *mut PGM_ConstDataset) {
    if !dataset.is_null() {
        drop(unsafe { Box::from_raw(dataset) });
    }
}

/// Adds a component. A null `data` declares a columnar component whose
/// attributes follow with [`PGM_dataset_const_add_attribute_buffer`].
///
/// # Safety
/// `indptr` and `data` must be null or hold the elements the shape declares,
/// and outlive the dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_const_add_buffer(
    handle: *mut PGM_Handle,
    dataset: *mut PGM_ConstDataset,
    component: *const c_char,
    elements_per_scenario: PGM_Idx,
    total_elements: PGM_Idx,
    indptr: *const PGM_Idx,
    data: *const c_void,
) {
    unsafe {
        call_with(handle, (), || {
            deref_mut(dataset, "dataset")?.add_buffer_raw(
                c_str(component)?,
                elements_per_scenario,
                total_elements,
                indptr,
                data.cast_mut().cast(),
            )
        })
    }
}

/// # Safety
/// `data` must hold `total_elements` values of the attribute and outlive the dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_const_add_attribute_buffer(
    handle: *mut PGM_Handle,
    dataset: *mut PGM_ConstDataset,
    component: *const c_char,
    attribute: *const c_char,
    data: *const c_void,
) {
    unsafe {
        call_with(handle, (), || {
            deref_mut(dataset, "dataset")?.add_attribute_buffer_raw(
                c_str(component)?,
                c_str(attribute)?,
                data.cast_mut().cast(),
            )
        })
    }
}

/// # Safety
/// `dataset` must be null or a live dataset; the info lives as long as it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_const_get_info(
    handle: *mut PGM_Handle,
    dataset: *const PGM_ConstDataset,
) -> *const PGM_DatasetInfo {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(deref(dataset, "dataset")?.description() as *const _)
        })
    }
}

/// # Safety
/// `dataset` must be null or a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_dataset_mutable(
    handle: *mut PGM_Handle,
    dataset: *const c_char,
    is_batch: PGM_Idx,
    batch_size: PGM_Idx,
) -> *mut PGM_MutableDataset {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            let dataset = MutableDataset::new(is_batch != 0, batch_size, c_str(dataset)?)?;
            Ok(Box::into_raw(Box::new(dataset)))
        })
    }
}

/// # Safety
/// `dataset` must be null or come from [`PGM_create_dataset_mutable`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_dataset_mutable(dataset: *mut PGM_MutableDataset) {
    if !dataset.is_null() {
        drop(unsafe { Box::from_raw(dataset) });
    }
}

/// # Safety
/// As [`PGM_dataset_const_add_buffer`], with `data` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_mutable_add_buffer(
    handle: *mut PGM_Handle,
    dataset: *mut PGM_MutableDataset,
    component: *const c_char,
    elements_per_scenario: PGM_Idx,
    total_elements: PGM_Idx,
    indptr: *const PGM_Idx,
    data: *mut c_void,
) {
    unsafe {
        call_with(handle, (), || {
            deref_mut(dataset, "dataset")?.add_buffer_raw(
                c_str(component)?,
                elements_per_scenario,
                total_elements,
                indptr,
                data.cast(),
            )
        })
    }
}

/// # Safety
/// As [`PGM_dataset_const_add_attribute_buffer`], with `data` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_mutable_add_attribute_buffer(
    handle: *mut PGM_Handle,
    dataset: *mut PGM_MutableDataset,
    component: *const c_char,
    attribute: *const c_char,
    data: *mut c_void,
) {
    unsafe {
        call_with(handle, (), || {
            deref_mut(dataset, "dataset")?.add_attribute_buffer_raw(
                c_str(component)?,
                c_str(attribute)?,
                data.cast(),
            )
        })
    }
}

/// # Safety
/// `dataset` must be null or a live dataset; the info lives as long as it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_mutable_get_info(
    handle: *mut PGM_Handle,
    dataset: *const PGM_MutableDataset,
) -> *const PGM_DatasetInfo {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(deref(dataset, "dataset")?.description() as *const _)
        })
    }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_name(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
) -> *const c_char {
    unsafe { call_with(handle, ptr::null(), || Ok(c_name(deref(info, "info")?.dataset.name))) }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_is_batch(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
) -> PGM_Idx {
    unsafe { call_with(handle, 0, || Ok(PGM_Idx::from(deref(info, "info")?.is_batch))) }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_batch_size(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
) -> PGM_Idx {
    unsafe { call_with(handle, 0, || Ok(deref(info, "info")?.batch_size)) }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_n_components(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
) -> PGM_Idx {
    unsafe {
        call_with(handle, 0, || {
            Ok(deref(info, "info")?.component_info.len() as PGM_Idx)
        })
    }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_component_name(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
    component_idx: PGM_Idx,
) -> *const c_char {
    unsafe {
        call_with(handle, ptr::null(), || {
            let components = &deref(info, "info")?.component_info;
            let idx = to_index(component_idx, components.len(), "component")?;
            Ok(c_name(components[idx].name()))
        })
    }
}

/// Elements per scenario of a component, -1 when ragged.
///
/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_elements_per_scenario(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
    component_idx: PGM_Idx,
) -> PGM_Idx {
    unsafe {
        call_with(handle, -1, || {
            let components = &deref(info, "info")?.component_info;
            let idx = to_index(component_idx, components.len(), "component")?;
            Ok(components[idx].elements_per_scenario)
        })
    }
}

/// # Safety
/// `info` must be null or come from a live dataset.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_dataset_info_total_elements(
    handle: *mut PGM_Handle,
    info: *const PGM_DatasetInfo,
    component_idx: PGM_Idx,
) -> PGM_Idx {
    unsafe {
        call_with(handle, -1, || {
            let components = &deref(info, "info")?.component_info;
            let idx = to_index(component_idx, components.len(), "component")?;
            Ok(components[idx].total_elements)
        })
    }
}
