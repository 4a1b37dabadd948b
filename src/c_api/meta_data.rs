use std::ffi::c_char;
use std::ptr;

use super::{
    PGM_Handle, PGM_Idx, PGM_MetaAttribute, PGM_MetaComponent, PGM_MetaDataset, c_name, c_str,
    call_with, deref, to_index,
};
use crate::meta_data::meta_data;

#[unsafe(no_mangle)]
pub extern "C" fn PGM_meta_n_datasets(_handle: *mut PGM_Handle) -> PGM_Idx {
    meta_data().n_datasets() as PGM_Idx
}

/// # Safety
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_dataset_by_idx(
    handle: *mut PGM_Handle,
    idx: PGM_Idx,
) -> *const PGM_MetaDataset {
    unsafe {
        call_with(handle, ptr::null(), || {
            let datasets = &meta_data().datasets;
            Ok(&datasets[to_index(idx, datasets.len(), "dataset")?] as *const _)
        })
    }
}

/// # Safety
/// `dataset` must be null or a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_dataset_by_name(
    handle: *mut PGM_Handle,
    dataset: *const c_char,
) -> *const PGM_MetaDataset {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(meta_data().get_dataset(c_str(dataset)?)? as *const _)
        })
    }
}

/// # Safety
/// `dataset` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_dataset_name(
    handle: *mut PGM_Handle,
    dataset: *const PGM_MetaDataset,
) -> *const c_char {
    unsafe { call_with(handle, ptr::null(), || Ok(c_name(deref(dataset, "dataset")?.name))) }
}

/// # Safety
/// `dataset` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_n_components(
    handle: *mut PGM_Handle,
    dataset: *const PGM_MetaDataset,
) -> PGM_Idx {
    unsafe {
        call_with(handle, 0, || {
            Ok(deref(dataset, "dataset")?.n_components() as PGM_Idx)
        })
    }
}

/// # Safety
/// `dataset` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_component_by_idx(
    handle: *mut PGM_Handle,
    dataset: *const PGM_MetaDataset,
    idx: PGM_Idx,
) -> *const PGM_MetaComponent {
    unsafe {
        call_with(handle, ptr::null(), || {
            let components = &deref(dataset, "dataset")?.components;
            Ok(&components[to_index(idx, components.len(), "component")?] as *const _)
        })
    }
}

/// # Safety
/// Both names must be null or NUL terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_component_by_name(
    handle: *mut PGM_Handle,
    dataset: *const c_char,
    component: *const c_char,
) -> *const PGM_MetaComponent {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(meta_data().get_component(c_str(dataset)?, c_str(component)?)? as *const _)
        })
    }
}

/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_component_name(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
) -> *const c_char {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(c_name(deref(component, "component")?.name))
        })
    }
}

/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_component_size(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
) -> usize {
    unsafe { call_with(handle, 0, || Ok(deref(component, "component")?.size)) }
}

/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_component_alignment(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
) -> usize {
    unsafe { call_with(handle, 0, || Ok(deref(component, "component")?.alignment)) }
}

/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_n_attributes(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
) -> PGM_Idx {
    unsafe {
        call_with(handle, 0, || {
            Ok(deref(component, "component")?.n_attributes() as PGM_Idx)
        })
    }
}

/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_attribute_by_idx(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
    idx: PGM_Idx,
) -> *const PGM_MetaAttribute {
    unsafe {
        call_with(handle, ptr::null(), || {
            let attributes = &deref(component, "component")?.attributes;
            Ok(&attributes[to_index(idx, attributes.len(), "attribute")?] as *const _)
        })
    }
}

/// # Safety
/// All names must be null or NUL terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_get_attribute_by_name(
    handle: *mut PGM_Handle,
    dataset: *const c_char,
    component: *const c_char,
    attribute: *const c_char,
) -> *const PGM_MetaAttribute {
    unsafe {
        call_with(handle, ptr::null(), || {
            let attribute =
                meta_data().get_attribute(c_str(dataset)?, c_str(component)?, c_str(attribute)?)?;
            Ok(attribute as *const _)
        })
    }
}

/// # Safety
/// `attribute` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_attribute_name(
    handle: *mut PGM_Handle,
    attribute: *const PGM_MetaAttribute,
) -> *const c_char {
    unsafe {
        call_with(handle, ptr::null(), || {
            Ok(c_name(deref(attribute, "attribute")?.name))
        })
    }
}

/// Element type code, see [`crate::meta_data::CType`].
///
/// # Safety
/// `attribute` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_attribute_ctype(
    handle: *mut PGM_Handle,
    attribute: *const PGM_MetaAttribute,
) -> PGM_Idx {
    unsafe {
        call_with(handle, -1, || {
            Ok(deref(attribute, "attribute")?.ctype as PGM_Idx)
        })
    }
}

/// # Safety
/// `attribute` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_meta_attribute_offset(
    handle: *mut PGM_Handle,
    attribute: *const PGM_MetaAttribute,
) -> usize {
    unsafe { call_with(handle, 0, || Ok(deref(attribute, "attribute")?.offset)) }
}

#[unsafe(no_mangle)]
pub extern "C" fn PGM_is_little_endian(_handle: *mut PGM_Handle) -> PGM_Idx {
    cfg!(target_endian = "little") as PGM_Idx
}
