use std::ffi::c_void;
use std::ptr;

use super::{PGM_Handle, PGM_Idx, PGM_MetaAttribute, PGM_MetaComponent, call_with, deref};
use crate::{
    error::{PowerGridError, Result},
    meta_data::{MetaAttribute, MetaComponent},
};

/// Buffers are backed by 8 byte words; the word before the data holds the word count.
type Word = u64;
const WORD: usize = size_of::<Word>();

fn to_count(value: PGM_Idx, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| PowerGridError::dataset(format!("Negative {what}: {value}")))
}

/// Allocates `size` records of `component`, uninitialized values zeroed.
///
/// # Safety
/// `component` must be null or come from the meta data functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_create_buffer(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
    size: PGM_Idx,
) -> *mut c_void {
    unsafe {
        call_with(handle, ptr::null_mut(), || {
            let component = deref(component, "component")?;
            if component.alignment > WORD {
                return Err(PowerGridError::dataset(format!(
                    "Alignment of component {} not supported",
                    component.name
                )));
            }
            let n_words = to_count(size, "buffer size")?
                .checked_mul(component.size)
                .and_then(|bytes| bytes.div_ceil(WORD).checked_add(1))
                .filter(|n| n.checked_mul(WORD).is_some_and(|b| b <= isize::MAX as usize))
                .ok_or_else(|| {
                    PowerGridError::dataset(format!(
                        "Buffer of {size} records of component {} is too large",
                        component.name
                    ))
                })?;
            let mut words = vec![0 as Word; n_words].into_boxed_slice();
            words[0] = n_words as Word;
            let header = Box::into_raw(words).cast::<Word>();
            Ok(header.add(1).cast::<c_void>())
        })
    }
}

/// # Safety
/// `ptr` must be null or come from [`PGM_create_buffer`] and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_destroy_buffer(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let header = ptr.cast::<Word>().sub(1);
        let n_words = *header as usize;
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(header, n_words)));
    }
}

/// Sets records `buffer_offset..buffer_offset + size` to missing values.
///
/// # Safety
/// `ptr` must hold at least `buffer_offset + size` records of `component`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_buffer_set_nan(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
    ptr: *mut c_void,
    buffer_offset: PGM_Idx,
    size: PGM_Idx,
) {
    unsafe {
        call_with(handle, (), || {
            let component = deref(component, "component")?;
            if ptr.is_null() {
                return Err(PowerGridError::dataset("Null pointer passed as buffer"));
            }
            let start = to_count(buffer_offset, "buffer offset")?;
            let size = to_count(size, "buffer size")?;
            component.set_nan(ptr.cast(), start, size);
            Ok(())
        })
    }
}

/// Copies one attribute of `size` records between a row buffer and a strided array.
///
/// # Safety
/// `record` must point to the record at the first position, `values` to the
/// first value, and both ranges must be valid for `size` elements.
unsafe fn copy_attribute(
    component: &MetaComponent,
    attribute: &MetaAttribute,
    record: *mut u8,
    values: *mut u8,
    size: usize,
    stride: usize,
    to_record: bool,
) {
    for i in 0..size {
        unsafe {
            let field = record.add(i * component.size + attribute.offset);
            let value = values.add(i * stride);
            if to_record {
                ptr::copy_nonoverlapping(value, field, attribute.size);
            } else {
                ptr::copy_nonoverlapping(field, value, attribute.size);
            }
        }
    }
}

/// Shared argument checks of value copies; returns `(start, size, stride)`.
fn copy_range(
    component: &MetaComponent,
    attribute: &MetaAttribute,
    buffer_offset: PGM_Idx,
    size: PGM_Idx,
    stride: PGM_Idx,
) -> Result<(usize, usize, usize)> {
    if !component.attributes.contains(attribute) {
        return Err(PowerGridError::name_not_found("attribute", attribute.name));
    }
    let stride = if stride < 0 {
        attribute.size
    } else {
        to_count(stride, "stride")?
    };
    Ok((to_count(buffer_offset, "buffer offset")?, to_count(size, "size")?, stride))
}

/// Writes `size` values of `attribute` from `src_ptr` into the records of a row buffer.
///
/// A negative `src_stride` means the values are packed.
///
/// # Safety
/// `buffer_ptr` must hold at least `buffer_offset + size` records of
/// `component`; `src_ptr` must hold `size` values at the given stride.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_buffer_set_value(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
    attribute: *const PGM_MetaAttribute,
    buffer_ptr: *mut c_void,
    src_ptr: *const c_void,
    buffer_offset: PGM_Idx,
    size: PGM_Idx,
    src_stride: PGM_Idx,
) {
    unsafe {
        call_with(handle, (), || {
            let (component, attribute) =
                (deref(component, "component")?, deref(attribute, "attribute")?);
            let (start, size, stride) = copy_range(component, attribute, buffer_offset, size, src_stride)?;
            if buffer_ptr.is_null() || src_ptr.is_null() {
                return Err(PowerGridError::dataset("Null pointer passed as buffer"));
            }
            let record = buffer_ptr.cast::<u8>().add(start * component.size);
            copy_attribute(component, attribute, record, src_ptr.cast_mut().cast(), size, stride, true);
            Ok(())
        })
    }
}

/// Reads `size` values of `attribute` from the records of a row buffer into `dest_ptr`.
///
/// # Safety
/// See [`PGM_buffer_set_value`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PGM_buffer_get_value(
    handle: *mut PGM_Handle,
    component: *const PGM_MetaComponent,
    attribute: *const PGM_MetaAttribute,
    buffer_ptr: *const c_void,
    dest_ptr: *mut c_void,
    buffer_offset: PGM_Idx,
    size: PGM_Idx,
    dest_stride: PGM_Idx,
) {
    unsafe {
        call_with(handle, (), || {
            let (component, attribute) =
                (deref(component, "component")?, deref(attribute, "attribute")?);
            let (start, size, stride) = copy_range(component, attribute, buffer_offset, size, dest_stride)?;
            if buffer_ptr.is_null() || dest_ptr.is_null() {
                return Err(PowerGridError::dataset("Null pointer passed as buffer"));
            }
            let record = buffer_ptr.cast::<u8>().cast_mut().add(start * component.size);
            copy_attribute(component, attribute, record, dest_ptr.cast(), size, stride, false);
            Ok(())
        })
    }
}
