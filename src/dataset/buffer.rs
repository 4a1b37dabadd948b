//! Raw views over caller-owned memory.

use std::ptr::NonNull;

use crate::meta_data::{CType, Idx};

/// A borrowed, non-owning view of `len` elements spaced `stride` bytes apart.
///
/// The view never frees or allocates. Element access is bounds checked before
/// any pointer arithmetic happens.
#[derive(Debug, Clone, Copy)]
pub struct RawView {
    ptr: NonNull<u8>,
    len: usize,
    stride: usize,
}

impl RawView {
    /// # Safety
    /// `ptr` must be valid for `len * stride` bytes for as long as the view is used.
    pub unsafe fn new(ptr: NonNull<u8>, len: usize, stride: usize) -> Self {
        Self { ptr, len, stride }
    }

    pub fn from_slice<T>(data: &[T]) -> Self {
        Self {
            ptr: NonNull::from(data).cast(),
            len: data.len(),
            stride: size_of::<T>(),
        }
    }

    pub fn from_mut_slice<T>(data: &mut [T]) -> Self {
        let len = data.len();
        Self {
            ptr: NonNull::from(data).cast(),
            len,
            stride: size_of::<T>(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Address of element `i`.
    pub fn element_ptr(&self, i: usize) -> *mut u8 {
        assert!(
            i < self.len,
            "element index {} out of range for view of length {}",
            i,
            self.len
        );
        // SAFETY: i < len, so the offset stays inside the viewed allocation.
        unsafe { self.ptr.as_ptr().add(i * self.stride) }
    }

    /// The sub-view `[start, start + len)`.
    pub fn narrow(&self, start: usize, len: usize) -> Self {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.len),
            "range {}+{} out of range for view of length {}",
            start,
            len,
            self.len
        );
        // SAFETY: start <= self.len, at most one past the end.
        let ptr = unsafe { self.ptr.add(start * self.stride) };
        Self {
            ptr,
            len,
            stride: self.stride,
        }
    }
}

/// One attribute array of a columnar buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawColumn {
    pub view: RawView,
    pub ctype: CType,
}

impl RawColumn {
    pub fn narrow(&self, start: usize, len: usize) -> Self {
        Self {
            view: self.view.narrow(start, len),
            ctype: self.ctype,
        }
    }
}

/// Storage of one bound component.
#[derive(Debug, Clone)]
pub enum BufferView {
    /// Contiguous records of the component's row size.
    Row(RawView),
    /// One optional array per attribute, in schema order.
    Columnar(Vec<Option<RawColumn>>),
}

impl BufferView {
    pub fn is_columnar(&self) -> bool {
        matches!(self, BufferView::Columnar(_))
    }

    pub fn narrow(&self, start: usize, len: usize) -> Self {
        match self {
            BufferView::Row(view) => BufferView::Row(view.narrow(start, len)),
            BufferView::Columnar(columns) => BufferView::Columnar(
                columns
                    .iter()
                    .map(|c| c.as_ref().map(|c| c.narrow(start, len)))
                    .collect(),
            ),
        }
    }
}

/// Index pointer array of a ragged component.
#[derive(Debug, Clone, Copy)]
pub struct Indptr {
    ptr: NonNull<Idx>,
    len: usize,
}

impl Indptr {
    pub fn from_slice(indptr: &[Idx]) -> Self {
        Self {
            ptr: NonNull::from(indptr).cast(),
            len: indptr.len(),
        }
    }

    pub fn from_mut_slice(indptr: &mut [Idx]) -> Self {
        let len = indptr.len();
        Self {
            ptr: NonNull::from(indptr).cast(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    /// The memory this was created from must still be alive and not mutably borrowed elsewhere.
    pub unsafe fn as_slice<'a>(&self) -> &'a [Idx] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// # Safety
    /// The memory this was created from must be writable, alive and not borrowed elsewhere.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [Idx] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow() {
        let data = [1.0f64, 2.0, 3.0, 4.0];
        let view = RawView::from_slice(&data);
        let sub = view.narrow(1, 2);
        assert_eq!(sub.len(), 2);
        let v = unsafe { sub.element_ptr(1).cast::<f64>().read() };
        assert_eq!(v, 3.0);
        assert!(view.narrow(4, 0).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds() {
        let data = [1i32, 2];
        RawView::from_slice(&data).narrow(1, 1).element_ptr(1);
    }

    #[test]
    fn test_mut_views() {
        let mut data = [1.0f64, 2.0, 3.0];
        let view = RawView::from_mut_slice(&mut data);
        assert_eq!((view.len(), view.stride()), (3, 8));
        unsafe { view.element_ptr(2).cast::<f64>().write(7.0) };
        assert_eq!(data[2], 7.0);

        let mut indptr: [Idx; 3] = [0, 1, 3];
        let view = Indptr::from_mut_slice(&mut indptr);
        assert_eq!(view.len(), 3);
        unsafe { view.as_mut_slice()[1] = 2 };
        assert_eq!(indptr, [0, 2, 3]);
    }

    #[test]
    #[should_panic]
    fn test_narrow_wrapping_range() {
        let data = [1i32, 2];
        RawView::from_slice(&data).narrow(1, usize::MAX);
    }
}
