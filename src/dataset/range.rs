//! Record proxies over row and columnar storage.
//!
//! [`RecordRange`] and [`RecordRangeMut`] present a bound component as a
//! random-access sequence of records, whatever its physical layout. Reading
//! gathers every attribute into a full record; unbound columns read as the
//! missing sentinel. Writing scatters every field back and skips unbound
//! columns.

use std::marker::PhantomData;
use std::ops::{Add, Sub};

use super::buffer::{RawColumn, RawView};
use crate::meta_data::{AttributeValue, Record};

#[derive(Debug, Clone, Copy)]
enum Storage<'a> {
    Empty,
    Row(RawView),
    Columnar(&'a [Option<RawColumn>], usize, usize),
}

impl Storage<'_> {
    fn len(&self) -> usize {
        match self {
            Storage::Empty => 0,
            Storage::Row(view) => view.len(),
            Storage::Columnar(_, _, len) => *len,
        }
    }

    fn read<T: Record>(&self, i: usize) -> T {
        match self {
            Storage::Empty => panic!("read from an empty record range"),
            // SAFETY: the row stride equals size_of::<T>(), checked when the range is created.
            Storage::Row(view) => unsafe { view.element_ptr(i).cast::<T>().read_unaligned() },
            Storage::Columnar(columns, start, len) => {
                assert!(i < *len, "record index {} out of range {}", i, len);
                let mut record = T::missing();
                for (field, column) in columns.iter().enumerate() {
                    if let Some(column) = column {
                        let ptr = column.view.element_ptr(start + i);
                        // SAFETY: the column type tag matches field `field` of T.
                        record.set(field, unsafe { AttributeValue::read(column.ctype, ptr) });
                    }
                }
                record
            }
        }
    }

    fn write<T: Record>(&self, i: usize, record: &T) {
        match self {
            Storage::Empty => panic!("write to an empty record range"),
            Storage::Row(view) => unsafe { view.element_ptr(i).cast::<T>().write_unaligned(*record) },
            Storage::Columnar(columns, start, len) => {
                assert!(i < *len, "record index {} out of range {}", i, len);
                for (field, column) in columns.iter().enumerate() {
                    if let Some(column) = column {
                        let ptr = column.view.element_ptr(start + i);
                        unsafe { record.get(field).write(ptr) };
                    }
                }
            }
        }
    }
}

/// Read-only sequence of records of type `T`.
#[derive(Debug, Clone, Copy)]
pub struct RecordRange<'a, T> {
    storage: Storage<'a>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: Record> RecordRange<'a, T> {
    pub(crate) fn empty() -> Self {
        Self {
            storage: Storage::Empty,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `view` must hold `T` records with stride `size_of::<T>()`, valid for reads during `'a`.
    pub(crate) unsafe fn row(view: RawView) -> Self {
        debug_assert_eq!(view.stride(), size_of::<T>());
        Self {
            storage: Storage::Row(view),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `columns` must follow the field order of `T` and be valid for reads of
    /// elements `[start, start + len)` during `'a`.
    pub(crate) unsafe fn columnar(columns: &'a [Option<RawColumn>], start: usize, len: usize) -> Self {
        Self {
            storage: Storage::Columnar(columns, start, len),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> T {
        self.storage.read(i)
    }

    pub fn iter(&self) -> RecordIter<'a, T> {
        RecordIter {
            range: *self,
            front: 0,
            back: self.len(),
        }
    }

    pub fn cursor(&self, pos: usize) -> RecordCursor<'a, T> {
        RecordCursor {
            range: *self,
            pos: pos as isize,
        }
    }

    pub fn begin(&self) -> RecordCursor<'a, T> {
        self.cursor(0)
    }

    pub fn end(&self) -> RecordCursor<'a, T> {
        self.cursor(self.len())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<'a, T: Record> IntoIterator for RecordRange<'a, T> {
    type Item = T;
    type IntoIter = RecordIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`RecordRange`].
#[derive(Debug, Clone)]
pub struct RecordIter<'a, T> {
    range: RecordRange<'a, T>,
    front: usize,
    back: usize,
}

impl<T: Record> Iterator for RecordIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        let item = self.range.get(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    fn nth(&mut self, n: usize) -> Option<T> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl<T: Record> DoubleEndedIterator for RecordIter<'_, T> {
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.range.get(self.back))
    }
}

impl<T: Record> ExactSizeIterator for RecordIter<'_, T> {}

/// A position in a [`RecordRange`].
///
/// Cursors can move past either end; only dereferencing checks bounds.
#[derive(Debug, Clone, Copy)]
pub struct RecordCursor<'a, T> {
    range: RecordRange<'a, T>,
    pos: isize,
}

impl<T: Record> RecordCursor<'_, T> {
    pub fn position(&self) -> isize {
        self.pos
    }

    pub fn get(&self) -> T {
        assert!(self.pos >= 0, "cursor before the start of the range");
        self.range.get(self.pos as usize)
    }

    pub fn step_forward(&mut self) {
        self.pos += 1;
    }

    pub fn step_back(&mut self) {
        self.pos -= 1;
    }
}

impl<T> PartialEq for RecordCursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl<T> Eq for RecordCursor<'_, T> {}

impl<T> Add<isize> for RecordCursor<'_, T> {
    type Output = Self;

    fn add(self, rhs: isize) -> Self {
        Self {
            pos: self.pos + rhs,
            ..self
        }
    }
}

impl<T> Sub<isize> for RecordCursor<'_, T> {
    type Output = Self;

    fn sub(self, rhs: isize) -> Self {
        Self {
            pos: self.pos - rhs,
            ..self
        }
    }
}

impl<'a, T> Sub for RecordCursor<'a, T> {
    type Output = isize;

    fn sub(self, rhs: Self) -> isize {
        self.pos - rhs.pos
    }
}

/// Read-write sequence of records of type `T`.
#[derive(Debug)]
pub struct RecordRangeMut<'a, T> {
    storage: Storage<'a>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: Record> RecordRangeMut<'a, T> {
    pub(crate) fn empty() -> Self {
        Self {
            storage: Storage::Empty,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// As [`RecordRange::row`], and the memory must be writable and unaliased during `'a`.
    pub(crate) unsafe fn row(view: RawView) -> Self {
        debug_assert_eq!(view.stride(), size_of::<T>());
        Self {
            storage: Storage::Row(view),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// As [`RecordRange::columnar`], and the columns must be writable and unaliased during `'a`.
    pub(crate) unsafe fn columnar(columns: &'a [Option<RawColumn>], start: usize, len: usize) -> Self {
        Self {
            storage: Storage::Columnar(columns, start, len),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> T {
        self.storage.read(i)
    }

    pub fn set(&mut self, i: usize, record: &T) {
        self.storage.write(i, record)
    }

    pub fn as_range(&self) -> RecordRange<'_, T> {
        RecordRange {
            storage: self.storage,
            _marker: PhantomData,
        }
    }

    pub fn iter(&self) -> RecordIter<'_, T> {
        self.as_range().iter()
    }

    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = RecordMut<'_, T>> {
        let storage = self.storage;
        (0..self.len()).map(move |index| RecordMut {
            storage,
            index,
            _marker: PhantomData,
        })
    }

    /// Writes `records` to positions `0..records.len()`.
    pub fn copy_from(&mut self, records: &[T]) {
        assert!(records.len() <= self.len());
        for (i, record) in records.iter().enumerate() {
            self.set(i, record);
        }
    }
}

/// Proxy to one record of a [`RecordRangeMut`].
#[derive(Debug)]
pub struct RecordMut<'r, T> {
    storage: Storage<'r>,
    index: usize,
    _marker: PhantomData<&'r mut T>,
}

impl<T: Record> RecordMut<'_, T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self) -> T {
        self.storage.read(self.index)
    }

    pub fn set(&mut self, record: &T) {
        self.storage.write(self.index, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{NodeInput, SourceUpdate},
        meta_data::{AttributeType, CType, ID},
    };

    fn column<V>(data: &mut [V], ctype: CType) -> Option<RawColumn> {
        Some(RawColumn {
            view: RawView::from_mut_slice(data),
            ctype,
        })
    }

    #[test]
    fn test_row_range() {
        let nodes = [
            NodeInput { id: 1, u_rated: 10e3 },
            NodeInput { id: 2, u_rated: 0.4e3 },
            NodeInput { id: 3, u_rated: 0.4e3 },
        ];
        let range = unsafe { RecordRange::<NodeInput>::row(RawView::from_slice(&nodes)) };
        assert_eq!(range.len(), 3);
        assert_eq!(range.get(1), nodes[1]);
        let ids: Vec<_> = range.iter().rev().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(range.iter().nth(2).map(|n| n.id), Some(3));
        assert_eq!(range.iter().len(), 3);
    }

    #[test]
    fn test_cursor_arithmetic() {
        let nodes = [
            NodeInput { id: 5, u_rated: 1.0 },
            NodeInput { id: 6, u_rated: 2.0 },
        ];
        let range = unsafe { RecordRange::<NodeInput>::row(RawView::from_slice(&nodes)) };
        let begin = range.begin();
        let end = range.end();
        assert_eq!(end - begin, 2);
        assert_eq!(begin - end, -2);
        assert!((begin + 2) == end);
        assert_eq!((end - 1).get().id, 6);
        let mut c = begin;
        c.step_forward();
        assert_eq!(c.get().id, 6);
        c.step_back();
        assert!(c == begin);
    }

    #[test]
    fn test_columnar_round_trip() {
        let mut ids = [ID::MISSING; 2];
        let mut u_ref = [f64::NAN; 2];
        let columns = vec![
            column(&mut ids, CType::Int32),
            None,
            column(&mut u_ref, CType::Double),
            None,
        ];
        let mut range = unsafe { RecordRangeMut::<SourceUpdate>::columnar(&columns, 0, 2) };
        let record = SourceUpdate {
            id: 7,
            status: 1,
            u_ref: 1.05,
            u_ref_angle: 0.1,
        };
        range.set(1, &record);
        let back = range.get(1);
        assert_eq!(back.id, 7);
        assert_eq!(back.u_ref, 1.05);
        assert_eq!(back.status, i8::MISSING);
        assert!(back.u_ref_angle.is_nan());
        drop(range);
        assert_eq!(ids, [ID::MISSING, 7]);
        assert_eq!(u_ref[1], 1.05);
    }

    #[test]
    fn test_iter_mut() {
        let mut nodes = [
            NodeInput { id: 1, u_rated: 1.0 },
            NodeInput { id: 2, u_rated: 1.0 },
        ];
        let mut range =
            unsafe { RecordRangeMut::<NodeInput>::row(RawView::from_mut_slice(&mut nodes)) };
        for mut proxy in range.iter_mut() {
            let mut node = proxy.get();
            node.u_rated = 10.0 * node.id as f64;
            proxy.set(&node);
        }
        drop(range);
        assert_eq!(nodes[0].u_rated, 10.0);
        assert_eq!(nodes[1].u_rated, 20.0);
    }
}
