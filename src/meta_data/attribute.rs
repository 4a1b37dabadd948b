/// Object identifier as stored in component records.
pub type ID = i32;
/// Small integer used for status flags and enumerations in records.
pub type IntS = i8;
/// Index and size type of the dataset interface.
pub type Idx = i64;

/// Element type tag of a record attribute.
///
/// The discriminants are part of the foreign interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum CType {
    Int32 = 0,
    Int8 = 1,
    Double = 2,
    Double3 = 3,
}

impl CType {
    pub const fn size(self) -> usize {
        match self {
            CType::Int32 => size_of::<i32>(),
            CType::Int8 => size_of::<i8>(),
            CType::Double => size_of::<f64>(),
            CType::Double3 => size_of::<[f64; 3]>(),
        }
    }

    pub const fn alignment(self) -> usize {
        match self {
            CType::Int32 => align_of::<i32>(),
            CType::Int8 => align_of::<i8>(),
            CType::Double | CType::Double3 => align_of::<f64>(),
        }
    }

    /// The sentinel a missing value of this type reads as.
    pub const fn missing(self) -> AttributeValue {
        match self {
            CType::Int32 => AttributeValue::Int32(i32::MISSING),
            CType::Int8 => AttributeValue::Int8(i8::MISSING),
            CType::Double => AttributeValue::Double(f64::MISSING),
            CType::Double3 => AttributeValue::Double3(<[f64; 3]>::MISSING),
        }
    }
}

/// A dynamically typed attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Int32(i32),
    Int8(i8),
    Double(f64),
    Double3([f64; 3]),
}

impl AttributeValue {
    pub fn ctype(&self) -> CType {
        match self {
            AttributeValue::Int32(_) => CType::Int32,
            AttributeValue::Int8(_) => CType::Int8,
            AttributeValue::Double(_) => CType::Double,
            AttributeValue::Double3(_) => CType::Double3,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            AttributeValue::Int32(v) => v.is_missing(),
            AttributeValue::Int8(v) => v.is_missing(),
            AttributeValue::Double(v) => v.is_missing(),
            AttributeValue::Double3(v) => v.is_missing(),
        }
    }

    /// Reads a value of type `ctype` from `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for reading `ctype.size()` initialized bytes.
    pub(crate) unsafe fn read(ctype: CType, ptr: *const u8) -> Self {
        unsafe {
            match ctype {
                CType::Int32 => AttributeValue::Int32(ptr.cast::<i32>().read_unaligned()),
                CType::Int8 => AttributeValue::Int8(ptr.cast::<i8>().read_unaligned()),
                CType::Double => AttributeValue::Double(ptr.cast::<f64>().read_unaligned()),
                CType::Double3 => {
                    AttributeValue::Double3(ptr.cast::<[f64; 3]>().read_unaligned())
                }
            }
        }
    }

    /// Writes the value to `ptr` using its own type width.
    ///
    /// # Safety
    /// `ptr` must be valid for writing `self.ctype().size()` bytes.
    pub(crate) unsafe fn write(self, ptr: *mut u8) {
        unsafe {
            match self {
                AttributeValue::Int32(v) => ptr.cast::<i32>().write_unaligned(v),
                AttributeValue::Int8(v) => ptr.cast::<i8>().write_unaligned(v),
                AttributeValue::Double(v) => ptr.cast::<f64>().write_unaligned(v),
                AttributeValue::Double3(v) => ptr.cast::<[f64; 3]>().write_unaligned(v),
            }
        }
    }
}

/// Rust types that can be stored as a record attribute.
pub trait AttributeType: Copy + Send + Sync + 'static {
    const CTYPE: CType;
    /// Sentinel meaning "not specified".
    const MISSING: Self;

    fn into_value(self) -> AttributeValue;
    fn from_value(value: AttributeValue) -> Option<Self>;
    fn is_missing(&self) -> bool;
}

impl AttributeType for i32 {
    const CTYPE: CType = CType::Int32;
    const MISSING: Self = i32::MIN;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Int32(self)
    }
    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int32(v) => Some(v),
            _ => None,
        }
    }
    fn is_missing(&self) -> bool {
        *self == Self::MISSING
    }
}

impl AttributeType for i8 {
    const CTYPE: CType = CType::Int8;
    const MISSING: Self = i8::MIN;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Int8(self)
    }
    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int8(v) => Some(v),
            _ => None,
        }
    }
    fn is_missing(&self) -> bool {
        *self == Self::MISSING
    }
}

impl AttributeType for f64 {
    const CTYPE: CType = CType::Double;
    const MISSING: Self = f64::NAN;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Double(self)
    }
    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Double(v) => Some(v),
            _ => None,
        }
    }
    fn is_missing(&self) -> bool {
        self.is_nan()
    }
}

impl AttributeType for [f64; 3] {
    const CTYPE: CType = CType::Double3;
    const MISSING: Self = [f64::NAN; 3];

    fn into_value(self) -> AttributeValue {
        AttributeValue::Double3(self)
    }
    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Double3(v) => Some(v),
            _ => None,
        }
    }
    fn is_missing(&self) -> bool {
        self.iter().all(|x| x.is_nan())
    }
}

/// Compile-time description of one record field, emitted by `#[derive(Record)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ctype: CType,
    pub offset: usize,
}

/// A fixed-layout component record.
///
/// Implemented through `#[derive(Record)]` on `#[repr(C)]` structs. Field `i` of
/// [`Record::FIELDS`] is read and written through [`Record::get`] and
/// [`Record::set`], which is all the columnar storage mode needs to gather and
/// scatter whole records.
pub trait Record: Copy + Send + Sync + 'static {
    const FIELDS: &'static [FieldDescriptor];

    fn get(&self, field: usize) -> AttributeValue;
    /// Sets field `field`; a value of the wrong type is ignored.
    fn set(&mut self, field: usize, value: AttributeValue);
    /// A record with every field at its missing sentinel.
    fn missing() -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sentinels() {
        assert!(CType::Int32.missing().is_missing());
        assert!(CType::Int8.missing().is_missing());
        assert!(CType::Double.missing().is_missing());
        assert!(CType::Double3.missing().is_missing());
        assert!(!AttributeValue::Double(0.0).is_missing());
        assert!(!AttributeValue::Double3([f64::NAN, 1.0, f64::NAN]).is_missing());
    }

    #[test]
    fn test_raw_read_write() {
        let mut bytes = [0u8; 32];
        unsafe {
            AttributeValue::Double3([1.0, 2.0, 3.0]).write(bytes.as_mut_ptr().add(3));
            assert_eq!(
                AttributeValue::read(CType::Double3, bytes.as_ptr().add(3)),
                AttributeValue::Double3([1.0, 2.0, 3.0])
            );
        }
        assert_eq!(CType::Double3.size(), 24);
        let codes = [CType::Int32, CType::Int8, CType::Double, CType::Double3].map(|c| c as i8);
        assert_eq!(codes, [0, 1, 2, 3]);
        assert_eq!(i32::from_value(AttributeValue::Int8(1)), None);
    }
}
