//! Schema registry.
//!
//! A [`MetaData`] table describes, for every dataset kind (`input`, `update`,
//! `sym_output`, `asym_output`), which components it carries and how their
//! records are laid out. The process-wide table is built once from the
//! [`Record`] types in [`crate::components`] and is read-only afterwards, so
//! it can be shared by any number of readers.

mod attribute;

use std::sync::LazyLock;

pub use attribute::*;
use tracing::debug;

use crate::{
    components::*,
    error::{PowerGridError, Result},
};

/// One attribute of a component record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaAttribute {
    pub name: &'static str,
    pub ctype: CType,
    pub offset: usize,
    pub size: usize,
}

/// An opaque handle to one record in caller memory.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    ptr: *const u8,
    size: usize,
    _marker: std::marker::PhantomData<&'a [u8]>,
}

/// An opaque writable handle to one record in caller memory.
#[derive(Debug)]
pub struct RecordRefMut<'a> {
    ptr: *mut u8,
    size: usize,
    _marker: std::marker::PhantomData<&'a mut [u8]>,
}

impl<'a> RecordRef<'a> {
    /// # Safety
    /// `ptr` must point to `size` readable bytes that stay valid for `'a`.
    pub(crate) unsafe fn from_raw(ptr: *const u8, size: usize) -> Self {
        Self {
            ptr,
            size,
            _marker: Default::default(),
        }
    }
}

impl<'a> RecordRefMut<'a> {
    /// # Safety
    /// `ptr` must point to `size` writable bytes that stay valid and unaliased for `'a`.
    pub(crate) unsafe fn from_raw(ptr: *mut u8, size: usize) -> Self {
        Self {
            ptr,
            size,
            _marker: Default::default(),
        }
    }
}

impl MetaAttribute {
    fn check_fits(&self, record_size: usize) {
        assert!(
            self.offset + self.size <= record_size,
            "attribute {} does not fit in a record of {} bytes",
            self.name,
            record_size
        );
    }

    /// Reads this attribute from a record.
    pub fn get_value(&self, record: RecordRef<'_>) -> AttributeValue {
        self.check_fits(record.size);
        // SAFETY: bounds checked above, the record handle guarantees validity.
        unsafe { AttributeValue::read(self.ctype, record.ptr.add(self.offset)) }
    }

    /// Writes this attribute into a record.
    pub fn set_value(&self, record: RecordRefMut<'_>, value: AttributeValue) -> Result<()> {
        if value.ctype() != self.ctype {
            return Err(PowerGridError::dataset(format!(
                "Type mismatch for attribute {}: expected {:?}, got {:?}",
                self.name,
                self.ctype,
                value.ctype()
            )));
        }
        self.check_fits(record.size);
        // SAFETY: bounds and type checked above.
        unsafe { value.write(record.ptr.add(self.offset)) };
        Ok(())
    }
}

/// The layout of one component record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaComponent {
    pub name: &'static str,
    pub size: usize,
    pub alignment: usize,
    pub attributes: Vec<MetaAttribute>,
}

impl MetaComponent {
    pub fn of<T: Record>(name: &'static str) -> Self {
        Self {
            name,
            size: size_of::<T>(),
            alignment: align_of::<T>(),
            attributes: T::FIELDS
                .iter()
                .map(|f| MetaAttribute {
                    name: f.name,
                    ctype: f.ctype,
                    offset: f.offset,
                    size: f.ctype.size(),
                })
                .collect(),
        }
    }

    pub fn n_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn find_attribute(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn get_attribute(&self, name: &str) -> Result<&MetaAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| PowerGridError::name_not_found("attribute", name))
    }

    /// Whether records of type `T` have exactly this layout.
    pub fn matches<T: Record>(&self) -> bool {
        self.size == size_of::<T>()
            && self.attributes.len() == T::FIELDS.len()
            && self
                .attributes
                .iter()
                .zip(T::FIELDS)
                .all(|(a, f)| a.name == f.name && a.ctype == f.ctype && a.offset == f.offset)
    }

    /// Fills `size` records starting at `start` with missing values.
    ///
    /// # Safety
    /// `buffer` must be valid for writes of `(start + size) * self.size` bytes.
    pub unsafe fn set_nan(&self, buffer: *mut u8, start: usize, size: usize) {
        for i in start..start + size {
            for attr in &self.attributes {
                unsafe { attr.ctype.missing().write(buffer.add(i * self.size + attr.offset)) };
            }
        }
    }
}

/// A dataset kind and the components it may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataset {
    pub name: &'static str,
    pub components: Vec<MetaComponent>,
}

impl MetaDataset {
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn get_component(&self, name: &str) -> Result<&MetaComponent> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| PowerGridError::name_not_found("component", name))
    }
}

/// The complete schema table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaData {
    pub datasets: Vec<MetaDataset>,
}

impl MetaData {
    pub fn new(datasets: Vec<MetaDataset>) -> Self {
        Self { datasets }
    }

    pub fn n_datasets(&self) -> usize {
        self.datasets.len()
    }

    pub fn get_dataset(&self, name: &str) -> Result<&MetaDataset> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| PowerGridError::name_not_found("dataset", name))
    }

    pub fn get_component(&self, dataset: &str, component: &str) -> Result<&MetaComponent> {
        self.get_dataset(dataset)?.get_component(component)
    }

    pub fn get_attribute(
        &self,
        dataset: &str,
        component: &str,
        attribute: &str,
    ) -> Result<&MetaAttribute> {
        self.get_component(dataset, component)?
            .get_attribute(attribute)
    }
}

fn output_dataset<S: SymmetryTag>() -> MetaDataset {
    MetaDataset {
        name: S::OUTPUT_DATASET,
        components: vec![
            MetaComponent::of::<NodeOutput<S>>(NODE),
            MetaComponent::of::<BranchOutput<S>>(LINE),
            MetaComponent::of::<BranchOutput<S>>(GENERIC_BRANCH),
            MetaComponent::of::<ApplianceOutput<S>>(SOURCE),
            MetaComponent::of::<ApplianceOutput<S>>(SYM_LOAD),
            MetaComponent::of::<ApplianceOutput<S>>(SYM_GEN),
        ],
    }
}

fn build_meta_data() -> MetaData {
    let input = MetaDataset {
        name: INPUT,
        components: vec![
            MetaComponent::of::<NodeInput>(NODE),
            MetaComponent::of::<LineInput>(LINE),
            MetaComponent::of::<GenericBranchInput>(GENERIC_BRANCH),
            MetaComponent::of::<SourceInput>(SOURCE),
            MetaComponent::of::<LoadGenInput>(SYM_LOAD),
            MetaComponent::of::<LoadGenInput>(SYM_GEN),
        ],
    };
    let update = MetaDataset {
        name: UPDATE,
        components: vec![
            MetaComponent::of::<BranchUpdate>(LINE),
            MetaComponent::of::<BranchUpdate>(GENERIC_BRANCH),
            MetaComponent::of::<SourceUpdate>(SOURCE),
            MetaComponent::of::<LoadGenUpdate>(SYM_LOAD),
            MetaComponent::of::<LoadGenUpdate>(SYM_GEN),
        ],
    };
    let meta = MetaData::new(vec![
        input,
        update,
        output_dataset::<Symmetric>(),
        output_dataset::<Asymmetric>(),
    ]);
    debug!(n_datasets = meta.n_datasets(), "schema registry initialized");
    meta
}

static META_DATA: LazyLock<MetaData> = LazyLock::new(build_meta_data);

/// The process-wide schema registry.
pub fn meta_data() -> &'static MetaData {
    &META_DATA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let meta = meta_data();
        assert_eq!(meta.n_datasets(), 4);
        let node = meta.get_component("input", "node").unwrap();
        assert_eq!(node.size, size_of::<NodeInput>());
        let u_rated = node.get_attribute("u_rated").unwrap();
        assert_eq!(u_rated.ctype, CType::Double);
        assert_eq!(u_rated.offset, std::mem::offset_of!(NodeInput, u_rated));
        assert!(node.matches::<NodeInput>());
        assert!(!node.matches::<SourceInput>());

        let load = meta.get_component("input", "sym_load").unwrap();
        assert!(load.find_attribute("type").is_some());
        let asym = meta.get_attribute("asym_output", "node", "u").unwrap();
        assert_eq!(asym.ctype, CType::Double3);
    }

    #[test]
    fn test_not_found() {
        let meta = meta_data();
        assert!(matches!(
            meta.get_dataset("sc_output"),
            Err(PowerGridError::NameNotFound { kind: "dataset", .. })
        ));
        assert!(matches!(
            meta.get_component("update", "node"),
            Err(PowerGridError::NameNotFound {
                kind: "component",
                ..
            })
        ));
        assert!(matches!(
            meta.get_attribute("input", "node", "u_ref"),
            Err(PowerGridError::NameNotFound {
                kind: "attribute",
                ..
            })
        ));
    }

    #[test]
    fn test_concurrent_readers() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    meta_data()
                        .get_component("sym_output", "node")
                        .map(|c| c.size)
                        .unwrap()
                })
            })
            .collect();
        let sizes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sizes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_record_accessors() {
        let meta = meta_data();
        let comp = meta.get_component("update", "source").unwrap();
        let mut rec = SourceUpdate::missing();
        let ptr = &mut rec as *mut SourceUpdate as *mut u8;
        let u_ref = comp.get_attribute("u_ref").unwrap();
        unsafe {
            u_ref
                .set_value(
                    RecordRefMut::from_raw(ptr, comp.size),
                    AttributeValue::Double(0.5),
                )
                .unwrap();
            assert!(
                u_ref
                    .set_value(
                        RecordRefMut::from_raw(ptr, comp.size),
                        AttributeValue::Int8(1)
                    )
                    .is_err()
            );
            assert_eq!(
                u_ref.get_value(RecordRef::from_raw(ptr, comp.size)),
                AttributeValue::Double(0.5)
            );
        }
        assert_eq!(rec.u_ref, 0.5);
        assert!(rec.u_ref_angle.is_nan());
        assert_eq!(rec.id, ID::MISSING);
    }
}
