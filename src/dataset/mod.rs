//! Dataset handler.
//!
//! A [`Dataset`] names, shapes and binds the buffers of one dataset occurrence
//! (single or batch, uniform or ragged components, row or columnar storage).
//! It never owns buffer memory. The capability marker `K` decides what can be
//! done with the bound memory:
//!
//! - [`Const`]: read only, bound in one step;
//! - [`Mutable`]: read and write, bound in one step;
//! - [`Writable`]: shape declared first by a producer, buffers bound later by
//!   the consumer, then handed over with [`WritableDataset::into_mutable`].
//!
//! Every shape violation is reported as a dataset error at the call that
//! introduces it.

pub mod buffer;
pub mod range;

use std::marker::PhantomData;
use std::ops::Range;

use tracing::debug;

use crate::{
    error::{PowerGridError, Result},
    meta_data::{AttributeType, Idx, MetaComponent, MetaData, MetaDataset, Record, meta_data},
};
pub use buffer::{BufferView, Indptr, RawColumn, RawView};
pub use range::{RecordCursor, RecordIter, RecordMut, RecordRange, RecordRangeMut};

mod sealed {
    pub trait Sealed {}
}

/// Capability of a dataset handler over its bound memory.
pub trait DatasetKind: sealed::Sealed + Send + Sync + 'static {
    /// Whether components are declared first and bound later.
    const DEFERRED_BIND: bool;
}

/// Capabilities that may write through bound buffers.
pub trait WriteKind: DatasetKind {}

#[derive(Debug, Clone, Copy)]
pub struct Const;
#[derive(Debug, Clone, Copy)]
pub struct Mutable;
#[derive(Debug, Clone, Copy)]
pub struct Writable;

impl sealed::Sealed for Const {}
impl sealed::Sealed for Mutable {}
impl sealed::Sealed for Writable {}
impl DatasetKind for Const {
    const DEFERRED_BIND: bool = false;
}
impl DatasetKind for Mutable {
    const DEFERRED_BIND: bool = false;
}
impl DatasetKind for Writable {
    const DEFERRED_BIND: bool = true;
}
impl WriteKind for Mutable {}
impl WriteKind for Writable {}

pub type ConstDataset<'a> = Dataset<'a, Const>;
pub type MutableDataset<'a> = Dataset<'a, Mutable>;
pub type WritableDataset<'a> = Dataset<'a, Writable>;

/// Shape of one component in a dataset occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub component: &'static MetaComponent,
    /// Elements per scenario, `-1` for ragged components.
    pub elements_per_scenario: Idx,
    pub total_elements: Idx,
}

impl ComponentInfo {
    pub fn name(&self) -> &'static str {
        self.component.name
    }

    pub fn is_ragged(&self) -> bool {
        self.elements_per_scenario < 0
    }
}

/// Shape description of a dataset occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescription {
    pub is_batch: bool,
    pub batch_size: Idx,
    pub dataset: &'static MetaDataset,
    pub component_info: Vec<ComponentInfo>,
}

#[derive(Debug, Clone)]
struct ComponentBuffer {
    indptr: Option<Indptr>,
    data: Option<BufferView>,
}

pub struct Dataset<'a, K: DatasetKind> {
    meta_data: &'static MetaData,
    description: DatasetDescription,
    buffers: Vec<ComponentBuffer>,
    _marker: PhantomData<(&'a (), K)>,
}

// SAFETY: the handler only stores views of caller memory. Const handlers never
// write through them, and mutable handlers are produced either from exclusive
// borrows or as disjoint per-scenario slices.
unsafe impl<K: DatasetKind> Send for Dataset<'_, K> {}
unsafe impl<K: DatasetKind> Sync for Dataset<'_, K> {}

impl<K: DatasetKind> std::fmt::Debug for Dataset<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("dataset", &self.description.dataset.name)
            .field("is_batch", &self.description.is_batch)
            .field("batch_size", &self.description.batch_size)
            .field(
                "components",
                &self
                    .description
                    .component_info
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn to_usize(value: Idx) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Checks the uniform/ragged invariants of one component against `batch_size`.
fn check_shape(batch_size: Idx, eps: Idx, total: Idx) -> Result<()> {
    if eps < -1 {
        return Err(PowerGridError::dataset(format!(
            "Invalid elements per scenario: {eps}"
        )));
    }
    if total < 0 {
        return Err(PowerGridError::dataset(format!(
            "Invalid total elements: {total}"
        )));
    }
    if eps >= 0 && eps.checked_mul(batch_size) != Some(total) {
        return Err(PowerGridError::dataset(format!(
            "For a uniform buffer, total_elements should equal elements_per_scenario * batch_size! Got {total} != {eps} * {batch_size}"
        )));
    }
    Ok(())
}

fn check_indptr_presence(eps: Idx, batch_size: Idx, indptr: Option<usize>) -> Result<()> {
    match (eps < 0, indptr) {
        (true, None) => Err(PowerGridError::dataset(
            "For a ragged buffer, indptr cannot be null!",
        )),
        (false, Some(_)) => Err(PowerGridError::dataset(
            "For a uniform buffer, indptr should be null!",
        )),
        (true, Some(len)) if Some(len) != to_usize(batch_size).checked_add(1) => {
            Err(PowerGridError::dataset(format!(
                "For a ragged buffer, indptr should have length batch_size + 1 = {batch_size} + 1, got {len}"
            )))
        }
        _ => Ok(()),
    }
}

fn check_indptr_contents(indptr: &[Idx], total: Idx) -> Result<()> {
    if indptr.first() != Some(&0) || indptr.last() != Some(&total) {
        return Err(PowerGridError::dataset(format!(
            "For a ragged buffer, indptr should begin with 0 and end with total_elements = {total}"
        )));
    }
    if indptr.windows(2).any(|w| w[0] > w[1]) {
        return Err(PowerGridError::dataset(
            "For a ragged buffer, indptr should be non-decreasing",
        ));
    }
    Ok(())
}

fn check_length(component: &MetaComponent, len: usize, total: Idx) -> Result<()> {
    if len < to_usize(total) {
        return Err(PowerGridError::dataset(format!(
            "Buffer of component {} holds {len} elements, expected at least {total}",
            component.name
        )));
    }
    Ok(())
}

fn check_layout<T: Record>(component: &MetaComponent) -> Result<()> {
    if !component.matches::<T>() {
        return Err(PowerGridError::dataset(format!(
            "Record type {} does not match the layout of component {}",
            std::any::type_name::<T>(),
            component.name
        )));
    }
    Ok(())
}

impl<'a, K: DatasetKind> Dataset<'a, K> {
    /// Creates an empty handler for `dataset_name` in the process-wide registry.
    pub fn new(is_batch: bool, batch_size: Idx, dataset_name: &str) -> Result<Self> {
        Self::with_meta_data(is_batch, batch_size, dataset_name, meta_data())
    }

    pub fn with_meta_data(
        is_batch: bool,
        batch_size: Idx,
        dataset_name: &str,
        meta_data: &'static MetaData,
    ) -> Result<Self> {
        let dataset = meta_data.get_dataset(dataset_name)?;
        if !is_batch && batch_size != 1 {
            return Err(PowerGridError::dataset(
                "For non-batch dataset, batch size should be one!",
            ));
        }
        if batch_size < 0 {
            return Err(PowerGridError::dataset(format!(
                "Batch size cannot be negative: {batch_size}"
            )));
        }
        debug!(dataset = dataset.name, is_batch, batch_size, "create dataset");
        Ok(Self {
            meta_data,
            description: DatasetDescription {
                is_batch,
                batch_size,
                dataset,
                component_info: Vec::new(),
            },
            buffers: Vec::new(),
            _marker: PhantomData,
        })
    }

    pub fn meta_data(&self) -> &'static MetaData {
        self.meta_data
    }

    pub fn is_batch(&self) -> bool {
        self.description.is_batch
    }

    pub fn batch_size(&self) -> Idx {
        self.description.batch_size
    }

    pub fn n_components(&self) -> usize {
        self.description.component_info.len()
    }

    pub fn dataset(&self) -> &'static MetaDataset {
        self.description.dataset
    }

    pub fn description(&self) -> &DatasetDescription {
        &self.description
    }

    pub fn component_info(&self, idx: usize) -> &ComponentInfo {
        &self.description.component_info[idx]
    }

    pub fn component_info_by_name(&self, name: &str) -> Result<&ComponentInfo> {
        Ok(self.component_info(self.component_index(name)?))
    }

    pub fn find_component(&self, name: &str) -> Option<usize> {
        self.description
            .component_info
            .iter()
            .position(|c| c.name() == name)
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.find_component(name).is_some()
    }

    /// Position of `name`, or a dataset error when the component is absent.
    pub fn component_index(&self, name: &str) -> Result<usize> {
        self.find_component(name).ok_or_else(|| {
            PowerGridError::dataset(format!("Cannot find component '{name}'!"))
        })
    }

    pub fn is_columnar(&self, name: &str) -> Result<bool> {
        let idx = self.component_index(name)?;
        Ok(self.buffers[idx]
            .data
            .as_ref()
            .is_some_and(BufferView::is_columnar))
    }

    /// Appends a component shape without binding memory.
    ///
    /// On a writable handler the buffers are bound later with `set_buffer`.
    /// Otherwise the component becomes columnar and its attribute arrays are
    /// bound with `add_attribute_buffer`; ragged components need an index
    /// pointer and must go through `add_columnar_buffer` instead.
    pub fn add_component_info(&mut self, name: &str, eps: Idx, total: Idx) -> Result<()> {
        let component = self.check_new_component(name, eps, total)?;
        if !K::DEFERRED_BIND && eps < 0 {
            return Err(PowerGridError::dataset(
                "For a ragged buffer, indptr cannot be null!",
            ));
        }
        self.description.component_info.push(ComponentInfo {
            component,
            elements_per_scenario: eps,
            total_elements: total,
        });
        self.buffers.push(ComponentBuffer {
            indptr: None,
            data: (!K::DEFERRED_BIND).then(|| Self::columnar_placeholder(component)),
        });
        Ok(())
    }

    fn check_new_component(
        &self,
        name: &str,
        eps: Idx,
        total: Idx,
    ) -> Result<&'static MetaComponent> {
        let component = self.description.dataset.get_component(name)?;
        if self.contains_component(name) {
            return Err(PowerGridError::dataset(format!(
                "Cannot have duplicated components! {name}"
            )));
        }
        check_shape(self.batch_size(), eps, total)?;
        Ok(component)
    }

    /// Validates a complete component and appends it. Nothing is recorded on failure.
    fn push_component(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: Option<Indptr>,
        data: impl FnOnce(&'static MetaComponent) -> Result<BufferView>,
    ) -> Result<()> {
        let component = self.check_new_component(name, eps, total)?;
        check_indptr_presence(eps, self.batch_size(), indptr.map(|p| p.len()))?;
        if let Some(indptr) = &indptr {
            // SAFETY: the indptr was just created from a live slice.
            check_indptr_contents(unsafe { indptr.as_slice() }, total)?;
        }
        let data = data(component)?;
        self.description.component_info.push(ComponentInfo {
            component,
            elements_per_scenario: eps,
            total_elements: total,
        });
        self.buffers.push(ComponentBuffer {
            indptr,
            data: Some(data),
        });
        Ok(())
    }

    fn columnar_placeholder(component: &MetaComponent) -> BufferView {
        BufferView::Columnar(vec![None; component.n_attributes()])
    }

    /// Binds one attribute array of a columnar component.
    fn bind_attribute(&mut self, name: &str, attribute: &str, view: RawView) -> Result<()> {
        let idx = self.component_index(name)?;
        let info = self.description.component_info[idx];
        let attr_idx = info
            .component
            .find_attribute(attribute)
            .ok_or_else(|| PowerGridError::name_not_found("attribute", attribute))?;
        let attr = &info.component.attributes[attr_idx];
        if view.stride() != attr.size {
            return Err(PowerGridError::dataset(format!(
                "Element type of buffer does not match attribute {name}.{attribute}"
            )));
        }
        check_length(info.component, view.len(), info.total_elements)?;
        match &mut self.buffers[idx].data {
            Some(BufferView::Columnar(columns)) => {
                columns[attr_idx] = Some(RawColumn {
                    view,
                    ctype: attr.ctype,
                });
                Ok(())
            }
            Some(BufferView::Row(_)) => Err(PowerGridError::dataset(format!(
                "Cannot add attribute buffer to a row-based component {name}!"
            ))),
            None => Err(PowerGridError::dataset(format!(
                "Component {name} must be bound as columnar before its attributes"
            ))),
        }
    }

    fn check_attribute_type<V: AttributeType>(&self, name: &str, attribute: &str) -> Result<()> {
        let idx = self.component_index(name)?;
        let attr = self.description.component_info[idx]
            .component
            .get_attribute(attribute)?;
        if attr.ctype != V::CTYPE {
            return Err(PowerGridError::dataset(format!(
                "Element type of buffer does not match attribute {name}.{attribute}"
            )));
        }
        Ok(())
    }

    /// Element range of component `idx` for `scenario`, or all scenarios for `None`.
    pub fn element_range(&self, idx: usize, scenario: Option<Idx>) -> Result<Range<usize>> {
        let info = &self.description.component_info[idx];
        let Some(scenario) = scenario else {
            return Ok(0..to_usize(info.total_elements));
        };
        if scenario < 0 || scenario >= self.batch_size() {
            return Err(PowerGridError::dataset(format!(
                "Scenario {scenario} out of range for batch size {}",
                self.batch_size()
            )));
        }
        if !info.is_ragged() {
            let eps = to_usize(info.elements_per_scenario);
            let start = to_usize(scenario) * eps;
            return Ok(start..start + eps);
        }
        let indptr = self.buffers[idx].indptr.ok_or_else(|| {
            PowerGridError::dataset(format!("Ragged component {} has no indptr", info.name()))
        })?;
        // SAFETY: the indptr outlives the handler and is not written while it is read here.
        let indptr = unsafe { indptr.as_slice() };
        let s = to_usize(scenario);
        let (begin, end) = (indptr[s], indptr[s + 1]);
        if begin < 0 || begin > end || end > info.total_elements {
            return Err(PowerGridError::dataset(format!(
                "Invalid indptr of component {} at scenario {scenario}",
                info.name()
            )));
        }
        Ok(to_usize(begin)..to_usize(end))
    }

    fn bound_data(&self, idx: usize) -> Result<&BufferView> {
        self.buffers[idx].data.as_ref().ok_or_else(|| {
            PowerGridError::dataset(format!(
                "Buffer of component {} is not bound",
                self.description.component_info[idx].name()
            ))
        })
    }

    /// Records of `name` in `scenario`, or in all scenarios for `None`.
    ///
    /// A component absent from this occurrence yields an empty range.
    pub fn get_buffer_span<T: Record>(
        &self,
        name: &str,
        scenario: Option<Idx>,
    ) -> Result<RecordRange<'_, T>> {
        let Some(idx) = self.find_component(name) else {
            return Ok(RecordRange::empty());
        };
        check_layout::<T>(self.description.component_info[idx].component)?;
        let range = self.element_range(idx, scenario)?;
        let data = self.bound_data(idx)?;
        // SAFETY: layout checked above, buffer lengths checked at bind time.
        Ok(unsafe {
            match data {
                BufferView::Row(view) => RecordRange::row(view.narrow(range.start, range.len())),
                BufferView::Columnar(columns) => {
                    RecordRange::columnar(columns, range.start, range.len())
                }
            }
        })
    }

    pub fn get_buffer_span_all_scenarios<T: Record>(&self, name: &str) -> Result<RecordRange<'_, T>> {
        self.get_buffer_span(name, None)
    }

    /// A non-batch read view of scenario `scenario` sharing this handler's memory.
    pub fn get_individual_scenario(&self, scenario: Idx) -> Result<ConstDataset<'_>> {
        self.scenario_view(scenario)
    }

    fn scenario_view<K2: DatasetKind>(&self, scenario: Idx) -> Result<Dataset<'_, K2>> {
        let mut component_info = Vec::with_capacity(self.n_components());
        let mut buffers = Vec::with_capacity(self.n_components());
        for idx in 0..self.n_components() {
            let range = self.element_range(idx, Some(scenario))?;
            let n = range.len() as Idx;
            component_info.push(ComponentInfo {
                component: self.description.component_info[idx].component,
                elements_per_scenario: n,
                total_elements: n,
            });
            buffers.push(ComponentBuffer {
                indptr: None,
                data: self.buffers[idx]
                    .data
                    .as_ref()
                    .map(|d| d.narrow(range.start, range.len())),
            });
        }
        Ok(Dataset {
            meta_data: self.meta_data,
            description: DatasetDescription {
                is_batch: false,
                batch_size: 1,
                dataset: self.description.dataset,
                component_info,
            },
            buffers,
            _marker: PhantomData,
        })
    }
}

impl<'a> Dataset<'a, Const> {
    /// Adds a row-based component.
    pub fn add_buffer<T: Record>(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: Option<&'a [Idx]>,
        data: &'a [T],
    ) -> Result<()> {
        self.push_component(name, eps, total, indptr.map(Indptr::from_slice), |component| {
            check_layout::<T>(component)?;
            check_length(component, data.len(), total)?;
            Ok(BufferView::Row(RawView::from_slice(data)))
        })
    }

    /// Adds a columnar component; attribute arrays follow with [`Self::add_attribute_buffer`].
    pub fn add_columnar_buffer(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: Option<&'a [Idx]>,
    ) -> Result<()> {
        self.push_component(name, eps, total, indptr.map(Indptr::from_slice), |component| {
            Ok(Self::columnar_placeholder(component))
        })
    }

    pub fn add_attribute_buffer<V: AttributeType>(
        &mut self,
        name: &str,
        attribute: &str,
        data: &'a [V],
    ) -> Result<()> {
        self.check_attribute_type::<V>(name, attribute)?;
        self.bind_attribute(name, attribute, RawView::from_slice(data))
    }
}

impl<'a> Dataset<'a, Mutable> {
    pub fn add_buffer<T: Record>(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: Option<&'a [Idx]>,
        data: &'a mut [T],
    ) -> Result<()> {
        self.push_component(name, eps, total, indptr.map(Indptr::from_slice), |component| {
            check_layout::<T>(component)?;
            check_length(component, data.len(), total)?;
            Ok(BufferView::Row(RawView::from_mut_slice(data)))
        })
    }

    pub fn add_columnar_buffer(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: Option<&'a [Idx]>,
    ) -> Result<()> {
        self.push_component(name, eps, total, indptr.map(Indptr::from_slice), |component| {
            Ok(Self::columnar_placeholder(component))
        })
    }

    pub fn add_attribute_buffer<V: AttributeType>(
        &mut self,
        name: &str,
        attribute: &str,
        data: &'a mut [V],
    ) -> Result<()> {
        self.check_attribute_type::<V>(name, attribute)?;
        self.bind_attribute(name, attribute, RawView::from_mut_slice(data))
    }

    /// A non-batch writable view of scenario `scenario`.
    pub fn get_individual_scenario_mut(&mut self, scenario: Idx) -> Result<MutableDataset<'_>> {
        self.scenario_view(scenario)
    }

    /// Splits into one non-batch writable view per scenario.
    ///
    /// The views cover disjoint element ranges and can be handed to different threads.
    pub fn split_scenarios(&mut self) -> Result<Vec<MutableDataset<'_>>> {
        let this: &Self = self;
        (0..this.batch_size())
            .map(move |scenario| this.scenario_view(scenario))
            .collect()
    }
}

impl<'a> Dataset<'a, Writable> {
    /// Binds row memory to a declared component.
    pub fn set_buffer<T: Record>(
        &mut self,
        name: &str,
        indptr: Option<&'a mut [Idx]>,
        data: &'a mut [T],
    ) -> Result<()> {
        let idx = self.component_index(name)?;
        let info = self.description.component_info[idx];
        check_layout::<T>(info.component)?;
        check_length(info.component, data.len(), info.total_elements)?;
        self.bind(idx, indptr, BufferView::Row(RawView::from_mut_slice(data)))
    }

    /// Binds a declared component as columnar; attribute arrays follow with
    /// [`Self::set_attribute_buffer`].
    pub fn set_columnar_buffer(&mut self, name: &str, indptr: Option<&'a mut [Idx]>) -> Result<()> {
        let idx = self.component_index(name)?;
        let placeholder = Self::columnar_placeholder(self.description.component_info[idx].component);
        self.bind(idx, indptr, placeholder)
    }

    pub fn set_attribute_buffer<V: AttributeType>(
        &mut self,
        name: &str,
        attribute: &str,
        data: &'a mut [V],
    ) -> Result<()> {
        self.check_attribute_type::<V>(name, attribute)?;
        self.bind_attribute(name, attribute, RawView::from_mut_slice(data))
    }

    fn bind(&mut self, idx: usize, indptr: Option<&'a mut [Idx]>, data: BufferView) -> Result<()> {
        let info = self.description.component_info[idx];
        check_indptr_presence(
            info.elements_per_scenario,
            self.batch_size(),
            indptr.as_ref().map(|p| p.len()),
        )?;
        self.buffers[idx] = ComponentBuffer {
            indptr: indptr.map(Indptr::from_mut_slice),
            data: Some(data),
        };
        Ok(())
    }

    /// Index pointer of a bound ragged component, for the producer to fill.
    pub fn indptr_mut(&mut self, name: &str) -> Result<Option<&mut [Idx]>> {
        let idx = self.component_index(name)?;
        // SAFETY: bound from an exclusive borrow, reachable only through `&mut self`.
        Ok(self.buffers[idx].indptr.map(|p| unsafe { p.as_mut_slice() }))
    }

    /// Hands the filled buffers to a consumer.
    ///
    /// Every component must be bound, and ragged index pointers are checked
    /// now that the producer has written them.
    pub fn into_mutable(self) -> Result<MutableDataset<'a>> {
        for (info, buffer) in self.description.component_info.iter().zip(&self.buffers) {
            if buffer.data.is_none() {
                return Err(PowerGridError::dataset(format!(
                    "Buffer of component {} is not bound",
                    info.name()
                )));
            }
            if let Some(indptr) = &buffer.indptr {
                // SAFETY: the producer is done writing.
                check_indptr_contents(unsafe { indptr.as_slice() }, info.total_elements)?;
            }
        }
        Ok(Dataset {
            meta_data: self.meta_data,
            description: self.description,
            buffers: self.buffers,
            _marker: PhantomData,
        })
    }
}

impl<K: WriteKind> Dataset<'_, K> {
    pub fn get_buffer_span_mut<T: Record>(
        &mut self,
        name: &str,
        scenario: Option<Idx>,
    ) -> Result<RecordRangeMut<'_, T>> {
        let Some(idx) = self.find_component(name) else {
            return Ok(RecordRangeMut::empty());
        };
        check_layout::<T>(self.description.component_info[idx].component)?;
        let range = self.element_range(idx, scenario)?;
        let data = self.bound_data(idx)?;
        // SAFETY: layout checked above; the handler was bound from writable memory and is
        // exclusively borrowed for the lifetime of the range.
        Ok(unsafe {
            match data {
                BufferView::Row(view) => RecordRangeMut::row(view.narrow(range.start, range.len())),
                BufferView::Columnar(columns) => {
                    RecordRangeMut::columnar(columns, range.start, range.len())
                }
            }
        })
    }

    /// Fills every bound attribute of `name` with its missing sentinel.
    pub fn set_nan(&mut self, name: &str) -> Result<()> {
        let Some(idx) = self.find_component(name) else {
            return Ok(());
        };
        let component = self.description.component_info[idx].component;
        let total = to_usize(self.description.component_info[idx].total_elements);
        match self.bound_data(idx)? {
            // SAFETY: the view holds at least `total` records of this component.
            BufferView::Row(view) => unsafe { component.set_nan(view.as_ptr(), 0, total) },
            BufferView::Columnar(columns) => {
                for column in columns.iter().flatten() {
                    let missing = column.ctype.missing();
                    for i in 0..total {
                        unsafe { missing.write(column.view.element_ptr(i)) };
                    }
                }
            }
        }
        Ok(())
    }
}

/// Raw binding used by the foreign interface.
impl<K: DatasetKind> Dataset<'static, K> {
    /// Adds a component from raw pointers. A null `data` pointer declares a
    /// columnar component whose attributes are bound with
    /// [`Self::add_attribute_buffer_raw`].
    ///
    /// # Safety
    /// `indptr`, when not null, must point to `batch_size + 1` values for ragged
    /// components. `data`, when not null, must point to `total` records of the
    /// component, writable unless `K` is [`Const`]. All memory must outlive the handler.
    pub unsafe fn add_buffer_raw(
        &mut self,
        name: &str,
        eps: Idx,
        total: Idx,
        indptr: *const Idx,
        data: *mut u8,
    ) -> Result<()> {
        let indptr = (!indptr.is_null()).then(|| {
            // A uniform component gets an empty indptr, which the shape check rejects.
            let len = if eps < 0 { to_usize(self.batch_size()) + 1 } else { 0 };
            Indptr::from_slice(unsafe { std::slice::from_raw_parts(indptr, len) })
        });
        let data = std::ptr::NonNull::new(data);
        let n = to_usize(total);
        self.push_component(name, eps, total, indptr, |component| {
            Ok(match data {
                Some(ptr) => BufferView::Row(unsafe { RawView::new(ptr, n, component.size) }),
                None => Self::columnar_placeholder(component),
            })
        })
    }

    /// # Safety
    /// `data` must point to `total_elements` values of the attribute's type.
    pub unsafe fn add_attribute_buffer_raw(
        &mut self,
        name: &str,
        attribute: &str,
        data: *mut u8,
    ) -> Result<()> {
        let idx = self.component_index(name)?;
        let info = self.description.component_info[idx];
        let attr = info.component.get_attribute(attribute)?;
        let ptr = std::ptr::NonNull::new(data)
            .ok_or_else(|| PowerGridError::dataset("Attribute buffer cannot be null!"))?;
        let view = unsafe { RawView::new(ptr, to_usize(info.total_elements), attr.size) };
        self.bind_attribute(name, attribute, view)
    }
}
