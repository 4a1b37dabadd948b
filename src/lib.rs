extern crate self as rustgrid;

mod basic;
pub mod batch;
pub mod c_api;
pub mod components;
pub mod dataset;
pub mod error;
pub mod handle;
pub mod meta_data;
pub mod model;
pub mod options;

pub mod prelude {
    pub use crate::batch::{ScenarioModel, batch_calculation};
    pub use crate::components::*;
    pub use crate::dataset::{
        ConstDataset, Dataset, DatasetDescription, MutableDataset, RecordRange, RecordRangeMut,
        WritableDataset,
    };
    pub use crate::error::{BatchError, ErrorKind, PowerGridError, Result};
    pub use crate::meta_data::{AttributeValue, CType, ID, Idx, IntS, Record, meta_data};
    pub use crate::model::MainModel;
    pub use crate::options::{CalculationMethod, CalculationType, Options, Threading};
}
