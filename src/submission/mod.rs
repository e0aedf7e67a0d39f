//! Submission intake — field validation, attachment staging, processing.

pub mod attachment;
pub mod fields;
pub mod processor;

pub use attachment::{StagedAttachment, StorageHandle, Upload};
pub use fields::{FieldMap, REQUIRED_FIELDS};
pub use processor::{DispatchTracker, Processor, Submission};
