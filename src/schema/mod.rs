//! Metadata schema: which attributes can be filtered on and how

mod attribute;
mod registry;

pub use attribute::{AttributeSpec, ValueType};
pub use registry::SchemaRegistry;
