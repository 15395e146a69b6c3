//! Groundwork desired-state model
//!
//! This crate defines the declarative resource model (resource kinds,
//! resource specs, the desired-state graph) and the KDL parser for stack
//! files. The model is deliberately provider-agnostic: attributes are an
//! opaque key/value mapping interpreted only by the provider for each
//! resource kind.

pub mod error;
pub mod model;
pub mod parser;

pub use error::{Result, SpecError};
pub use model::{
    AttrValue, Attributes, DesiredState, ProviderSettings, ResourceKind, ResourceSpec,
};
pub use parser::{parse_stack_file, parse_stack_string};
