//! The configuration tree: elements, path expressions and XML form.

/// Element type and tree navigation.
pub mod element;

/// Path expression parsing and evaluation.
pub mod path;

/// XML reading and writing.
pub mod xml;

pub use element::{Element, NodeId};
pub use path::PathExpr;
