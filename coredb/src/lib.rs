//! # coredb
//!
//! Transactional, schema-governed configuration document store.
//!
//! A configuration is a single XML-shaped document described by a compiled
//! schema. Every write is checked against that schema, grouped writes run in
//! all-or-nothing transactions, and a monotone change counter tells the
//! application when derived state must be refreshed.
//!
//! ## Features
//!
//! - Path language over the element tree (`/a/b[@id="1"]/c`, `.//tag`)
//! - Typed value access with range and enumeration checks
//! - Transactions with whole-tree rollback and per-field error reports
//! - Batch parameters substituted into numeric inputs as `$name`
//! - Entity helpers for regions, cell zones, boundaries and monitors
//! - Tar container persistence with version migration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coredb::Session;
//!
//! let mut session = Session::new().unwrap();
//! let db = session.create().unwrap();
//!
//! db.transaction(|db| {
//!     db.set_value("/general/timeTransient", "true")?;
//!     db.set_value("/runCalculation/runConditions/endTime", "2.5")
//! })
//! .unwrap();
//!
//! assert!(db.get_bool("/general/timeTransient").unwrap());
//! db.save_as("case.tar").unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`tree`] - Element tree, path language and XML codec
//! - [`schema`] - Schema compilation and validation
//! - [`store`] - The document store and its read/write operations
//! - [`transaction`] - Transactions and write batches
//! - [`entities`] - Domain entity helpers
//! - [`persist`] - Container persistence
//! - [`session`] - Document lifecycle

/// Error types.
pub mod error;

/// Element tree, path language and XML codec.
pub mod tree;

/// Schema compilation and validation.
///
/// The schema is a JSON document declaring simple types, complex types and
/// the root element. It is compiled once and shared by every document.
pub mod schema;

/// The document store.
pub mod store;

/// Transactions and write batches.
pub mod transaction;

/// Subtree conversion to and from JSON values.
pub mod bulk;

/// Identifier allocation.
pub mod ids;

/// Element templates for new entities.
pub mod template;

/// Domain entity helpers.
pub mod entities;

/// Container persistence.
pub mod persist;

/// Document version migration.
pub mod migrate;

/// Document lifecycle.
pub mod session;

/// Store configuration.
pub mod config;

pub use config::StoreConfig;
pub use entities::{BatchParameter, BoundarySummary, MonitorKind};
pub use error::{DbError, Result, TransactionError, ValueError, ValueErrorKind};
pub use ids::{IdCategory, IdLimits};
pub use migrate::{MigrationStep, Migrator};
pub use schema::Schema;
pub use serde_json::Value;
pub use session::Session;
pub use store::CoreDb;
pub use template::{TemplateKind, Templates};
pub use transaction::{Outcome, WriteBatch, WriteItem};
pub use tree::{Element, PathExpr};
