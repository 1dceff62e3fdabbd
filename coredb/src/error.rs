//! Error types for the configuration store.
//!
//! [`DbError`] covers every failure an operation can report. Structural
//! failures (bad lookups, misuse, exhausted id namespaces) are programmer
//! errors and are meant to fail fast. [`ValueError`] describes a user input
//! that did not pass validation; inside a transaction those are collected and
//! reported together through [`TransactionError`].

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Kind of a user-input validation failure.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueErrorKind {
    /// A floating-point number was expected.
    #[error("Only floating point numbers are allowed")]
    FloatOnly,
    /// An integer was expected.
    #[error("Only integers are allowed")]
    IntegerOnly,
    /// The number lies outside the declared bounds.
    #[error("Out of range")]
    OutOfRange,
    /// Enumeration or pattern violation, or a malformed bulk shape.
    #[error("Invalid value")]
    TypeMismatch,
    /// A cross-reference constraint reported by a collaborator.
    #[error("Referenced by other configurations")]
    Referenced,
}

/// A rejected user value.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{}: {kind} ({value:?})", subject(.label, .path))]
pub struct ValueError {
    /// What went wrong.
    pub kind: ValueErrorKind,
    /// Caller supplied label, usually the form field the value came from.
    pub label: Option<String>,
    /// Path the value was written to.
    pub path: String,
    /// The rejected input, trimmed.
    pub value: String,
}

impl ValueError {
    pub fn new(kind: ValueErrorKind, path: &str, value: &str) -> Self {
        Self {
            kind,
            label: None,
            path: path.to_string(),
            value: value.to_string(),
        }
    }

    /// Attach a caller label.
    pub fn with_label(mut self, label: Option<&str>) -> Self {
        self.label = label.map(str::to_string);
        self
    }
}

/// The label when present, otherwise the path.
fn subject<'a>(label: &'a Option<String>, path: &'a str) -> &'a str {
    label.as_deref().unwrap_or(path)
}

/// Errors reported by the configuration store.
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// The path did not match exactly one element.
    #[error("lookup failed: `{path}` matched {matches} element(s), expected exactly one")]
    Lookup { path: String, matches: usize },

    /// The element exists but lacks the requested attribute.
    #[error("lookup failed: `{path}` has no attribute `{name}`")]
    MissingAttribute { path: String, name: String },

    /// The element has element-only content and carries no value.
    #[error("lookup failed: `{path}` has no simple text content")]
    NoSimpleContent { path: String },

    /// An operation was called in a state that does not allow it.
    #[error("runtime misuse: {0}")]
    Misuse(String),

    /// A user value was rejected.
    #[error("{0}")]
    Value(#[from] ValueError),

    /// Every id in a namespace is in use.
    #[error("overflow: no free id for `{attribute}` below {max}")]
    Overflow { attribute: String, max: u32 },

    /// An entity with the same name already exists.
    #[error("`{name}` already exists under `{path}`")]
    Exists { path: String, name: String },

    /// The document does not conform to the schema.
    #[error("schema violation at `{path}`: {reason}")]
    SchemaViolation { path: String, reason: String },

    /// The schema document itself is malformed.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// The path expression could not be parsed.
    #[error("invalid path expression `{path}`: {reason}")]
    Path { path: String, reason: String },

    /// XML could not be parsed.
    #[error("xml error: {0}")]
    Xml(String),

    /// The persisted document cannot be brought to the current version.
    #[error("cannot migrate document version {found} to {current}")]
    Migration { found: u32, current: u32 },

    /// A document is already live in the session.
    #[error("a configuration document is already loaded")]
    AlreadyLoaded,

    /// No document is live in the session.
    #[error("no configuration document is loaded")]
    NotLoaded,

    /// Cooperative cancel signal raised inside a transaction body.
    #[error("cancelled")]
    Cancel,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl DbError {
    pub(crate) fn lookup(path: &str, matches: usize) -> Self {
        DbError::Lookup {
            path: path.to_string(),
            matches,
        }
    }

    pub(crate) fn xml(e: impl fmt::Display) -> Self {
        DbError::Xml(e.to_string())
    }

    /// The validation error carried by this error, if any.
    pub fn as_value_error(&self) -> Option<&ValueError> {
        match self {
            DbError::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of a failed transaction. The tree has already been rolled back.
#[derive(thiserror::Error, Debug)]
pub enum TransactionError {
    /// One or more writes were rejected by validation.
    #[error("{} value(s) rejected: {}", .0.len(), join_errors(.0))]
    Rejected(Vec<ValueError>),

    /// The transaction body failed with a non-validation error.
    #[error("transaction aborted: {0}")]
    Aborted(#[source] DbError),
}

impl TransactionError {
    /// Validation errors collected by the transaction.
    pub fn value_errors(&self) -> &[ValueError] {
        match self {
            TransactionError::Rejected(errors) => errors,
            TransactionError::Aborted(_) => &[],
        }
    }
}

fn join_errors(errors: &[ValueError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
