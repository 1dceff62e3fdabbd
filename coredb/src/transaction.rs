//! Transactions.
//!
//! A transaction snapshots the whole tree when it begins. Rejected values are
//! recorded rather than aborting the batch, so a form with several fields
//! reports every bad input at once; on exit the tree is either kept, if the
//! body succeeded with no recorded errors and the document is valid, or
//! replaced by the snapshot.
//!
//! ```rust,no_run
//! # use coredb::{CoreDb, Outcome};
//! # fn demo(db: &mut CoreDb) -> Result<(), coredb::TransactionError> {
//! let outcome = db.transaction(|db| {
//!     db.set_labeled_value("/general/timeTransient", "true", Some("Transient"))?;
//!     db.set_labeled_value("/runCalculation/runConditions/endTime", "10", Some("End Time"))?;
//!     Ok(())
//! })?;
//! assert!(matches!(outcome, Outcome::Committed(())));
//! # Ok(())
//! # }
//! ```

use std::fmt;

use log::{debug, warn};

use crate::{
    error::{DbError, Result, TransactionError, ValueError},
    store::CoreDb,
    tree::Element,
};

/// Rollback point and bookkeeping of an open transaction.
#[derive(Debug)]
pub(crate) struct TxnState {
    backup: Element,
    /// Counter increments made inside the transaction.
    pub(crate) pending: u64,
    /// Values rejected inside the transaction.
    pub(crate) errors: Vec<ValueError>,
}

/// How a transaction ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Committed(T),
    /// The body raised [`DbError::Cancel`]; the tree was rolled back.
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }
}

/// Callback run as one step of a [`WriteBatch`].
pub type InvokeFn = Box<dyn FnOnce(&mut CoreDb) -> Result<()>>;

/// One pending mutation.
pub enum WriteItem {
    SetValue {
        path: String,
        value: String,
        label: Option<String>,
    },
    SetAttribute {
        path: String,
        name: String,
        value: String,
    },
    /// Append an XML fragment under `path`.
    Add { path: String, xml: String },
    Remove { path: String },
    Clear { path: String },
    Invoke(InvokeFn),
}

impl fmt::Debug for WriteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteItem::SetValue { path, value, label } => f
                .debug_struct("SetValue")
                .field("path", path)
                .field("value", value)
                .field("label", label)
                .finish(),
            WriteItem::SetAttribute { path, name, value } => f
                .debug_struct("SetAttribute")
                .field("path", path)
                .field("name", name)
                .field("value", value)
                .finish(),
            WriteItem::Add { path, xml } => f
                .debug_struct("Add")
                .field("path", path)
                .field("xml", xml)
                .finish(),
            WriteItem::Remove { path } => f.debug_struct("Remove").field("path", path).finish(),
            WriteItem::Clear { path } => f.debug_struct("Clear").field("path", path).finish(),
            WriteItem::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

/// Ordered list of mutations applied in one transaction.
#[derive(Debug, Default)]
pub struct WriteBatch {
    items: Vec<WriteItem>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push(WriteItem::SetValue {
            path: path.into(),
            value: value.into(),
            label: None,
        });
        self
    }

    /// Set a value whose rejection is reported under `label`.
    pub fn set_labeled_value(
        mut self,
        path: impl Into<String>,
        value: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.items.push(WriteItem::SetValue {
            path: path.into(),
            value: value.into(),
            label: Some(label.into()),
        });
        self
    }

    pub fn set_attribute(
        mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.items.push(WriteItem::SetAttribute {
            path: path.into(),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn add(mut self, path: impl Into<String>, xml: impl Into<String>) -> Self {
        self.items.push(WriteItem::Add {
            path: path.into(),
            xml: xml.into(),
        });
        self
    }

    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.items.push(WriteItem::Remove { path: path.into() });
        self
    }

    pub fn clear(mut self, path: impl Into<String>) -> Self {
        self.items.push(WriteItem::Clear { path: path.into() });
        self
    }

    pub fn invoke(mut self, f: impl FnOnce(&mut CoreDb) -> Result<()> + 'static) -> Self {
        self.items.push(WriteItem::Invoke(Box::new(f)));
        self
    }

    pub fn push(&mut self, item: WriteItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CoreDb {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// [`DbError::Misuse`] if one is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.txn.is_some() {
            return Err(DbError::Misuse("transactions cannot be nested".into()));
        }
        debug!("begin transaction");
        self.txn = Some(TxnState {
            backup: self.tree.clone(),
            pending: 0,
            errors: Vec::new(),
        });
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Values rejected so far in the open transaction.
    pub fn recorded_errors(&self) -> &[ValueError] {
        match &self.txn {
            Some(txn) => &txn.errors,
            None => &[],
        }
    }

    /// Close the open transaction, keeping its changes.
    ///
    /// If any value was rejected, or the document is no longer valid, the
    /// transaction is rolled back instead and the reason returned.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        let Some(txn) = self.txn.take() else {
            return Err(TransactionError::Aborted(DbError::Misuse(
                "commit without an open transaction".into(),
            )));
        };

        if !txn.errors.is_empty() {
            warn!("rolling back: {} value(s) rejected", txn.errors.len());
            self.restore(txn.backup);
            return Err(TransactionError::Rejected(txn.errors));
        }
        if let Err(e) = self.schema().validate(&self.tree) {
            warn!("rolling back: {e}");
            self.restore(txn.backup);
            return Err(TransactionError::Aborted(e));
        }

        debug!("commit transaction ({} change(s))", txn.pending);
        self.commit_count(txn.pending);
        Ok(())
    }

    /// Close the open transaction, restoring the tree as it was at
    /// [`CoreDb::begin`]. Does nothing without an open transaction.
    pub fn rollback(&mut self) {
        if let Some(txn) = self.txn.take() {
            debug!("rollback transaction");
            self.restore(txn.backup);
        }
    }

    fn restore(&mut self, backup: Element) {
        self.tree = backup;
        self.invalidate_cache();
    }

    /// Run `body` in a transaction.
    ///
    /// The body may stop early with `?`; a [`DbError::Cancel`] from the body
    /// rolls back and yields [`Outcome::Cancelled`].
    ///
    /// # Errors
    ///
    /// [`TransactionError::Rejected`] with every recorded value error when the
    /// body stops on a rejected value, or [`TransactionError::Aborted`] for
    /// any other failure, even if values were rejected before it. The tree is
    /// rolled back in both cases.
    pub fn transaction<T>(
        &mut self,
        body: impl FnOnce(&mut CoreDb) -> Result<T>,
    ) -> Result<Outcome<T>, TransactionError> {
        self.begin().map_err(TransactionError::Aborted)?;

        match body(self) {
            Ok(value) => self.commit().map(|()| Outcome::Committed(value)),
            Err(DbError::Cancel) => {
                debug!("transaction cancelled");
                self.rollback();
                Ok(Outcome::Cancelled)
            }
            Err(DbError::Value(v)) => {
                let mut errors = self
                    .txn
                    .as_mut()
                    .map(|t| std::mem::take(&mut t.errors))
                    .unwrap_or_default();
                self.rollback();
                if errors.is_empty() {
                    errors.push(v);
                }
                warn!("transaction rejected: {} value(s)", errors.len());
                Err(TransactionError::Rejected(errors))
            }
            Err(e) => {
                self.rollback();
                warn!("transaction aborted: {e}");
                Err(TransactionError::Aborted(e))
            }
        }
    }

    /// Apply every item of `batch` in one transaction.
    ///
    /// Rejected values do not stop the batch; every rejection is returned
    /// together. Any other failure stops the batch.
    pub fn apply(&mut self, batch: WriteBatch) -> Result<(), TransactionError> {
        let outcome = self.transaction(|db| {
            for item in batch.items {
                let result = match item {
                    WriteItem::SetValue { path, value, label } => {
                        db.set_labeled_value(&path, &value, label.as_deref())
                    }
                    WriteItem::SetAttribute { path, name, value } => {
                        db.set_attribute(&path, &name, &value)
                    }
                    WriteItem::Add { path, xml } => db.add_element_from_string(&path, &xml),
                    WriteItem::Remove { path } => db.remove_element(&path),
                    WriteItem::Clear { path } => db.clear_element(&path),
                    WriteItem::Invoke(f) => f(db),
                };
                match result {
                    Ok(()) | Err(DbError::Value(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })?;
        match outcome {
            Outcome::Committed(()) | Outcome::Cancelled => Ok(()),
        }
    }
}
