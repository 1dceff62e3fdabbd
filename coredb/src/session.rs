//! Document lifecycle.
//!
//! A [`Session`] holds what outlives a single document (the compiled schema,
//! the template fragments and the store configuration) plus at most one live
//! [`CoreDb`].

use std::{path::Path, sync::Arc};

use log::info;

use crate::{
    config::StoreConfig,
    error::{DbError, Result},
    migrate::Migrator,
    schema::Schema,
    store::CoreDb,
    template::Templates,
};

pub struct Session {
    config: StoreConfig,
    schema: Arc<Schema>,
    templates: Arc<Templates>,
    migrator: Migrator,
    db: Option<CoreDb>,
}

impl Session {
    /// A session using the packaged schema and templates.
    pub fn new() -> Result<Self> {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Result<Self> {
        let schema = config.load_schema()?;
        let templates = config.load_templates()?;
        Ok(Self {
            config,
            schema,
            templates,
            migrator: Migrator::builtin(),
            db: None,
        })
    }

    /// Replace the migration steps used by [`Session::load`].
    pub fn with_migrator(mut self, migrator: Migrator) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Create a document from the packaged default.
    ///
    /// # Errors
    ///
    /// [`DbError::AlreadyLoaded`] if a document is live.
    pub fn create(&mut self) -> Result<&mut CoreDb> {
        if self.db.is_some() {
            return Err(DbError::AlreadyLoaded);
        }
        let db = CoreDb::new(self.schema.clone(), self.templates.clone())?
            .with_limits(self.config.limits);
        info!("created a new configuration");
        Ok(self.db.insert(db))
    }

    /// Load a document from a container.
    ///
    /// # Errors
    ///
    /// [`DbError::AlreadyLoaded`] if a document is live.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&mut CoreDb> {
        if self.db.is_some() {
            return Err(DbError::AlreadyLoaded);
        }
        let db = CoreDb::load(
            path,
            self.schema.clone(),
            self.templates.clone(),
            &self.migrator,
        )?
        .with_limits(self.config.limits);
        Ok(self.db.insert(db))
    }

    /// Drop the live document, if any.
    pub fn destroy(&mut self) {
        if self.db.take().is_some() {
            info!("configuration closed");
        }
    }

    pub fn loaded(&self) -> bool {
        self.db.is_some()
    }

    pub fn db(&self) -> Result<&CoreDb> {
        self.db.as_ref().ok_or(DbError::NotLoaded)
    }

    pub fn db_mut(&mut self) -> Result<&mut CoreDb> {
        self.db.as_mut().ok_or(DbError::NotLoaded)
    }
}
