//! Subcommand handlers.
//!
//! Every command opens the project file in a fresh [`Session`], works on the
//! live document and writes it back when it changed.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use colored::Colorize;
use coredb::{
    MonitorKind, Session, StoreConfig, TransactionError, Value, WriteBatch, migrate, persist,
    tree::xml,
};
use log::{debug, info};

pub struct Project {
    session: Session,
}

impl Project {
    pub fn new(config: Option<&Path>) -> Result<Self> {
        let config = match config {
            Some(path) => StoreConfig::from_path(path)
                .with_context(|| format!("failed to read store config {}", path.display()))?,
            None => StoreConfig::default(),
        };
        debug!("store config: {config:?}");
        let session = Session::with_config(config).context("failed to prepare the schema")?;
        Ok(Self { session })
    }

    fn open(&mut self, file: &Path) -> Result<()> {
        self.session
            .load(file)
            .with_context(|| format!("failed to load {}", file.display()))?;
        Ok(())
    }

    pub fn create(&mut self, file: &Path, force: bool) -> Result<()> {
        if file.exists() && !force {
            bail!("{} already exists, use --force to overwrite", file.display());
        }
        let db = self.session.create()?;
        db.save_as(file)
            .with_context(|| format!("failed to write {}", file.display()))?;
        println!("{} {}", "created".green().bold(), file.display());
        Ok(())
    }

    pub fn get(&mut self, file: &Path, path: &str) -> Result<()> {
        self.open(file)?;
        let db = self.session.db()?;
        println!("{}", db.get_value(path)?);
        Ok(())
    }

    pub fn set(&mut self, file: &Path, assignments: &[String]) -> Result<()> {
        let mut batch = WriteBatch::new();
        for assignment in assignments {
            let (path, value) = parse_assignment(assignment)?;
            batch = batch.set_labeled_value(path, value, label_of(path));
        }

        self.open(file)?;
        let db = self.session.db_mut()?;
        match db.apply(batch) {
            Ok(()) => {}
            Err(TransactionError::Rejected(errors)) => {
                for e in &errors {
                    eprintln!("{} {e}", "rejected".yellow().bold());
                }
                bail!("nothing was written, {} value(s) rejected", errors.len());
            }
            Err(e) => return Err(e.into()),
        }

        if db.is_modified() {
            db.save(file)?;
            info!("{} change(s) written", db.config_count());
        } else {
            println!("{}", "unchanged".dimmed());
        }
        Ok(())
    }

    pub fn bulk(&mut self, file: &Path, path: &str, input: Option<&Path>) -> Result<()> {
        self.open(file)?;
        let db = self.session.db_mut()?;
        let Some(input) = input else {
            let value = db.get_bulk(path)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        };

        let text = std::fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", input.display()))?;
        db.transaction(|db| db.set_bulk(path, &value))?;
        db.save(file)?;
        println!("{} {path}", "replaced".green().bold());
        Ok(())
    }

    pub fn info(&mut self, file: &Path) -> Result<()> {
        self.open(file)?;
        let db = self.session.db()?;

        println!("{}", "regions".bold());
        for region in db.get_regions()? {
            println!("  {}", region.cyan());
            for (id, name) in db.get_cell_zones(&region)? {
                println!("    cell zone {id:>4}  {name}");
            }
            for bc in db.get_boundary_conditions(&region)? {
                println!("    boundary  {:>4}  {} ({})", bc.id, bc.name, bc.physical_type);
            }
        }

        println!("{}", "monitors".bold());
        for kind in MonitorKind::ALL {
            for name in db.get_monitors(kind)? {
                println!("  {:<8} {name}", kind.container());
            }
        }

        println!("{}", "batch parameters".bold());
        for p in db.get_batch_parameters()? {
            println!("  ${} = {} ({} use(s))", p.name, p.value, p.usages);
        }
        Ok(())
    }

    pub fn validate(&mut self, file: &Path) -> Result<()> {
        self.open(file)?;
        let db = self.session.db()?;
        db.schema().validate(db.root())?;
        println!("{} {}", "valid".green().bold(), file.display());
        Ok(())
    }

    pub fn migrate(&mut self, file: &Path) -> Result<()> {
        let text = persist::read_document(file)?;
        let found = migrate::document_version(&xml::parse(&text)?)?;
        let current = self.session.schema().version();
        if found == current {
            println!("{} is at version {current}", file.display());
            return Ok(());
        }

        self.open(file)?;
        self.session.db_mut()?.save(file)?;
        println!(
            "{} {} v{found} -> v{current}",
            "migrated".green().bold(),
            file.display()
        );
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        print!("{}", toml::to_string_pretty(self.session.config())?);
        Ok(())
    }

    pub fn print_config_schema() -> Result<()> {
        let schema = schemars::schema_for!(StoreConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    let (path, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("`{assignment}` is not of the form path=value"))?;
    let path = path.trim();
    if path.is_empty() {
        bail!("`{assignment}` has an empty path");
    }
    Ok((path, value))
}

/// Last step of a path, without predicates.
fn label_of(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.split('[').next().unwrap_or(last)
}
