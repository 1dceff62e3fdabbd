//! Saving and loading documents.
//!
//! A project file is a tar container. The configuration is the UTF-8 XML
//! document stored in the entry named [`CONFIGURATION_ENTRY`]; other entries
//! belong to other parts of the application and are carried over on save.

use std::{
    fs,
    io::{Cursor, Read},
    path::Path,
    sync::Arc,
};

use log::info;

use crate::{
    error::{DbError, Result},
    migrate::Migrator,
    schema::Schema,
    store::CoreDb,
    template::Templates,
    tree::xml,
};

/// Name of the container entry holding the document.
pub const CONFIGURATION_ENTRY: &str = "configuration";

struct Entry {
    header: tar::Header,
    name: String,
    data: Vec<u8>,
}

fn read_entries(bytes: &[u8]) -> Result<Vec<Entry>> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let header = entry.header().clone();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push(Entry { header, name, data });
    }
    Ok(entries)
}

fn write_entries(path: &Path, entries: &[Entry], document: &[u8]) -> Result<()> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = entry.header.clone();
        builder.append_data(&mut header, &entry.name, entry.data.as_slice())?;
    }

    let mut header = tar::Header::new_gnu();
    header.set_size(document.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, CONFIGURATION_ENTRY, document)?;

    fs::write(path, builder.into_inner()?)?;
    Ok(())
}

/// Read the document text out of a container.
pub fn read_document(path: impl AsRef<Path>) -> Result<String> {
    let bytes = fs::read(path.as_ref())?;
    let entry = read_entries(&bytes)?
        .into_iter()
        .find(|e| e.name == CONFIGURATION_ENTRY)
        .ok_or_else(|| {
            DbError::Xml(format!(
                "{}: no `{CONFIGURATION_ENTRY}` entry",
                path.as_ref().display()
            ))
        })?;
    String::from_utf8(entry.data).map_err(DbError::xml)
}

impl CoreDb {
    /// Load a container, migrating the document to the schema version.
    pub fn load(
        path: impl AsRef<Path>,
        schema: Arc<Schema>,
        templates: Arc<Templates>,
        migrator: &Migrator,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = read_document(path)?;
        let mut root = xml::parse(&text)?;
        let found = migrator.migrate(&mut root, schema.version())?;
        info!(
            "loaded {} (document v{found}, schema v{})",
            path.display(),
            schema.version()
        );
        CoreDb::with_tree(schema, templates, root)
    }

    /// Write the document into an existing container, keeping its other
    /// entries. A missing file is created.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let others = if path.exists() {
            read_entries(&fs::read(path)?)?
                .into_iter()
                .filter(|e| e.name != CONFIGURATION_ENTRY)
                .collect()
        } else {
            Vec::new()
        };
        write_entries(path, &others, self.to_xml()?.as_bytes())?;
        info!("saved {}", path.display());
        self.mark_saved();
        Ok(())
    }

    /// Write the document into a new container, replacing any file at
    /// `path`.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_entries(path, &[], self.to_xml()?.as_bytes())?;
        info!("saved as {}", path.display());
        self.mark_saved();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::db;

    fn reopen(path: &Path, db: &CoreDb) -> CoreDb {
        CoreDb::load(
            path,
            Arc::new(db.schema().clone()),
            Arc::new(db.templates().clone()),
            &Migrator::builtin(),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("case.tar");

        let mut db = db();
        db.set_value("/general/timeTransient", "true").unwrap();
        db.add_region("fluid").unwrap();
        db.add_cell_zone("fluid", "rotor").unwrap();
        assert!(db.is_modified());
        db.save_as(&file).unwrap();
        assert!(!db.is_modified());

        let loaded = reopen(&file, &db);
        assert_eq!(loaded.root(), db.root());
        assert!(!loaded.is_modified());
        assert_eq!(loaded.get_cell_zones("fluid").unwrap()[0].1, "rotor");
    }

    #[test]
    fn test_save_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("case.tar");

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        builder.append_data(&mut header, "mesh", &b"mesh"[..]).unwrap();
        fs::write(&file, builder.into_inner().unwrap()).unwrap();

        let mut db = db();
        db.save(&file).unwrap();
        db.set_value("/general/timeTransient", "true").unwrap();
        db.save(&file).unwrap();

        let entries = read_entries(&fs::read(&file).unwrap()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["mesh", CONFIGURATION_ENTRY]);
        assert_eq!(entries[0].data, b"mesh");
        assert!(reopen(&file, &db).get_bool("/general/timeTransient").unwrap());

        db.save_as(&file).unwrap();
        assert_eq!(read_entries(&fs::read(&file).unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_migrates_old_documents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("old.tar");

        let db = db();
        let mut root = db.root().clone();
        root.remove_attribute("version");
        let text = xml::to_document(&root, db.schema().namespace()).unwrap();
        write_entries(&file, &[], text.as_bytes()).unwrap();

        let loaded = reopen(&file, &db);
        assert_eq!(loaded.root().attribute("version"), Some("2"));
    }

    #[test]
    fn test_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.tar");
        fs::write(&file, tar::Builder::new(Vec::new()).into_inner().unwrap()).unwrap();
        assert!(matches!(read_document(&file), Err(DbError::Xml(_))));
    }
}
