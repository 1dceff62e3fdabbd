//! Document version migration.
//!
//! A persisted document carries its version on the root `version` attribute
//! (missing means version 1). [`Migrator`] upgrades it one step at a time
//! until it reaches the version of the schema in use.

use log::{debug, info};

use crate::{
    error::{DbError, Result},
    tree::{Element, path},
};

/// Upgrade of a document from one version to the next.
pub trait MigrationStep {
    /// Version this step upgrades from.
    fn from_version(&self) -> u32;

    /// Rewrite `root` in place. The migrator records the new version.
    fn apply(&self, root: &mut Element) -> Result<()>;
}

/// Version recorded on a document root.
pub fn document_version(root: &Element) -> Result<u32> {
    match root.attribute("version") {
        None => Ok(1),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| DbError::Xml(format!("invalid document version `{v}`"))),
    }
}

/// Ordered set of migration steps.
pub struct Migrator {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Migrator {
    /// A migrator without steps.
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Every step known to the crate.
    pub fn builtin() -> Self {
        Self::empty().with_step(V1ToV2)
    }

    pub fn with_step(mut self, step: impl MigrationStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Bring `root` to version `current` and return the version it had.
    ///
    /// # Errors
    ///
    /// [`DbError::Migration`] if the document is newer than `current` or no
    /// step continues from its version.
    pub fn migrate(&self, root: &mut Element, current: u32) -> Result<u32> {
        let found = document_version(root)?;
        if found > current {
            return Err(DbError::Migration { found, current });
        }

        let mut version = found;
        while version < current {
            let step = self
                .steps
                .iter()
                .find(|s| s.from_version() == version)
                .ok_or(DbError::Migration { found, current })?;
            info!("migrating configuration v{version} -> v{}", version + 1);
            step.apply(root)?;
            version += 1;
            root.set_attribute("version", version.to_string());
        }
        Ok(found)
    }
}

/// Adds chart settings to monitors, renames the `flowRate` surface report
/// and completes material densities.
struct V1ToV2;

fn descendants_mut<'a>(root: &'a mut Element, expr: &str) -> Result<Vec<&'a mut Element>> {
    let ids = path::select(root, expr)?;
    // traversal stops at a match, so no two borrows overlap
    let mut found = Vec::with_capacity(ids.len());
    collect_mut(root, &mut Vec::new(), &ids, &mut found);
    Ok(found)
}

fn collect_mut<'a>(
    node: &'a mut Element,
    id: &mut Vec<usize>,
    wanted: &[Vec<usize>],
    found: &mut Vec<&'a mut Element>,
) {
    if wanted.iter().any(|w| w == id) {
        found.push(node);
        return;
    }
    if !wanted.iter().any(|w| w.starts_with(id)) {
        return;
    }
    for (i, child) in node.children_mut().iter_mut().enumerate() {
        id.push(i);
        collect_mut(child, id, wanted, found);
        id.pop();
    }
}

fn ensure_chart_settings(monitor: &mut Element) {
    if monitor.child("showChart").is_none() {
        debug!("  adding showChart to {}", monitor.tag);
        let at = 1.min(monitor.children().len());
        monitor
            .children_mut()
            .insert(at, Element::new("showChart").with_text("false"));
    }
    if monitor.child("writeInterval").is_none() {
        debug!("  adding writeInterval to {}", monitor.tag);
        let at = 2.min(monitor.children().len());
        monitor
            .children_mut()
            .insert(at, Element::new("writeInterval").with_text("1"));
    }
}

impl MigrationStep for V1ToV2 {
    fn from_version(&self) -> u32 {
        1
    }

    fn apply(&self, root: &mut Element) -> Result<()> {
        for density in descendants_mut(root, ".//material/density")? {
            if density.child("polynomial").is_none() {
                debug!("  adding polynomial to density");
                density.push(Element::new("polynomial"));
            }
        }

        for monitors in ["forces/forceMonitor", "points/pointMonitor", "volumes/volumeMonitor"] {
            for monitor in descendants_mut(root, &format!(".//monitors/{monitors}"))? {
                ensure_chart_settings(monitor);
            }
        }

        for monitor in descendants_mut(root, ".//monitors/surfaces/surfaceMonitor")? {
            ensure_chart_settings(monitor);
            if let Some(report) = monitor.child_mut("reportType") {
                if report.text() == Some("flowRate") {
                    debug!("  changing flowRate to massFlowRate");
                    report.set_text(Some("massFlowRate".into()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::xml;

    const V1: &str = r#"<configuration>
      <materials><material mid="1"><name>air</name><density><constant>1</constant></density></material></materials>
      <monitors>
        <forces><forceMonitor><name>f</name><region/></forceMonitor></forces>
        <surfaces><surfaceMonitor><name>s</name><showChart>true</showChart><reportType>flowRate</reportType></surfaceMonitor></surfaces>
      </monitors>
    </configuration>"#;

    #[test]
    fn test_v1_to_v2() {
        let mut root = xml::parse(V1).unwrap();
        assert_eq!(Migrator::builtin().migrate(&mut root, 2).unwrap(), 1);
        assert_eq!(root.attribute("version"), Some("2"));

        let force = root.get(&[1, 0, 0]).unwrap();
        let tags: Vec<_> = force.children().iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, ["name", "showChart", "writeInterval", "region"]);
        assert_eq!(force.child_text("showChart"), Some("false"));

        let surface = root.get(&[1, 1, 0]).unwrap();
        assert_eq!(surface.child_text("showChart"), Some("true"));
        assert_eq!(surface.child_text("reportType"), Some("massFlowRate"));

        let density = root.get(&[0, 0, 1]).unwrap();
        assert!(density.child("polynomial").is_some());
    }

    #[test]
    fn test_current_document_is_untouched() {
        let mut root = xml::parse(r#"<configuration version="2"/>"#).unwrap();
        let before = root.clone();
        assert_eq!(Migrator::builtin().migrate(&mut root, 2).unwrap(), 2);
        assert_eq!(root, before);
    }

    #[test]
    fn test_unknown_versions_fail() {
        let mut root = xml::parse(r#"<configuration version="3"/>"#).unwrap();
        assert!(matches!(
            Migrator::builtin().migrate(&mut root, 2),
            Err(DbError::Migration { found: 3, current: 2 })
        ));

        let mut root = xml::parse(r#"<configuration version="1"/>"#).unwrap();
        assert!(matches!(
            Migrator::empty().migrate(&mut root, 2),
            Err(DbError::Migration { found: 1, .. })
        ));
    }
}
