//! Template fragments used to seed new repeatable entities.
//!
//! Each fragment is parsed once when the library is built. Insertions take a
//! deep copy, so the stored fragment is never touched by the document.

use std::{collections::HashMap, path::Path};

use log::debug;

use crate::{
    error::{DbError, Result},
    tree::{Element, xml},
};

/// Kind of entity a fragment creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Region,
    CellZone,
    BoundaryCondition,
    ForceMonitor,
    PointMonitor,
    SurfaceMonitor,
    VolumeMonitor,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 7] = [
        TemplateKind::Region,
        TemplateKind::CellZone,
        TemplateKind::BoundaryCondition,
        TemplateKind::ForceMonitor,
        TemplateKind::PointMonitor,
        TemplateKind::SurfaceMonitor,
        TemplateKind::VolumeMonitor,
    ];

    /// File name of the fragment inside a template directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateKind::Region => "region.xml",
            TemplateKind::CellZone => "cell_zone.xml",
            TemplateKind::BoundaryCondition => "boundary_condition.xml",
            TemplateKind::ForceMonitor => "force_monitor.xml",
            TemplateKind::PointMonitor => "point_monitor.xml",
            TemplateKind::SurfaceMonitor => "surface_monitor.xml",
            TemplateKind::VolumeMonitor => "volume_monitor.xml",
        }
    }

    fn builtin_text(&self) -> &'static str {
        match self {
            TemplateKind::Region => include_str!("../resources/templates/region.xml"),
            TemplateKind::CellZone => include_str!("../resources/templates/cell_zone.xml"),
            TemplateKind::BoundaryCondition => {
                include_str!("../resources/templates/boundary_condition.xml")
            }
            TemplateKind::ForceMonitor => include_str!("../resources/templates/force_monitor.xml"),
            TemplateKind::PointMonitor => include_str!("../resources/templates/point_monitor.xml"),
            TemplateKind::SurfaceMonitor => {
                include_str!("../resources/templates/surface_monitor.xml")
            }
            TemplateKind::VolumeMonitor => {
                include_str!("../resources/templates/volume_monitor.xml")
            }
        }
    }
}

/// Parsed template fragments, shared read-only between documents.
#[derive(Debug, Clone)]
pub struct Templates {
    fragments: HashMap<TemplateKind, Element>,
}

impl Templates {
    /// Fragments packaged with the crate.
    pub fn builtin() -> Result<Self> {
        let mut fragments = HashMap::new();
        for kind in TemplateKind::ALL {
            fragments.insert(kind, xml::parse(kind.builtin_text())?);
        }
        Ok(Self { fragments })
    }

    /// Packaged fragments overridden by any `*.xml` of the same name in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut templates = Self::builtin()?;
        for kind in TemplateKind::ALL {
            let file = dir.join(kind.file_name());
            if !file.exists() {
                continue;
            }
            debug!("template {kind:?} overridden by {}", file.display());
            let text = std::fs::read_to_string(&file)?;
            let fragment = xml::parse(&text)?;
            let expected = templates.fragments[&kind].tag.clone();
            if fragment.tag != expected {
                return Err(DbError::Xml(format!(
                    "{}: root element must be `{expected}`, found `{}`",
                    file.display(),
                    fragment.tag
                )));
            }
            templates.fragments.insert(kind, fragment);
        }
        Ok(templates)
    }

    /// A fresh copy of the fragment.
    pub fn instantiate(&self, kind: TemplateKind) -> Element {
        self.fragments.get(&kind).cloned().unwrap_or_default()
    }
}
