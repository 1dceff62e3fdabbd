//! Repeatable entities: regions, cell zones, boundary conditions, surface
//! tensions, monitors, batch parameters and user-defined scalars.
//!
//! New entities are created from template fragments, named and stamped with
//! an id from their namespace.

use log::debug;

use crate::{
    error::{DbError, Result, ValueError, ValueErrorKind},
    ids::{self, IdCategory},
    schema::BATCH_PARAMETER_ATTRIBUTE,
    store::{BATCH_PARAMETERS_PATH, CoreDb},
    template::TemplateKind,
    tree::{Element, path::quote},
};

const REGIONS: &str = "/regions";
const MONITORS: &str = "/monitors";
const SURFACE_TENSIONS: &str = "phaseInteractions/surfaceTensions";

/// Kind of monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    Force,
    Point,
    Surface,
    Volume,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 4] = [
        MonitorKind::Force,
        MonitorKind::Point,
        MonitorKind::Surface,
        MonitorKind::Volume,
    ];

    /// Element holding the monitors of this kind.
    pub fn container(&self) -> &'static str {
        match self {
            MonitorKind::Force => "forces",
            MonitorKind::Point => "points",
            MonitorKind::Surface => "surfaces",
            MonitorKind::Volume => "volumes",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MonitorKind::Force => "forceMonitor",
            MonitorKind::Point => "pointMonitor",
            MonitorKind::Surface => "surfaceMonitor",
            MonitorKind::Volume => "volumeMonitor",
        }
    }

    /// Prefix of generated names, completed by a number.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            MonitorKind::Force => "force-mon-",
            MonitorKind::Point => "point-mon-",
            MonitorKind::Surface => "surface-mon-",
            MonitorKind::Volume => "volume-mon-",
        }
    }

    fn template(&self) -> TemplateKind {
        match self {
            MonitorKind::Force => TemplateKind::ForceMonitor,
            MonitorKind::Point => TemplateKind::PointMonitor,
            MonitorKind::Surface => TemplateKind::SurfaceMonitor,
            MonitorKind::Volume => TemplateKind::VolumeMonitor,
        }
    }

    fn path(&self) -> String {
        format!("{MONITORS}/{}/{}", self.container(), self.tag())
    }
}

/// A declared batch parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchParameter {
    pub name: String,
    pub value: String,
    /// Number of values referencing the parameter.
    pub usages: usize,
}

/// A boundary condition as listed for a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySummary {
    pub id: u32,
    pub name: String,
    pub physical_type: String,
}

fn region_path(region: &str) -> String {
    format!("{REGIONS}/region[name={}]", quote(region))
}

fn id_of(element: &Element, attribute: &str) -> Option<u32> {
    element.attribute(attribute).and_then(|v| v.parse().ok())
}

fn name_of(element: &Element) -> String {
    element.child_text("name").unwrap_or("").to_string()
}

fn set_child_text(element: &mut Element, tag: &str, text: &str) {
    match element.child_mut(tag) {
        Some(child) => child.set_text(Some(text.to_string())),
        None => element.push(Element::new(tag).with_text(text)),
    }
}

impl CoreDb {
    /// Allocate an id in `category` among every element of `path`.
    fn allocate(&self, path: &str, category: IdCategory) -> Result<u32> {
        let attribute = category.attribute();
        let max = self.limits().max(category);
        let elements = self.get_elements(path)?;
        ids::first_free(elements.iter().filter_map(|e| e.attribute(attribute)), max).ok_or_else(
            || DbError::Overflow {
                attribute: attribute.into(),
                max,
            },
        )
    }

    /// Append a new entity and count one change.
    fn insert(&mut self, parent: &str, element: Element) -> Result<()> {
        let parent_id = self.single(parent)?;
        self.guarded(true, |db| {
            db.node_mut(&parent_id)?.push(element);
            Ok(())
        })?;
        self.bump(1);
        Ok(())
    }

    // ---- regions --------------------------------------------------------

    /// Names of every region in document order.
    pub fn get_regions(&self) -> Result<Vec<String>> {
        Ok(self
            .get_elements(&format!("{REGIONS}/region"))?
            .into_iter()
            .map(name_of)
            .collect())
    }

    pub fn has_mesh(&self) -> bool {
        self.exists(&format!("{REGIONS}/region"))
    }

    /// Add an empty region.
    ///
    /// # Errors
    ///
    /// [`DbError::Exists`] if a region of that name is already present.
    pub fn add_region(&mut self, name: &str) -> Result<()> {
        if self.exists(&region_path(name)) {
            return Err(DbError::Exists {
                path: REGIONS.into(),
                name: name.into(),
            });
        }
        let mut region = self.templates().instantiate(TemplateKind::Region);
        set_child_text(&mut region, "name", name);
        self.insert(REGIONS, region)?;
        debug!("add_region({name})");
        Ok(())
    }

    /// Remove every region.
    pub fn clear_regions(&mut self) -> Result<()> {
        self.clear_element(REGIONS)
    }

    // ---- cell zones -----------------------------------------------------

    /// Add a cell zone to `region` and return its id. Ids are unique across
    /// all regions.
    pub fn add_cell_zone(&mut self, region: &str, name: &str) -> Result<u32> {
        let region_path = region_path(region);
        let zones = format!("{region_path}/cellZones");
        if self.exists(&format!("{zones}/cellZone[name={}]", quote(name))) {
            return Err(DbError::Exists {
                path: zones,
                name: name.into(),
            });
        }
        let id = self.allocate(&format!("{REGIONS}/region/cellZones/cellZone"), IdCategory::CellZone)?;

        let mut zone = self.templates().instantiate(TemplateKind::CellZone);
        set_child_text(&mut zone, "name", name);
        zone.set_attribute("czid", id.to_string());
        self.insert(&zones, zone)?;
        debug!("add_cell_zone({region}, {name}) -> {id}");
        Ok(id)
    }

    /// `(czid, name)` of every cell zone of `region`.
    pub fn get_cell_zones(&self, region: &str) -> Result<Vec<(u32, String)>> {
        Ok(self
            .get_elements(&format!("{}/cellZones/cellZone", region_path(region)))?
            .into_iter()
            .filter_map(|e| Some((id_of(e, "czid")?, name_of(e))))
            .collect())
    }

    /// Ids of the cell zones of `region` with the given zone type.
    pub fn get_cell_zones_by_type(&self, region: &str, zone_type: &str) -> Result<Vec<u32>> {
        Ok(self
            .get_elements(&format!(
                "{}/cellZones/cellZone[zoneType={}]",
                region_path(region),
                quote(zone_type)
            ))?
            .into_iter()
            .filter_map(|e| id_of(e, "czid"))
            .collect())
    }

    // ---- boundary conditions --------------------------------------------

    /// Add a boundary condition to `region` and return its id. Ids are
    /// unique across all regions.
    pub fn add_boundary_condition(
        &mut self,
        region: &str,
        name: &str,
        geometrical_type: Option<&str>,
        physical_type: &str,
    ) -> Result<u32> {
        let parent = format!("{}/boundaryConditions", region_path(region));
        if self.exists(&format!("{parent}/boundaryCondition[name={}]", quote(name))) {
            return Err(DbError::Exists {
                path: parent,
                name: name.into(),
            });
        }
        let id = self.allocate(
            &format!("{REGIONS}/region/boundaryConditions/boundaryCondition"),
            IdCategory::BoundaryCondition,
        )?;

        let mut bc = self.templates().instantiate(TemplateKind::BoundaryCondition);
        set_child_text(&mut bc, "name", name);
        bc.set_attribute("bcid", id.to_string());
        if let Some(geometrical_type) = geometrical_type {
            set_child_text(&mut bc, "geometricalType", geometrical_type);
        }
        set_child_text(&mut bc, "physicalType", physical_type);
        self.insert(&parent, bc)?;
        debug!("add_boundary_condition({region}, {name}) -> {id}");
        Ok(id)
    }

    /// Every boundary condition of `region`.
    pub fn get_boundary_conditions(&self, region: &str) -> Result<Vec<BoundarySummary>> {
        Ok(self
            .get_elements(&format!(
                "{}/boundaryConditions/boundaryCondition",
                region_path(region)
            ))?
            .into_iter()
            .filter_map(|e| {
                Some(BoundarySummary {
                    id: id_of(e, "bcid")?,
                    name: name_of(e),
                    physical_type: e.child_text("physicalType").unwrap_or("").to_string(),
                })
            })
            .collect())
    }

    /// Overwrite boundary condition `target` with the settings of `source`,
    /// keeping the id, name and geometrical type of `target`.
    pub fn copy_boundary_condition(&mut self, source: u32, target: u32) -> Result<()> {
        let by_id = |id: u32| {
            format!("{REGIONS}/region/boundaryConditions/boundaryCondition[@bcid=\"{id}\"]")
        };
        let target_id = self.single(&by_id(target))?;
        let old = self.node(&target_id)?;
        let name = name_of(old);
        let geometrical = old.child_text("geometricalType").unwrap_or("").to_string();

        let mut copy = self.get_element(&by_id(source))?.clone();
        copy.set_attribute("bcid", target.to_string());
        set_child_text(&mut copy, "name", &name);
        set_child_text(&mut copy, "geometricalType", &geometrical);

        self.guarded(true, |db| {
            *db.node_mut(&target_id)? = copy;
            Ok(())
        })?;
        self.bump(1);
        debug!("copy_boundary_condition({source} -> {target})");
        Ok(())
    }

    // ---- monitors -------------------------------------------------------

    /// Add a monitor with the first free generated name and return the name.
    pub fn add_monitor(&mut self, kind: MonitorKind) -> Result<String> {
        let names = self.get_monitors(kind)?;
        let max = self.limits().max(IdCategory::Monitor);
        let index = ids::first_fit(max, |i| {
            let candidate = format!("{}{i}", kind.name_prefix());
            names.contains(&candidate)
        })
        .ok_or_else(|| DbError::Overflow {
            attribute: IdCategory::Monitor.attribute().into(),
            max,
        })?;
        let name = format!("{}{index}", kind.name_prefix());

        let mut monitor = self.templates().instantiate(kind.template());
        set_child_text(&mut monitor, "name", &name);
        self.insert(&format!("{MONITORS}/{}", kind.container()), monitor)?;
        debug!("add_monitor({kind:?}) -> {name}");
        Ok(name)
    }

    /// Remove a monitor by name.
    ///
    /// # Errors
    ///
    /// [`DbError::Lookup`] if there is no such monitor.
    pub fn remove_monitor(&mut self, kind: MonitorKind, name: &str) -> Result<()> {
        let path = format!("{}[name={}]", kind.path(), quote(name));
        self.single(&path)?;
        self.remove_element(&path)
    }

    /// Names of the monitors of one kind.
    pub fn get_monitors(&self, kind: MonitorKind) -> Result<Vec<String>> {
        Ok(self
            .get_elements(&kind.path())?
            .into_iter()
            .map(name_of)
            .collect())
    }

    /// Remove every monitor of every kind.
    pub fn clear_monitors(&mut self) -> Result<()> {
        for kind in MonitorKind::ALL {
            self.clear_element(&format!("{MONITORS}/{}", kind.container()))?;
        }
        Ok(())
    }

    // ---- batch parameters -----------------------------------------------

    /// Every declared parameter with the number of values referencing it.
    pub fn get_batch_parameters(&self) -> Result<Vec<BatchParameter>> {
        let mut parameters: Vec<BatchParameter> = self
            .get_elements(&format!("{BATCH_PARAMETERS_PATH}/parameter"))?
            .into_iter()
            .map(|e| BatchParameter {
                name: name_of(e),
                value: e.child_text("value").unwrap_or("").to_string(),
                usages: 0,
            })
            .collect();

        for e in self.root().descendants_with_attribute(BATCH_PARAMETER_ATTRIBUTE) {
            let Some(used) = e.attribute(BATCH_PARAMETER_ATTRIBUTE) else {
                continue;
            };
            if let Some(p) = parameters.iter_mut().find(|p| p.name == used) {
                p.usages += 1;
            }
        }
        Ok(parameters)
    }

    /// `(name, value)` of every declared parameter.
    pub fn get_batch_defaults(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .get_batch_parameters()?
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect())
    }

    /// Declare a batch parameter.
    pub fn add_batch_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        let existing = format!("{BATCH_PARAMETERS_PATH}/parameter[name={}]", quote(name));
        if self.exists(&existing) {
            return Err(DbError::Exists {
                path: BATCH_PARAMETERS_PATH.into(),
                name: name.into(),
            });
        }
        let parameter = Element::new("parameter")
            .with_child(Element::new("name").with_text(name))
            .with_child(Element::new("value").with_text(value.trim()));
        self.insert(BATCH_PARAMETERS_PATH, parameter)?;
        debug!("add_batch_parameter({name} = {value})");
        Ok(())
    }

    /// Remove a batch parameter no value refers to.
    ///
    /// A referenced parameter is rejected with
    /// [`ValueErrorKind::Referenced`].
    pub fn remove_batch_parameter(&mut self, name: &str) -> Result<()> {
        let path = format!("{BATCH_PARAMETERS_PATH}/parameter[name={}]", quote(name));
        self.single(&path)?;
        let usages = self
            .get_batch_parameters()?
            .into_iter()
            .find(|p| p.name == name)
            .map_or(0, |p| p.usages);
        if usages > 0 {
            return Err(self.reject(ValueError::new(ValueErrorKind::Referenced, &path, name)));
        }
        self.remove_element(&path)
    }

    // ---- surface tensions -----------------------------------------------

    /// `(mid1, mid2, value)` of every surface tension in `region`. A value
    /// bound to a batch parameter is listed as `$name`.
    pub fn get_surface_tensions(&self, region: &str) -> Result<Vec<(u32, u32, String)>> {
        let region_path = region_path(region);
        self.single(&region_path)?;
        let tensions = self.get_elements(&format!("{region_path}/{SURFACE_TENSIONS}/surfaceTension"))?;

        Ok(tensions
            .into_iter()
            .filter_map(|e| {
                let mut mids = e
                    .children()
                    .iter()
                    .filter(|c| c.tag == "mid")
                    .filter_map(|c| c.text()?.trim().parse::<u32>().ok());
                let (mid1, mid2) = (mids.next()?, mids.next()?);
                let value = e.child("value")?;
                let value = match value.attribute(BATCH_PARAMETER_ATTRIBUTE) {
                    Some(name) => format!("${name}"),
                    None => value.text().unwrap_or("").to_string(),
                };
                Some((mid1, mid2, value))
            })
            .collect())
    }

    /// Declare a surface tension between two materials of `region`, with a
    /// value of `0`. Does nothing if the pair, in either order, is already
    /// declared.
    pub fn add_surface_tension(&mut self, region: &str, mid1: u32, mid2: u32) -> Result<()> {
        let region_path = region_path(region);
        self.single(&region_path)?;
        let parent = format!("{region_path}/{SURFACE_TENSIONS}");
        if self.exists(&format!("{parent}/surfaceTension[mid=\"{mid1}\"][mid=\"{mid2}\"]")) {
            return Ok(());
        }

        let tension = Element::new("surfaceTension")
            .with_child(Element::new("mid").with_text(mid1.to_string()))
            .with_child(Element::new("mid").with_text(mid2.to_string()))
            .with_child(Element::new("value").with_text("0"));
        if self.exists(&parent) {
            self.insert(&parent, tension)?;
        } else {
            let interactions = Element::new("phaseInteractions")
                .with_child(Element::new("surfaceTensions").with_child(tension));
            self.insert(&region_path, interactions)?;
        }
        debug!("add_surface_tension({region}, {mid1}, {mid2})");
        Ok(())
    }

    // ---- user-defined scalars -------------------------------------------

    /// `(scalarID, fieldName)` of every user-defined scalar. The built-in
    /// scalar `0` is not listed.
    pub fn get_user_defined_scalars(&self) -> Result<Vec<(u32, String)>> {
        self.scalars("/models/userDefinedScalars/scalar")
    }

    /// User-defined scalars solved in `region`.
    pub fn get_user_defined_scalars_in_region(&self, region: &str) -> Result<Vec<(u32, String)>> {
        self.scalars(&format!(
            "/models/userDefinedScalars/scalar[region={}]",
            quote(region)
        ))
    }

    fn scalars(&self, path: &str) -> Result<Vec<(u32, String)>> {
        Ok(self
            .get_elements(path)?
            .into_iter()
            .filter_map(|e| {
                let id = id_of(e, "scalarID")?;
                (id != 0).then(|| (id, e.child_text("fieldName").unwrap_or("").to_string()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ids::IdLimits, store::tests::db};

    #[test]
    fn test_cell_zone_ids_are_global() {
        let mut db = db();
        db.add_region("r1").unwrap();
        db.add_region("r2").unwrap();
        assert_eq!(db.get_regions().unwrap(), ["r1", "r2"]);
        assert!(db.has_mesh());

        assert_eq!(db.add_cell_zone("r1", "z1").unwrap(), 1);
        assert_eq!(db.add_cell_zone("r2", "z1").unwrap(), 2);
        assert_eq!(db.add_cell_zone("r1", "z2").unwrap(), 3);
        assert!(matches!(db.add_cell_zone("r1", "z1"), Err(DbError::Exists { .. })));
        assert_eq!(
            db.get_cell_zones("r1").unwrap(),
            [(1, "z1".to_string()), (3, "z2".to_string())]
        );
        assert_eq!(db.get_cell_zones_by_type("r1", "none").unwrap(), [1, 3]);
        assert!(db.get_cell_zones_by_type("r1", "mrf").unwrap().is_empty());
    }

    #[test]
    fn test_names_with_both_quote_kinds_are_unique() {
        let mut db = db();
        db.add_region("r'1\"").unwrap();
        assert!(matches!(db.add_region("r'1\""), Err(DbError::Exists { .. })));

        let zone = "z\"1'";
        assert_eq!(db.add_cell_zone("r'1\"", zone).unwrap(), 1);
        assert!(matches!(db.add_cell_zone("r'1\"", zone), Err(DbError::Exists { .. })));
        assert_eq!(db.get_cell_zones("r'1\"").unwrap(), [(1, zone.to_string())]);

        db.add_boundary_condition("r'1\"", "a\\b\"", None, "wall").unwrap();
        assert!(matches!(
            db.add_boundary_condition("r'1\"", "a\\b\"", None, "wall"),
            Err(DbError::Exists { .. })
        ));
    }

    #[test]
    fn test_surface_tensions() {
        let mut db = db();
        db.add_region("r1").unwrap();
        assert!(db.get_surface_tensions("r1").unwrap().is_empty());

        db.add_surface_tension("r1", 1, 2).unwrap();
        db.add_surface_tension("r1", 2, 1).unwrap();
        db.add_surface_tension("r1", 1, 3).unwrap();
        assert_eq!(
            db.get_surface_tensions("r1").unwrap(),
            [(1, 2, "0".to_string()), (1, 3, "0".to_string())]
        );

        let value = "/regions/region[name=\"r1\"]/phaseInteractions/surfaceTensions\
                     /surfaceTension[mid=\"3\"]/value";
        db.set_value(value, "0.072").unwrap();
        assert!(db.set_value(value, "-1").is_err());
        assert_eq!(db.get_surface_tensions("r1").unwrap()[1], (1, 3, "0.072".to_string()));

        assert!(matches!(db.get_surface_tensions("r2"), Err(DbError::Lookup { .. })));
    }

    #[test]
    fn test_surface_tension_container_is_created() {
        let mut db = db();
        db.add_region("r1").unwrap();
        db.remove_element("/regions/region[name=\"r1\"]/phaseInteractions").unwrap();
        assert!(db.get_surface_tensions("r1").unwrap().is_empty());

        db.add_surface_tension("r1", 1, 1).unwrap();
        assert_eq!(db.get_surface_tensions("r1").unwrap(), [(1, 1, "0".to_string())]);
    }

    #[test]
    fn test_add_to_missing_region_fails() {
        let mut db = db();
        let count = db.config_count();
        assert!(matches!(db.add_cell_zone("nope", "z"), Err(DbError::Lookup { .. })));
        assert_eq!(db.config_count(), count);
    }

    #[test]
    fn test_boundary_conditions() {
        let mut db = db();
        db.add_region("r1").unwrap();
        let inlet = db
            .add_boundary_condition("r1", "inlet", Some("patch"), "velocityInlet")
            .unwrap();
        let outlet = db
            .add_boundary_condition("r1", "outlet", None, "pressureOutlet")
            .unwrap();
        assert_eq!((inlet, outlet), (1, 2));

        let bc = |id: u32| format!("/regions/region/boundaryConditions/boundaryCondition[@bcid=\"{id}\"]");
        db.set_value(&format!("{}/geometricalType", bc(outlet)), "wall").unwrap();
        db.copy_boundary_condition(inlet, outlet).unwrap();

        let list = db.get_boundary_conditions("r1").unwrap();
        assert_eq!(list[1].name, "outlet");
        assert_eq!(list[1].physical_type, "velocityInlet");
        assert_eq!(db.get_value(&format!("{}/geometricalType", bc(outlet))).unwrap(), "wall");

        assert!(db.add_boundary_condition("r1", "bad", None, "teleport").is_err());
        assert_eq!(db.get_boundary_conditions("r1").unwrap().len(), 2);
    }

    #[test]
    fn test_monitor_names_are_reused() {
        let mut db = db();
        assert_eq!(db.add_monitor(MonitorKind::Force).unwrap(), "force-mon-1");
        assert_eq!(db.add_monitor(MonitorKind::Force).unwrap(), "force-mon-2");
        assert_eq!(db.add_monitor(MonitorKind::Point).unwrap(), "point-mon-1");
        db.remove_monitor(MonitorKind::Force, "force-mon-1").unwrap();
        assert_eq!(db.add_monitor(MonitorKind::Force).unwrap(), "force-mon-1");
        assert!(matches!(
            db.remove_monitor(MonitorKind::Volume, "volume-mon-1"),
            Err(DbError::Lookup { .. })
        ));

        db.clear_monitors().unwrap();
        for kind in MonitorKind::ALL {
            assert!(db.get_monitors(kind).unwrap().is_empty());
        }
    }

    #[test]
    fn test_monitor_overflow() {
        let mut db = db().with_limits(IdLimits {
            monitor: 3,
            ..IdLimits::default()
        });
        db.add_monitor(MonitorKind::Surface).unwrap();
        db.add_monitor(MonitorKind::Surface).unwrap();
        assert!(matches!(
            db.add_monitor(MonitorKind::Surface),
            Err(DbError::Overflow { max: 3, .. })
        ));
    }

    #[test]
    fn test_batch_parameter_usages() {
        let mut db = db();
        db.add_batch_parameter("dt", "0.01").unwrap();
        db.add_batch_parameter("end", "50").unwrap();
        assert!(matches!(db.add_batch_parameter("dt", "1"), Err(DbError::Exists { .. })));

        db.set_value("/runCalculation/runConditions/timeStepSize", "$dt").unwrap();
        let parameters = db.get_batch_parameters().unwrap();
        assert_eq!(parameters[0].usages, 1);
        assert_eq!(parameters[1].usages, 0);
        assert_eq!(
            db.get_batch_defaults().unwrap(),
            [("dt".to_string(), "0.01".to_string()), ("end".to_string(), "50".to_string())]
        );

        let err = db.remove_batch_parameter("dt").unwrap_err();
        assert_eq!(err.as_value_error().unwrap().kind, ValueErrorKind::Referenced);
        db.remove_batch_parameter("end").unwrap();
        assert_eq!(db.get_batch_parameters().unwrap().len(), 1);
    }

    #[test]
    fn test_user_defined_scalars_skip_builtin() {
        let mut db = db();
        assert!(db.get_user_defined_scalars().unwrap().is_empty());
        db.add_element_from_string(
            "/models/userDefinedScalars",
            r#"<scalar scalarID="1"><fieldName>dye</fieldName><region>r1</region>
               <diffusivity><constant>0.1</constant></diffusivity></scalar>"#,
        )
        .unwrap();
        assert_eq!(db.get_user_defined_scalars().unwrap(), [(1, "dye".to_string())]);
        assert_eq!(db.get_user_defined_scalars_in_region("r1").unwrap().len(), 1);
        assert!(db.get_user_defined_scalars_in_region("r2").unwrap().is_empty());
    }
}
