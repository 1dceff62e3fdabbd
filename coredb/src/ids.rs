//! Unique id namespaces for repeatable entities.
//!
//! Ids are small positive integers stored as attribute text. Allocation is a
//! first-fit scan over `[1, max)` so an id freed by removing its owner is
//! handed out again before any larger one.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Entity category owning an id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdCategory {
    Monitor,
    Material,
    CellZone,
    BoundaryCondition,
    UserDefinedScalar,
}

impl IdCategory {
    /// Category of an id attribute name. Monitors are numbered through their
    /// names rather than an attribute and map from `monitors`.
    pub fn from_attribute(attribute: &str) -> Option<Self> {
        match attribute {
            "mid" => Some(IdCategory::Material),
            "czid" => Some(IdCategory::CellZone),
            "bcid" => Some(IdCategory::BoundaryCondition),
            "scalarID" => Some(IdCategory::UserDefinedScalar),
            "monitors" => Some(IdCategory::Monitor),
            _ => None,
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            IdCategory::Monitor => "monitors",
            IdCategory::Material => "mid",
            IdCategory::CellZone => "czid",
            IdCategory::BoundaryCondition => "bcid",
            IdCategory::UserDefinedScalar => "scalarID",
        }
    }
}

/// Exclusive upper bound of every id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct IdLimits {
    /// Monitors of one kind (`force-mon-N` and friends).
    pub monitor: u32,
    pub material: u32,
    pub cell_zone: u32,
    pub boundary_condition: u32,
    pub user_defined_scalar: u32,
}

impl Default for IdLimits {
    fn default() -> Self {
        Self {
            monitor: 100,
            material: 1000,
            cell_zone: 1000,
            boundary_condition: 10000,
            user_defined_scalar: 10000,
        }
    }
}

impl IdLimits {
    pub fn max(&self, category: IdCategory) -> u32 {
        match category {
            IdCategory::Monitor => self.monitor,
            IdCategory::Material => self.material,
            IdCategory::CellZone => self.cell_zone,
            IdCategory::BoundaryCondition => self.boundary_condition,
            IdCategory::UserDefinedScalar => self.user_defined_scalar,
        }
    }

    /// Bound for an arbitrary attribute. Unknown attributes get the widest
    /// namespace.
    pub fn max_for_attribute(&self, attribute: &str) -> u32 {
        IdCategory::from_attribute(attribute)
            .map(|c| self.max(c))
            .unwrap_or(self.boundary_condition)
    }
}

/// Smallest integer in `[1, max)` for which `in_use` is false.
pub fn first_fit(max: u32, mut in_use: impl FnMut(u32) -> bool) -> Option<u32> {
    (1..max).find(|&i| !in_use(i))
}

/// First-fit over a set of id strings.
pub fn first_free<'a>(used: impl IntoIterator<Item = &'a str>, max: u32) -> Option<u32> {
    let used: Vec<&str> = used.into_iter().collect();
    first_fit(max, |i| {
        let text = i.to_string();
        used.iter().any(|u| *u == text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_reuses_gaps() {
        assert_eq!(first_free(std::iter::empty(), 10), Some(1));
        assert_eq!(first_free(["1", "2", "4"], 10), Some(3));
        assert_eq!(first_free(["2"], 10), Some(1));
    }

    #[test]
    fn test_exhausted_namespace() {
        assert_eq!(first_free(["1", "2"], 3), None);
        assert_eq!(first_fit(1, |_| false), None);
    }

    #[test]
    fn test_limits_by_attribute() {
        let limits = IdLimits::default();
        assert_eq!(limits.max_for_attribute("czid"), 1000);
        assert_eq!(limits.max_for_attribute("bcid"), 10000);
        assert_eq!(limits.max_for_attribute("monitors"), 100);
        assert_eq!(limits.max_for_attribute("other"), 10000);
        assert_eq!(IdCategory::CellZone.attribute(), "czid");
    }
}
