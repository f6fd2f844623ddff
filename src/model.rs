//! Domain records for storage containers and items.
//!
//! - `Container`: a storage container with interior dimensions
//! - `Item`: a physical item, optionally placed inside a container
//! - `Position`: where a placed item sits (start/end corners)
//! - `Suggestion`: an externally computed candidate placement
//!
//! Records arrive from the data layer and are read-only here. A placement is
//! written only through the external placement command; the refreshed copy
//! from the data layer is authoritative.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{self, GeometryError};
use crate::types::{Coordinates, Dimensional, Dimensions, PlacementBox, validation};

/// Validation error for domain records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}

/// A storage container.
///
/// `occupied_volume` is an informational aggregate maintained by the data
/// layer; it is never used for overlap checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub container_id: String,
    pub zone: String,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub occupied_volume: f64,
}

impl Container {
    /// Creates a new empty container with validation.
    ///
    /// # Examples
    /// ```
    /// use stowage_view::model::Container;
    /// use stowage_view::types::Dimensions;
    ///
    /// assert!(Container::new("C-1", "Lab", Dimensions::new(100.0, 80.0, 60.0)).is_ok());
    /// assert!(Container::new("C-2", "Lab", Dimensions::new(0.0, 80.0, 60.0)).is_err());
    /// ```
    pub fn new(
        container_id: impl Into<String>,
        zone: impl Into<String>,
        dimensions: Dimensions,
    ) -> Result<Self, ValidationError> {
        let container = Self {
            container_id: container_id.into(),
            zone: zone.into(),
            dimensions,
            occupied_volume: 0.0,
        };
        container.validate()?;
        Ok(container)
    }

    /// Checks that every interior dimension is positive and finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dimensions(&self.dimensions).map_err(|msg| {
            ValidationError::InvalidDimension(format!("container {}: {}", self.container_id, msg))
        })
    }

    /// The interior region `[0, dimensions]`.
    #[inline]
    pub fn interior(&self) -> PlacementBox {
        PlacementBox::of_container(&self.dimensions)
    }

    /// Utilization in percent, from the data layer's `occupied_volume`.
    pub fn utilization_percent(&self) -> f64 {
        let total = self.dimensions.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.occupied_volume / total) * 100.0
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// Groups containers by zone, keeping the order in which zones first appear.
pub fn group_by_zone(containers: &[Container]) -> Vec<(&str, Vec<&Container>)> {
    let mut groups: Vec<(&str, Vec<&Container>)> = Vec::new();
    for container in containers {
        match groups
            .iter_mut()
            .find(|(zone, _)| *zone == container.zone.as_str())
        {
            Some((_, members)) => members.push(container),
            None => groups.push((container.zone.as_str(), vec![container])),
        }
    }
    groups
}

/// Where a placed item sits inside its container.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub start_coordinates: Coordinates,
    pub end_coordinates: Coordinates,
}

impl Position {
    /// Converts to a checked box.
    pub fn to_box(&self) -> Result<PlacementBox, GeometryError> {
        PlacementBox::checked(self.start_coordinates, self.end_coordinates)
    }
}

impl From<PlacementBox> for Position {
    fn from(region: PlacementBox) -> Self {
        Self {
            start_coordinates: region.start,
            end_coordinates: region.end,
        }
    }
}

/// A physical item.
///
/// `container_id` and `position` are present together once the item has
/// been placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub name: String,
    pub dimensions: Dimensions,
    pub mass: f64,
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    pub usage_limit: i64,
    #[serde(default)]
    pub usage_count: i64,
    pub preferred_zone: String,
    #[serde(default)]
    pub is_waste: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waste_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Item {
    /// Highest accepted priority value.
    pub const MAX_PRIORITY: i64 = 100;

    /// Creates an unplaced item with validation.
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        dimensions: Dimensions,
        priority: i64,
        preferred_zone: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let item = Self {
            item_id: item_id.into(),
            name: name.into(),
            dimensions,
            mass: 0.0,
            priority,
            expiry_date: None,
            usage_limit: 0,
            usage_count: 0,
            preferred_zone: preferred_zone.into(),
            is_waste: false,
            waste_reason: None,
            container_id: None,
            position: None,
        };
        item.validate()?;
        Ok(item)
    }

    /// Returns a copy of this item placed at `region` inside `container_id`.
    ///
    /// Used to describe data as the data layer would return it; the engine
    /// itself never mutates item records.
    pub fn placed_at(mut self, container_id: impl Into<String>, region: PlacementBox) -> Self {
        self.container_id = Some(container_id.into());
        self.position = Some(region.into());
        self
    }

    /// Checks dimensions and priority.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dimensions(&self.dimensions).map_err(|msg| {
            ValidationError::InvalidDimension(format!("item {}: {}", self.item_id, msg))
        })?;
        if !(0..=Self::MAX_PRIORITY).contains(&self.priority) {
            return Err(ValidationError::InvalidPriority(format!(
                "item {}: priority must be between 0 and {}, got: {}",
                self.item_id,
                Self::MAX_PRIORITY,
                self.priority
            )));
        }
        Ok(())
    }

    /// Whether the data layer reports this item inside a container.
    #[inline]
    pub fn is_placed(&self) -> bool {
        self.container_id.is_some()
    }

    /// Whether the item is placed inside the given container.
    #[inline]
    pub fn is_in(&self, container_id: &str) -> bool {
        self.container_id.as_deref() == Some(container_id)
    }

    /// The occupied box, if the item has a well-formed position.
    pub fn placed_box(&self) -> Result<PlacementBox, ValidationError> {
        let position = self.position.as_ref().ok_or_else(|| {
            ValidationError::InvalidPosition(format!("item {} has no position", self.item_id))
        })?;
        position
            .to_box()
            .map_err(|err| ValidationError::InvalidPosition(format!("item {}: {}", self.item_id, err)))
    }

    /// The box this item would occupy with its minimum corner at `start`.
    pub fn box_at(&self, start: Coordinates) -> Result<PlacementBox, GeometryError> {
        geometry::derive_box(start, self.dimensions)
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// Items placed inside `container_id`, in input order.
pub fn placed_in<'a>(items: &'a [Item], container_id: &str) -> Vec<&'a Item> {
    items.iter().filter(|item| item.is_in(container_id)).collect()
}

/// An externally computed candidate placement for one unplaced item.
#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    pub item_id: String,
    pub container_id: String,
    pub container_zone: Option<String>,
    pub region: PlacementBox,
    pub in_preferred_zone: bool,
}

/// A placement to commit through the external placement interface.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementCommand {
    pub item_id: String,
    pub container_id: String,
    pub region: PlacementBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_json() -> &'static str {
        r#"{
            "_id": "65f0c0ffee",
            "item_id": "001",
            "name": "Food Packet",
            "dimensions": {"width": 10.0, "depth": 10.0, "height": 20.0},
            "mass": 5.0,
            "priority": 80,
            "expiry_date": "2025-05-20T00:00:00",
            "usage_limit": 30,
            "usage_count": 0,
            "preferred_zone": "Crew Quarters",
            "is_waste": false,
            "container_id": "contA",
            "position": {
                "start_coordinates": {"width": 0.0, "depth": 0.0, "height": 0.0},
                "end_coordinates": {"width": 10.0, "depth": 10.0, "height": 20.0}
            }
        }"#
    }

    #[test]
    fn item_parses_from_data_layer_json() {
        let item: Item = serde_json::from_str(item_json()).expect("Should parse item JSON");
        assert!(item.is_placed());
        assert!(item.is_in("contA"));
        let region = item.placed_box().expect("Position should be well-formed");
        assert_eq!(region.end, Coordinates::new(10.0, 10.0, 20.0));
    }

    #[test]
    fn unplaced_item_parses_without_position() {
        let json = r#"{
            "item_id": "002",
            "name": "Oxygen Cylinder",
            "dimensions": {"width": 15.0, "depth": 15.0, "height": 50.0},
            "mass": 30.0,
            "priority": 95,
            "usage_limit": 100,
            "preferred_zone": "Airlock"
        }"#;
        let item: Item = serde_json::from_str(json).expect("Should parse item JSON");
        assert!(!item.is_placed());
        assert!(matches!(
            item.placed_box(),
            Err(ValidationError::InvalidPosition(_))
        ));
    }

    #[test]
    fn container_parses_and_reports_utilization() {
        let json = r#"{
            "container_id": "contA",
            "zone": "Crew Quarters",
            "dimensions": {"width": 100.0, "depth": 85.0, "height": 200.0},
            "occupied_volume": 170000.0
        }"#;
        let container: Container = serde_json::from_str(json).expect("Should parse container");
        assert!(container.validate().is_ok());
        assert!((container.utilization_percent() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn item_validation_rejects_priority_out_of_range() {
        let dims = Dimensions::new(1.0, 1.0, 1.0);
        let result = Item::new("X", "Too important", dims, 101, "Lab");
        assert!(matches!(result, Err(ValidationError::InvalidPriority(_))));
        let result = Item::new("Y", "Negative", dims, -1, "Lab");
        assert!(matches!(result, Err(ValidationError::InvalidPriority(_))));
        assert!(Item::new("Z", "Edge", dims, 0, "Lab").is_ok());
    }

    #[test]
    fn out_of_range_priority_still_decodes() {
        let json = r#"{
            "item_id": "007",
            "name": "Old Kit",
            "dimensions": {"width": 1.0, "depth": 1.0, "height": 1.0},
            "mass": 1.0,
            "priority": 300,
            "usage_limit": -1,
            "preferred_zone": "Lab"
        }"#;
        let item: Item = serde_json::from_str(json).expect("Should parse item");
        assert!(matches!(item.validate(), Err(ValidationError::InvalidPriority(_))));
    }

    #[test]
    fn placed_in_filters_by_container() {
        let dims = Dimensions::new(1.0, 1.0, 1.0);
        let region = PlacementBox::of_container(&dims);
        let a = Item::new("A", "a", dims, 1, "Lab").unwrap().placed_at("C1", region);
        let b = Item::new("B", "b", dims, 1, "Lab").unwrap().placed_at("C2", region);
        let c = Item::new("C", "c", dims, 1, "Lab").unwrap();
        let items = vec![a, b, c];
        let in_c1 = placed_in(&items, "C1");
        assert_eq!(in_c1.len(), 1);
        assert_eq!(in_c1[0].item_id, "A");
    }

    #[test]
    fn group_by_zone_keeps_first_seen_order() {
        let dims = Dimensions::new(10.0, 10.0, 10.0);
        let containers = vec![
            Container::new("C1", "Lab", dims).unwrap(),
            Container::new("C2", "Airlock", dims).unwrap(),
            Container::new("C3", "Lab", dims).unwrap(),
        ];
        let groups = group_by_zone(&containers);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Lab");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Airlock");
    }
}
