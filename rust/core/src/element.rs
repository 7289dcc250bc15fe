// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model elements: identity, trade, category and geometry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;

/// Stable element identifier, unique within a model version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Engineering trade owning an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Structural,
    Mechanical,
    Electrical,
    Plumbing,
    Architectural,
    Other,
}

impl Discipline {
    pub const ALL: [Discipline; 6] = [
        Discipline::Structural,
        Discipline::Mechanical,
        Discipline::Electrical,
        Discipline::Plumbing,
        Discipline::Architectural,
        Discipline::Other,
    ];

    /// Criticality rank: structural > life-safety MEP > everything else.
    #[inline]
    pub const fn criticality(self) -> u8 {
        match self {
            Discipline::Structural => 2,
            Discipline::Mechanical | Discipline::Electrical | Discipline::Plumbing => 1,
            Discipline::Architectural | Discipline::Other => 0,
        }
    }

    /// Infer a discipline from an IFC entity type name such as `IfcPipeSegment`.
    pub fn from_ifc_type(type_name: &str) -> Self {
        let lower = type_name.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["wall", "slab", "column", "beam", "foundation", "footing", "pile"]) {
            Discipline::Structural
        } else if has(&["pipe", "sanitary", "valve", "tank"]) {
            Discipline::Plumbing
        } else if has(&["duct", "airterminal", "fan", "fitting", "equipment"]) {
            Discipline::Mechanical
        } else if has(&["cable", "light", "electric", "outlet", "switch"]) {
            Discipline::Electrical
        } else if has(&["door", "window", "furniture", "furnishing", "space", "stair", "railing", "ramp", "roof", "covering"]) {
            Discipline::Architectural
        } else {
            Discipline::Other
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Discipline::Structural => "structural",
            Discipline::Mechanical => "mechanical",
            Discipline::Electrical => "electrical",
            Discipline::Plumbing => "plumbing",
            Discipline::Architectural => "architectural",
            Discipline::Other => "other",
        }
    }
}

/// Element category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Wall,
    Beam,
    Column,
    Slab,
    Foundation,
    Roof,
    Stair,
    Door,
    Window,
    Duct,
    Pipe,
    CableTray,
    Equipment,
    Other,
}

impl Category {
    /// Map an IFC entity type name to a category.
    pub fn from_ifc_type(type_name: &str) -> Self {
        match type_name.to_ascii_uppercase().as_str() {
            "IFCWALL" | "IFCWALLSTANDARDCASE" | "IFCCURTAINWALL" => Category::Wall,
            "IFCBEAM" | "IFCBEAMSTANDARDCASE" | "IFCMEMBER" => Category::Beam,
            "IFCCOLUMN" | "IFCCOLUMNSTANDARDCASE" => Category::Column,
            "IFCSLAB" | "IFCSLABSTANDARDCASE" | "IFCPLATE" => Category::Slab,
            "IFCFOOTING" | "IFCPILE" => Category::Foundation,
            "IFCROOF" => Category::Roof,
            "IFCSTAIR" | "IFCSTAIRFLIGHT" | "IFCRAMP" | "IFCRAMPFLIGHT" => Category::Stair,
            "IFCDOOR" | "IFCDOORSTANDARDCASE" => Category::Door,
            "IFCWINDOW" | "IFCWINDOWSTANDARDCASE" => Category::Window,
            "IFCDUCTSEGMENT" | "IFCDUCTFITTING" | "IFCAIRTERMINAL" => Category::Duct,
            "IFCPIPESEGMENT" | "IFCPIPEFITTING" => Category::Pipe,
            "IFCCABLESEGMENT" | "IFCCABLECARRIERSEGMENT" | "IFCCABLECARRIERFITTING" => {
                Category::CableTray
            }
            "IFCFLOWTERMINAL" | "IFCUNITARYEQUIPMENT" | "IFCPUMP" | "IFCFAN" | "IFCBOILER" => {
                Category::Equipment
            }
            _ => Category::Other,
        }
    }

    /// Categories that usually carry load.
    ///
    /// Walls only count when owned by the structural discipline.
    #[inline]
    pub const fn is_load_bearing(self, discipline: Discipline) -> bool {
        match self {
            Category::Beam | Category::Column | Category::Slab | Category::Foundation => true,
            Category::Wall => matches!(discipline, Discipline::Structural),
            _ => false,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Category::Wall => "wall",
            Category::Beam => "beam",
            Category::Column => "column",
            Category::Slab => "slab",
            Category::Foundation => "foundation",
            Category::Roof => "roof",
            Category::Stair => "stair",
            Category::Door => "door",
            Category::Window => "window",
            Category::Duct => "duct",
            Category::Pipe => "pipe",
            Category::CableTray => "cable tray",
            Category::Equipment => "equipment",
            Category::Other => "element",
        }
    }
}

/// Normalized model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub discipline: Discipline,
    pub category: Category,
    /// Bounding box in millimetres
    pub bounds: BoundingBox,
    /// Storey/level reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Material/unit-cost class, e.g. `concrete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_class: Option<String>,
    /// Source model of a federated element set, e.g. `structure-rev4`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Element {
    pub fn new(id: ElementId, discipline: Discipline, category: Category, bounds: BoundingBox) -> Self {
        Self {
            id,
            discipline,
            category,
            bounds,
            level: None,
            cost_class: None,
            model: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_cost_class(mut self, class: impl Into<String>) -> Self {
        self.cost_class = Some(class.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Both elements come from different source models.
    ///
    /// Untagged elements count as one anonymous model.
    #[inline]
    pub fn is_cross_model(&self, other: &Element) -> bool {
        self.model != other.model
    }

    #[inline]
    pub fn is_load_bearing(&self) -> bool {
        self.category.is_load_bearing(self.discipline)
    }
}

/// Length unit of the coordinates handed over by the model parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Millimeter,
    Centimeter,
    Meter,
    Inch,
    Foot,
}

impl LengthUnit {
    /// Multiplier converting this unit to millimetres.
    #[inline]
    pub const fn to_millimeters(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
            LengthUnit::Inch => 25.4,
            LengthUnit::Foot => 304.8,
        }
    }
}

/// Geometry description as extracted by the model parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawGeometry {
    /// Precomputed world-space extents
    Box { min: [f64; 3], max: [f64; 3] },
    /// World-space vertex cloud (e.g. a tessellated mesh)
    Vertices { points: Vec<[f64; 3]> },
    /// Local-space box placed by a 4x4 column-major transform
    Placed {
        min: [f64; 3],
        max: [f64; 3],
        transform: [f64; 16],
    },
}

/// Element record before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    pub id: ElementId,
    pub discipline: Discipline,
    pub category: Category,
    pub geometry: RawGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RawElement {
    /// Element with world-space box geometry.
    pub fn boxed(
        id: impl Into<String>,
        discipline: Discipline,
        category: Category,
        min: [f64; 3],
        max: [f64; 3],
    ) -> Self {
        Self {
            id: ElementId::new(id),
            discipline,
            category,
            geometry: RawGeometry::Box { min, max },
            level: None,
            cost_class: None,
            model: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_cost_class(mut self, class: impl Into<String>) -> Self {
        self.cost_class = Some(class.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discipline_inference_from_ifc_names() {
        assert_eq!(Discipline::from_ifc_type("IfcBeam"), Discipline::Structural);
        assert_eq!(Discipline::from_ifc_type("IfcPipeSegment"), Discipline::Plumbing);
        assert_eq!(Discipline::from_ifc_type("IfcDuctSegment"), Discipline::Mechanical);
        assert_eq!(Discipline::from_ifc_type("IfcCableSegment"), Discipline::Electrical);
        assert_eq!(Discipline::from_ifc_type("IfcDoor"), Discipline::Architectural);
        assert_eq!(Discipline::from_ifc_type("IfcProxy"), Discipline::Other);
    }

    #[test]
    fn criticality_order() {
        assert!(Discipline::Structural.criticality() > Discipline::Plumbing.criticality());
        assert!(Discipline::Electrical.criticality() > Discipline::Architectural.criticality());
    }

    #[test]
    fn category_mapping_is_case_insensitive() {
        assert_eq!(Category::from_ifc_type("IfcColumn"), Category::Column);
        assert_eq!(Category::from_ifc_type("IFCDUCTSEGMENT"), Category::Duct);
        assert_eq!(Category::from_ifc_type("IfcSomethingElse"), Category::Other);
    }

    #[test]
    fn walls_bear_load_only_when_structural() {
        assert!(Category::Wall.is_load_bearing(Discipline::Structural));
        assert!(!Category::Wall.is_load_bearing(Discipline::Architectural));
        assert!(Category::Column.is_load_bearing(Discipline::Other));
        assert!(!Category::Duct.is_load_bearing(Discipline::Structural));
    }

    #[test]
    fn raw_geometry_json_is_tagged() {
        let raw = RawElement::boxed("a", Discipline::Plumbing, Category::Pipe, [0.0; 3], [1.0; 3]);
        let json = serde_json::to_string(&raw).unwrap();
        assert!(json.contains(r#""kind":"box""#));
        let back: RawElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn model_tag_is_optional_in_json() {
        let raw: RawElement = serde_json::from_str(
            r#"{"id":"a","discipline":"plumbing","category":"pipe","geometry":{"kind":"box","min":[0,0,0],"max":[1,1,1]}}"#,
        )
        .unwrap();
        assert_eq!(raw.model, None);
        let tagged = raw.with_model("mep");
        assert!(serde_json::to_string(&tagged).unwrap().contains(r#""model":"mep""#));
    }
}
