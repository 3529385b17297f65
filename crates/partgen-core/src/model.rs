use crate::geom::{Axis, BBox3, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    #[serde(default)]
    pub fillet: Fillet,
    #[serde(default)]
    pub hole: Option<Hole>,
}

impl DimensionRecord {
    pub fn size(&self) -> Vec3 {
        Vec3::new(self.width, self.depth, self.height)
    }

    pub fn bbox(&self) -> BBox3 {
        BBox3::from_size(self.size())
    }

    /// Height of the section below the filleted top.
    pub fn base_height(&self) -> f64 {
        self.height - self.fillet.height
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fillet {
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub corner: Corner,
}

impl Fillet {
    pub fn is_degenerate(&self) -> bool {
        self.radius <= 0.0 || self.height <= 0.0
    }
}

/// Vertical edge of the top section that gets rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    #[default]
    XMaxYMax,
    XMinYMax,
    XMinYMin,
    XMaxYMin,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::XMaxYMax,
        Corner::XMinYMax,
        Corner::XMinYMin,
        Corner::XMaxYMin,
    ];

    pub fn at_max_x(self) -> bool {
        matches!(self, Corner::XMaxYMax | Corner::XMaxYMin)
    }

    pub fn at_max_y(self) -> bool {
        matches!(self, Corner::XMaxYMax | Corner::XMinYMax)
    }

    /// Z rotation mapping the +X/+Y quadrant onto the quadrant this corner bounds.
    pub fn rotation_deg(self) -> f64 {
        match self {
            Corner::XMaxYMax => 0.0,
            Corner::XMinYMax => 90.0,
            Corner::XMinYMin => 180.0,
            Corner::XMaxYMin => 270.0,
        }
    }

    /// Axis of the rounding arc: the corner moved inward by `radius` on both sides.
    pub fn pivot(self, width: f64, depth: f64, radius: f64) -> (f64, f64) {
        let x = if self.at_max_x() { width - radius } else { radius };
        let y = if self.at_max_y() { depth - radius } else { radius };
        (x, y)
    }

    pub fn name(self) -> &'static str {
        match self {
            Corner::XMaxYMax => "x_max_y_max",
            Corner::XMinYMax => "x_min_y_max",
            Corner::XMinYMin => "x_min_y_min",
            Corner::XMaxYMin => "x_max_y_min",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    pub diameter: f64,
    pub axis: Axis,
    pub center: Vec3,
    #[serde(default, alias = "throughAll")]
    pub through_all: bool,
    #[serde(default)]
    pub length: Option<f64>,
}

impl Hole {
    pub fn radius(&self) -> f64 {
        self.diameter * 0.5
    }
}
