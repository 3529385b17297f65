use crate::csg::CsgNode;
use crate::geom::Vec3;
use crate::model::{DimensionRecord, Hole};
use crate::validate::{check, InvalidDimensionError};
use serde::{Deserialize, Serialize};

/// How far cutting tools reach past the faces they cut through.
///
/// Only ever extends a tool outside the solid, never toward other features.
pub const THROUGH_MARGIN: f64 = 1.0;

const QUARTER_TURN_DEG: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilletStyle {
    /// Notch the corner out of the top section and fill it with a
    /// quarter-round swept about the rounded edge.
    #[default]
    Revolve,
    /// Cut `(corner square - cylinder)` out of the top section. For targets
    /// without a sweep primitive.
    Subtract,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default)]
    pub fillet_style: FilletStyle,
}

pub struct SolidSpecBuilder {
    cfg: BuilderConfig,
}

impl Default for SolidSpecBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl SolidSpecBuilder {
    pub fn new(cfg: BuilderConfig) -> Self {
        Self { cfg }
    }

    pub fn build(&self, record: &DimensionRecord) -> Result<CsgNode, InvalidDimensionError> {
        check(record)?;

        let base_height = record.base_height();
        let mut parts = Vec::with_capacity(3);
        if base_height > 0.0 {
            parts.push(CsgNode::cube(record.width, record.depth, base_height));
        }
        if record.fillet.height > 0.0 {
            parts.extend(self.top_section(record, base_height));
        }
        let body = CsgNode::union(parts);

        Ok(match &record.hole {
            Some(hole) => CsgNode::difference(body, vec![hole_tool(record, hole)]),
            None => body,
        })
    }

    fn top_section(&self, record: &DimensionRecord, z0: f64) -> Vec<CsgNode> {
        let fillet = &record.fillet;
        let top = CsgNode::cube(record.width, record.depth, fillet.height)
            .translated(Vec3::new(0.0, 0.0, z0));
        if fillet.is_degenerate() {
            return vec![top];
        }

        let notch = corner_notch(record, z0);
        let (px, py) = fillet
            .corner
            .pivot(record.width, record.depth, fillet.radius);

        match self.cfg.fillet_style {
            FilletStyle::Revolve => {
                let round = CsgNode::revolve(fillet.radius, fillet.height, QUARTER_TURN_DEG)
                    .transformed(
                        Vec3::new(px, py, z0),
                        Vec3::new(0.0, 0.0, fillet.corner.rotation_deg()),
                    );
                vec![CsgNode::difference(top, vec![notch]), round]
            }
            FilletStyle::Subtract => {
                let arc = CsgNode::cylinder(fillet.radius, fillet.height + 2.0 * THROUGH_MARGIN)
                    .translated(Vec3::new(px, py, z0 - THROUGH_MARGIN));
                let cutter = CsgNode::difference(notch, vec![arc]);
                vec![CsgNode::difference(top, vec![cutter])]
            }
        }
    }
}

pub fn build(record: &DimensionRecord) -> Result<CsgNode, InvalidDimensionError> {
    SolidSpecBuilder::default().build(record)
}

/// The `radius × radius` corner square of the top section, pushed past every
/// face it shares with the top box so the boolean leaves no skin behind.
fn corner_notch(record: &DimensionRecord, z0: f64) -> CsgNode {
    let fillet = &record.fillet;
    let m = THROUGH_MARGIN;
    let (x0, x1) = notch_span(record.width, fillet.radius, fillet.corner.at_max_x());
    let (y0, y1) = notch_span(record.depth, fillet.radius, fillet.corner.at_max_y());
    CsgNode::cube(x1 - x0, y1 - y0, fillet.height + 2.0 * m)
        .translated(Vec3::new(x0, y0, z0 - m))
}

fn notch_span(extent: f64, radius: f64, at_max: bool) -> (f64, f64) {
    let m = THROUGH_MARGIN;
    if radius >= extent {
        return (-m, extent + m);
    }
    if at_max {
        (extent - radius, extent + m)
    } else {
        (-m, radius)
    }
}

fn hole_tool(record: &DimensionRecord, hole: &Hole) -> CsgNode {
    let axis = hole.axis;
    let (start, length) = match (hole.through_all, hole.length) {
        (false, Some(length)) => (hole.center.get(axis) - length * 0.5, length),
        _ => {
            let extent = record.bbox().extent(axis);
            (-THROUGH_MARGIN, extent + 2.0 * THROUGH_MARGIN)
        }
    };
    CsgNode::cylinder(hole.radius(), length)
        .transformed(hole.center.with(axis, start), axis.rotation_from_z())
}
