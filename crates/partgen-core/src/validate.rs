use crate::geom::Axis;
use crate::model::{DimensionRecord, Hole};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NotFinite,
    NotPositive,
    Negative,
    ExceedsLimit,
    Missing,
    OutsideFootprint,
    OutsideSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid dimensions ({} violation(s)): {}", .violations.len(), join_violations(.violations))]
pub struct InvalidDimensionError {
    pub violations: Vec<Violation>,
}

impl InvalidDimensionError {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.field.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Returns every invariant the record breaks, in field order.
///
/// A comparison against another field (radius vs. width and depth, hole vs.
/// the extents around it) runs whenever the fields it reads are valid, so one
/// bad number is reported once without hiding unrelated problems.
pub fn validate(record: &DimensionRecord) -> Vec<Violation> {
    let mut c = Checker::default();

    let extents = Extents {
        width: c.positive("width", record.width),
        depth: c.positive("depth", record.depth),
        height: c.positive("height", record.height),
    };

    let fillet = &record.fillet;
    if c.non_negative("fillet.radius", fillet.radius) {
        let limit = [(extents.width, record.width), (extents.depth, record.depth)]
            .into_iter()
            .filter(|&(ok, _)| ok)
            .map(|(_, v)| v)
            .fold(f64::INFINITY, f64::min);
        if fillet.radius > limit {
            c.push(
                "fillet.radius",
                ViolationKind::ExceedsLimit,
                format!(
                    "radius {} exceeds min(width, depth) = {}",
                    fillet.radius, limit
                ),
            );
        }
    }
    if c.non_negative("fillet.height", fillet.height)
        && extents.height
        && fillet.height > record.height
    {
        c.push(
            "fillet.height",
            ViolationKind::ExceedsLimit,
            format!(
                "fillet height {} exceeds total height {}",
                fillet.height, record.height
            ),
        );
    }

    if let Some(hole) = &record.hole {
        check_hole(&mut c, record, hole, &extents);
    }

    c.violations
}

pub fn check(record: &DimensionRecord) -> Result<(), InvalidDimensionError> {
    let violations = validate(record);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(InvalidDimensionError { violations })
    }
}

/// Which of the record's extents passed their own checks.
struct Extents {
    width: bool,
    depth: bool,
    height: bool,
}

impl Extents {
    fn valid(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.depth,
            Axis::Z => self.height,
        }
    }
}

fn check_hole(c: &mut Checker, record: &DimensionRecord, hole: &Hole, extents: &Extents) {
    let diameter_ok = c.positive("hole.diameter", hole.diameter);

    for axis in Axis::ALL {
        c.finite(
            &format!("hole.center.{}", axis.coordinate()),
            hole.center.get(axis),
        );
    }

    // A through hole ignores any length it carries.
    if !hole.through_all {
        match hole.length {
            Some(length) => {
                c.positive("hole.length", length);
            }
            None => c.push(
                "hole.length",
                ViolationKind::Missing,
                "required when through_all is false".to_string(),
            ),
        }
    }

    let bbox = record.bbox();
    let comparable = |axis: Axis| extents.valid(axis) && hole.center.get(axis).is_finite();

    if diameter_ok {
        let r = hole.radius();
        let (a, b) = hole.axis.cross_section();
        for axis in [a, b].into_iter().filter(|&axis| comparable(axis)) {
            let center = hole.center.get(axis);
            if !bbox.contains_interval(axis, center - r, center + r) {
                c.push(
                    &format!("hole.center.{}", axis.coordinate()),
                    ViolationKind::OutsideFootprint,
                    format!(
                        "hole footprint {} ± {} leaves the {} extent [0, {}]",
                        center,
                        r,
                        axis.label(),
                        bbox.extent(axis)
                    ),
                );
            }
        }
    }

    if !hole.through_all && comparable(hole.axis) {
        let axis = hole.axis;
        let center = hole.center.get(axis);
        if !bbox.contains_interval(axis, center, center) {
            c.push(
                &format!("hole.center.{}", axis.coordinate()),
                ViolationKind::OutsideSpan,
                format!(
                    "blind hole center {} is outside the {} span [0, {}]",
                    center,
                    axis.label(),
                    bbox.extent(axis)
                ),
            );
        }
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, field: &str, kind: ViolationKind, reason: String) {
        self.violations.push(Violation {
            field: field.to_string(),
            kind,
            reason,
        });
    }

    fn finite(&mut self, field: &str, v: f64) -> bool {
        if v.is_finite() {
            return true;
        }
        self.push(
            field,
            ViolationKind::NotFinite,
            format!("must be a finite number (got {v})"),
        );
        false
    }

    fn positive(&mut self, field: &str, v: f64) -> bool {
        if !self.finite(field, v) {
            return false;
        }
        if v <= 0.0 {
            self.push(
                field,
                ViolationKind::NotPositive,
                format!("must be positive (got {v})"),
            );
            return false;
        }
        true
    }

    fn non_negative(&mut self, field: &str, v: f64) -> bool {
        if !self.finite(field, v) {
            return false;
        }
        if v < 0.0 {
            self.push(
                field,
                ViolationKind::Negative,
                format!("must not be negative (got {v})"),
            );
            return false;
        }
        true
    }
}
