use crate::csg::{CsgNode, Primitive};
use crate::dump::dump_record;
use crate::geom::Vec3;
use crate::model::DimensionRecord;
use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct ScadOptions {
    pub name: String,
    /// Value of OpenSCAD's `$fn` (facets per full circle).
    pub segments: u32,
}

impl Default for ScadOptions {
    fn default() -> Self {
        Self {
            name: "part".to_string(),
            segments: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializationError {
    #[error("{node} has a non-finite {field}")]
    NonFinite {
        node: &'static str,
        field: &'static str,
    },
    #[error("{node} would be zero-volume: {field} = {value}")]
    Degenerate {
        node: &'static str,
        field: &'static str,
        value: f64,
    },
    #[error("revolve angle {0} is outside (0, 360]")]
    RevolveAngle(f64),
    #[error("{0} has no operands")]
    Empty(&'static str),
    #[error("$fn must be at least 3 (got {0})")]
    Segments(u32),
}

pub fn to_scad(node: &CsgNode, opts: &ScadOptions) -> Result<String, SerializationError> {
    let mut writer = ScadWriter::new(opts)?;
    writer.node(node, 0, String::new())?;
    Ok(writer.finish())
}

/// Like [`to_scad`], with the record's dimensions listed in the header.
pub fn to_scad_record(
    record: &DimensionRecord,
    node: &CsgNode,
    opts: &ScadOptions,
) -> Result<String, SerializationError> {
    let mut writer = ScadWriter::new(opts)?;
    writer.header_lines = dump_record(record)
        .lines()
        .map(|l| format!("//   {l}"))
        .collect();
    writer.node(node, 0, String::new())?;
    Ok(writer.finish())
}

/// Shortest decimal text that parses back to exactly `v`; `-0` prints as `0`.
pub fn format_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    format!("{v}")
}

struct ScadWriter {
    name: String,
    segments: u32,
    header_lines: Vec<String>,
    body: String,
}

impl ScadWriter {
    fn new(opts: &ScadOptions) -> Result<Self, SerializationError> {
        if opts.segments < 3 {
            return Err(SerializationError::Segments(opts.segments));
        }
        let name = opts.name.trim();
        let name = if name.is_empty() { "part" } else { name };
        Ok(Self {
            name: name.replace(['\n', '\r'], " "),
            segments: opts.segments,
            header_lines: Vec::new(),
            body: String::new(),
        })
    }

    fn finish(self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// {}", self.name);
        if !self.header_lines.is_empty() {
            let _ = writeln!(out, "// dimensions:");
            for line in &self.header_lines {
                let _ = writeln!(out, "{line}");
            }
        }
        let _ = writeln!(out, "$fn = {};", self.segments);
        let _ = writeln!(out);
        out.push_str(&self.body);
        out
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.body.push_str("  ");
        }
        self.body.push_str(text);
        self.body.push('\n');
    }

    fn node(
        &mut self,
        node: &CsgNode,
        depth: usize,
        prefix: String,
    ) -> Result<(), SerializationError> {
        match node {
            CsgNode::Primitive(p) => {
                let call = primitive(p)?;
                self.line(depth, &format!("{prefix}{call}"));
            }
            CsgNode::Transform {
                translation,
                rotation,
                child,
            } => {
                let mut prefix = prefix;
                if !translation.is_zero() {
                    prefix.push_str(&format!("translate({}) ", vector("translate", *translation)?));
                }
                if !rotation.is_zero() {
                    prefix.push_str(&format!("rotate({}) ", vector("rotate", *rotation)?));
                }
                self.node(child, depth, prefix)?;
            }
            CsgNode::Union { children } => self.block("union", children, depth, prefix)?,
            CsgNode::Intersection { children } => {
                self.block("intersection", children, depth, prefix)?
            }
            CsgNode::Difference { base, subtractors } => {
                if subtractors.is_empty() {
                    return Err(SerializationError::Empty("difference"));
                }
                self.line(depth, &format!("{prefix}difference() {{"));
                self.node(base, depth + 1, String::new())?;
                for s in subtractors {
                    self.node(s, depth + 1, String::new())?;
                }
                self.line(depth, "}");
            }
        }
        Ok(())
    }

    fn block(
        &mut self,
        op: &'static str,
        children: &[CsgNode],
        depth: usize,
        prefix: String,
    ) -> Result<(), SerializationError> {
        if children.is_empty() {
            return Err(SerializationError::Empty(op));
        }
        self.line(depth, &format!("{prefix}{op}() {{"));
        for c in children {
            self.node(c, depth + 1, String::new())?;
        }
        self.line(depth, "}");
        Ok(())
    }
}

fn primitive(p: &Primitive) -> Result<String, SerializationError> {
    match p {
        Primitive::Box { size } => {
            for (field, v) in [("x", size.x), ("y", size.y), ("z", size.z)] {
                positive("cube", field, v)?;
            }
            Ok(format!("cube({});", vector("cube", *size)?))
        }
        Primitive::Cylinder { radius, height } => {
            positive("cylinder", "r", *radius)?;
            positive("cylinder", "h", *height)?;
            Ok(format!(
                "cylinder(h = {}, r = {});",
                format_number(*height),
                format_number(*radius)
            ))
        }
        Primitive::Revolve {
            width,
            height,
            angle_deg,
        } => {
            positive("rotate_extrude", "width", *width)?;
            positive("rotate_extrude", "height", *height)?;
            finite("rotate_extrude", "angle", *angle_deg)?;
            if *angle_deg <= 0.0 || *angle_deg > 360.0 {
                return Err(SerializationError::RevolveAngle(*angle_deg));
            }
            Ok(format!(
                "rotate_extrude(angle = {}) square([{}, {}]);",
                format_number(*angle_deg),
                format_number(*width),
                format_number(*height)
            ))
        }
    }
}

fn vector(node: &'static str, v: Vec3) -> Result<String, SerializationError> {
    finite(node, "x", v.x)?;
    finite(node, "y", v.y)?;
    finite(node, "z", v.z)?;
    Ok(format!(
        "[{}, {}, {}]",
        format_number(v.x),
        format_number(v.y),
        format_number(v.z)
    ))
}

fn finite(node: &'static str, field: &'static str, v: f64) -> Result<(), SerializationError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(SerializationError::NonFinite { node, field })
    }
}

fn positive(node: &'static str, field: &'static str, v: f64) -> Result<(), SerializationError> {
    finite(node, field, v)?;
    if v <= 0.0 {
        return Err(SerializationError::Degenerate {
            node,
            field,
            value: v,
        });
    }
    Ok(())
}
