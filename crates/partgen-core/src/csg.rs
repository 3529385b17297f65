use crate::geom::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// Axis-aligned box with one corner at the origin.
    Box { size: Vec3 },
    /// Z-aligned cylinder, base disc at z = 0.
    Cylinder { radius: f64, height: f64 },
    /// The `width × height` rectangle in the XZ plane (x >= 0) swept about Z
    /// from 0 to `angle_deg`.
    Revolve {
        width: f64,
        height: f64,
        angle_deg: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsgNode {
    Primitive(Primitive),
    /// Rotates the child (degrees about X, then Y, then Z), then translates it.
    Transform {
        translation: Vec3,
        rotation: Vec3,
        child: Box<CsgNode>,
    },
    Union {
        children: Vec<CsgNode>,
    },
    Difference {
        base: Box<CsgNode>,
        subtractors: Vec<CsgNode>,
    },
    Intersection {
        children: Vec<CsgNode>,
    },
}

impl CsgNode {
    pub fn cube(x: f64, y: f64, z: f64) -> Self {
        CsgNode::Primitive(Primitive::Box {
            size: Vec3::new(x, y, z),
        })
    }

    pub fn cylinder(radius: f64, height: f64) -> Self {
        CsgNode::Primitive(Primitive::Cylinder { radius, height })
    }

    pub fn revolve(width: f64, height: f64, angle_deg: f64) -> Self {
        CsgNode::Primitive(Primitive::Revolve {
            width,
            height,
            angle_deg,
        })
    }

    pub fn union(children: Vec<CsgNode>) -> Self {
        CsgNode::Union { children }
    }

    pub fn difference(base: CsgNode, subtractors: Vec<CsgNode>) -> Self {
        CsgNode::Difference {
            base: Box::new(base),
            subtractors,
        }
    }

    pub fn intersection(children: Vec<CsgNode>) -> Self {
        CsgNode::Intersection { children }
    }

    pub fn transformed(self, translation: Vec3, rotation: Vec3) -> Self {
        CsgNode::Transform {
            translation,
            rotation,
            child: Box::new(self),
        }
    }

    pub fn translated(self, translation: Vec3) -> Self {
        self.transformed(translation, Vec3::ZERO)
    }

    /// Leaf primitives in depth-first, left-to-right order.
    pub fn primitives(&self) -> Vec<&Primitive> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a Primitive>) {
        match self {
            CsgNode::Primitive(p) => out.push(p),
            CsgNode::Transform { child, .. } => child.collect_primitives(out),
            CsgNode::Union { children } | CsgNode::Intersection { children } => {
                for c in children {
                    c.collect_primitives(out);
                }
            }
            CsgNode::Difference { base, subtractors } => {
                base.collect_primitives(out);
                for s in subtractors {
                    s.collect_primitives(out);
                }
            }
        }
    }
}
