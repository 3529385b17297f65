pub mod builder;
pub mod csg;
pub mod dump;
pub mod geom;
pub mod model;
pub mod scad;
pub mod validate;

pub use builder::{build, BuilderConfig, FilletStyle, SolidSpecBuilder, THROUGH_MARGIN};
pub use csg::{CsgNode, Primitive};
pub use model::{Corner, DimensionRecord, Fillet, Hole};
pub use validate::{InvalidDimensionError, Violation, ViolationKind};
