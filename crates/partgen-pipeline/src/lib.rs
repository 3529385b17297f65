pub mod compiler;
pub mod config;
pub mod pipeline;

pub use compiler::{locate_openscad, CompileError, ScadCompiler};
pub use config::PipelineConfig;
pub use pipeline::{dimensions_text, Artifacts, Pipeline};
