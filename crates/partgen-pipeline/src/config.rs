use anyhow::{Context, Result};
use partgen_core::scad::ScadOptions;
use partgen_core::{BuilderConfig, FilletStyle};
use partgen_infer::InferenceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub scad_name: String,
    pub mesh_name: String,
    pub dims_name: String,
    /// Explicit compiler binary. Discovery runs when unset.
    pub openscad: Option<PathBuf>,
    /// Compile the script into a mesh; `false` stops after writing the script.
    pub compile: bool,
    pub segments: u32,
    pub fillet_style: FilletStyle,
    pub max_attempts: usize,
    /// `None` or `0` disables request throttling.
    pub requests_per_minute: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            scad_name: "model.scad".to_string(),
            mesh_name: "output.stl".to_string(),
            dims_name: "dimensions.txt".to_string(),
            openscad: None,
            compile: true,
            segments: 64,
            fillet_style: FilletStyle::default(),
            max_attempts: 3,
            requests_per_minute: Some(60),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read config: {path:?}"))?;
        serde_json::from_str(&text).with_context(|| format!("parse config: {path:?}"))
    }

    pub fn scad_path(&self) -> PathBuf {
        self.output_dir.join(&self.scad_name)
    }

    pub fn mesh_path(&self) -> PathBuf {
        self.output_dir.join(&self.mesh_name)
    }

    pub fn dims_path(&self) -> PathBuf {
        self.output_dir.join(&self.dims_name)
    }

    pub fn builder(&self) -> BuilderConfig {
        BuilderConfig {
            fillet_style: self.fillet_style,
        }
    }

    pub fn scad_options(&self) -> ScadOptions {
        let name = Path::new(&self.scad_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("part")
            .to_string();
        ScadOptions {
            name,
            segments: self.segments,
        }
    }

    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            max_attempts: self.max_attempts,
            requests_per_minute: self.requests_per_minute.filter(|&n| n > 0),
        }
    }
}
