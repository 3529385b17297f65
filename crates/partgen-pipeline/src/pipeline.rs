use crate::compiler::ScadCompiler;
use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use partgen_core::dump::dump_record;
use partgen_core::scad::to_scad_record;
use partgen_core::{CsgNode, DimensionRecord, SolidSpecBuilder};
use partgen_infer::{DimensionInferrer, ViewSet, VisionModel};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Files written by one run.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub record: DimensionRecord,
    pub scad_path: PathBuf,
    pub dimensions_path: PathBuf,
    /// `None` when compilation is switched off.
    pub mesh_path: Option<PathBuf>,
    /// Model requests spent, for runs that started from views.
    pub attempts: Option<usize>,
}

pub struct Pipeline {
    cfg: PipelineConfig,
    builder: SolidSpecBuilder,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Self {
        let builder = SolidSpecBuilder::new(cfg.builder());
        Self { cfg, builder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn tree(&self, record: &DimensionRecord) -> Result<CsgNode> {
        self.builder.build(record).context("build solid")
    }

    /// Builds and serializes without touching the filesystem.
    pub fn script(&self, record: &DimensionRecord) -> Result<String> {
        let tree = self.tree(record)?;
        to_scad_record(record, &tree, &self.cfg.scad_options()).context("serialize OpenSCAD")
    }

    #[instrument(skip(self, record), fields(out = ?self.cfg.output_dir))]
    pub fn run_record(&self, record: &DimensionRecord) -> Result<Artifacts> {
        let script = self.script(record)?;

        let out_dir = &self.cfg.output_dir;
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir: {out_dir:?}"))?;

        let scad_path = self.cfg.scad_path();
        write_file(&scad_path, &script).context("write script")?;
        info!(path = ?scad_path, "script written");

        let dimensions_path = self.cfg.dims_path();
        write_file(&dimensions_path, &dimensions_text(record)).context("write dimensions")?;
        info!(path = ?dimensions_path, "dimensions written");

        let mesh_path = if self.cfg.compile {
            let mesh_path = self.cfg.mesh_path();
            let compiler = ScadCompiler::locate(self.cfg.openscad.as_deref())?;
            debug!(program = ?compiler.program(), "using OpenSCAD");
            compiler
                .compile(&scad_path, &mesh_path)
                .with_context(|| format!("compile {scad_path:?}"))?;
            Some(mesh_path)
        } else {
            None
        };

        Ok(Artifacts {
            record: record.clone(),
            scad_path,
            dimensions_path,
            mesh_path,
            attempts: None,
        })
    }

    #[instrument(skip(self, inferrer, views))]
    pub fn run_views<M: VisionModel>(
        &self,
        inferrer: &mut DimensionInferrer<M>,
        views: &ViewSet,
    ) -> Result<Artifacts> {
        let images = views.load()?;
        let inferred = inferrer.infer(&images).context("infer dimensions")?;
        info!(attempts = inferred.attempts, "dimensions inferred");

        let mut artifacts = self.run_record(&inferred.record)?;
        artifacts.attempts = Some(inferred.attempts);
        Ok(artifacts)
    }
}

/// The record listing with a generation header.
pub fn dimensions_text(record: &DimensionRecord) -> String {
    format!(
        "# partgen dimensions\n# generated {}\n{}",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        dump_record(record)
    )
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("write {path:?}"))
}
