use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use partgen_core::validate::validate;
use partgen_core::{DimensionRecord, FilletStyle};
use partgen_infer::{CommandModel, DimensionInferrer, ReplayModel, ViewSet, VisionModel};
use partgen_pipeline::{Artifacts, Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "partgen")]
#[command(about = "Dimension records and orthographic views to OpenSCAD parts.")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a dimension record and list every problem found.
    Validate {
        #[arg(long)]
        dims: PathBuf,
    },
    /// Print the OpenSCAD script (or the CSG tree as JSON) for a record.
    Script {
        #[arg(long)]
        dims: PathBuf,
        #[arg(long)]
        tree: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write the script, the dimension listing and the mesh for a record.
    Build {
        #[arg(long)]
        dims: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Infer dimensions from three or four views, then build.
    Generate {
        side1: PathBuf,
        side2: PathBuf,
        side3: PathBuf,
        #[arg(long)]
        side4: Option<PathBuf>,
        /// Program that answers for the vision model; see `CommandModel`.
        #[arg(long, env = "PARTGEN_MODEL_CMD", conflicts_with = "replay")]
        model_cmd: Option<PathBuf>,
        /// Extra argument for the model program (repeatable).
        #[arg(long = "model-arg", allow_hyphen_values = true)]
        model_args: Vec<String>,
        /// Recorded model answer to use instead of a live model.
        #[arg(long)]
        replay: Option<PathBuf>,
        #[arg(long)]
        attempts: Option<usize>,
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Revolve,
    Subtract,
}

impl From<StyleArg> for FilletStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::Revolve => FilletStyle::Revolve,
            StyleArg::Subtract => FilletStyle::Subtract,
        }
    }
}

/// Flags layered over the config file.
#[derive(Debug, Args)]
struct Overrides {
    /// JSON pipeline config.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    openscad: Option<PathBuf>,
    /// Stop after writing the script.
    #[arg(long)]
    no_compile: bool,
    #[arg(long)]
    segments: Option<u32>,
    #[arg(long, value_enum)]
    fillet_style: Option<StyleArg>,
}

impl Overrides {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                ensure_input_file(path)?;
                PipelineConfig::load(path)?
            }
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.out_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(path) = &self.openscad {
            cfg.openscad = Some(path.clone());
        }
        if self.no_compile {
            cfg.compile = false;
        }
        if let Some(segments) = self.segments {
            cfg.segments = segments;
        }
        if let Some(style) = self.fillet_style {
            cfg.fillet_style = style.into();
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Validate { dims } => validate_cmd(&dims),
        Command::Script {
            dims,
            tree,
            overrides,
        } => script_cmd(&dims, tree, &overrides),
        Command::Build { dims, overrides } => {
            let record = load_record(&dims)?;
            let artifacts = Pipeline::new(overrides.resolve()?).run_record(&record)?;
            report(&artifacts);
            Ok(())
        }
        Command::Generate {
            side1,
            side2,
            side3,
            side4,
            model_cmd,
            model_args,
            replay,
            attempts,
            overrides,
        } => {
            let mut views = ViewSet::new(side1, side2, side3);
            if let Some(side4) = side4 {
                views = views.with_fourth(side4);
            }
            for (_, path) in views.paths() {
                ensure_input_file(path)?;
            }

            let mut cfg = overrides.resolve()?;
            if let Some(attempts) = attempts {
                cfg.max_attempts = attempts;
            }

            match (model_cmd, replay) {
                (Some(program), None) => {
                    let model = CommandModel::new(program).with_args(model_args);
                    generate(cfg, model, &views)
                }
                (None, Some(path)) => {
                    ensure_input_file(&path)?;
                    let model = ReplayModel::from_file(&path)
                        .with_context(|| format!("read replay: {path:?}"))?;
                    generate(cfg, model, &views)
                }
                _ => bail!("pass --model-cmd (or set PARTGEN_MODEL_CMD) or --replay"),
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_cmd(dims: &Path) -> Result<()> {
    let record = load_record(dims)?;
    let violations = validate(&record);
    if violations.is_empty() {
        println!("ok");
        return Ok(());
    }
    for violation in &violations {
        println!("{violation}");
    }
    bail!("{} violation(s) in {dims:?}", violations.len());
}

fn script_cmd(dims: &Path, tree: bool, overrides: &Overrides) -> Result<()> {
    let record = load_record(dims)?;
    let pipeline = Pipeline::new(overrides.resolve()?);
    if tree {
        let node = pipeline.tree(&record)?;
        let json = serde_json::to_string_pretty(&node).context("serialize tree")?;
        println!("{json}");
    } else {
        print!("{}", pipeline.script(&record)?);
    }
    Ok(())
}

fn generate<M: VisionModel>(cfg: PipelineConfig, model: M, views: &ViewSet) -> Result<()> {
    let mut inferrer = DimensionInferrer::new(model, cfg.inference());
    let artifacts = Pipeline::new(cfg).run_views(&mut inferrer, views)?;
    report(&artifacts);
    Ok(())
}

fn report(artifacts: &Artifacts) {
    if let Some(attempts) = artifacts.attempts {
        info!(attempts, "inference finished");
    }
    println!("script:     {}", artifacts.scad_path.display());
    println!("dimensions: {}", artifacts.dimensions_path.display());
    match &artifacts.mesh_path {
        Some(path) => println!("mesh:       {}", path.display()),
        None => println!("mesh:       (not compiled)"),
    }
}

fn load_record(path: &Path) -> Result<DimensionRecord> {
    ensure_input_file(path)?;
    let text = std::fs::read_to_string(path).with_context(|| format!("read dims: {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("parse dims: {path:?}"))
}

fn ensure_input_file(input: &Path) -> Result<()> {
    match std::fs::metadata(input) {
        Ok(meta) => {
            if meta.is_file() {
                Ok(())
            } else {
                bail!("input is not a file: {input:?}");
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            bail!("input not found: {input:?} (cwd: {cwd:?}).");
        }
        Err(err) => Err(err).with_context(|| format!("stat input: {input:?}")),
    }
}
