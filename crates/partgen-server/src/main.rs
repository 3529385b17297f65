use anyhow::{bail, Context, Result};
use clap::Parser;
use partgen_infer::{CommandModel, ReplayModel, VisionModel};
use partgen_pipeline::{Pipeline, PipelineConfig};
use partgen_server::{app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "partgen-server")]
#[command(about = "HTTP front end for building parts from dimension records and views.")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: SocketAddr,
    /// JSON pipeline config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Program that answers for the vision model.
    #[arg(long, env = "PARTGEN_MODEL_CMD", conflicts_with = "replay")]
    model_cmd: Option<PathBuf>,
    /// Extra argument for the model program (repeatable).
    #[arg(long = "model-arg", allow_hyphen_values = true)]
    model_args: Vec<String>,
    /// Recorded model answer returned for every request.
    #[arg(long)]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let model: Box<dyn VisionModel + Send> = match (args.model_cmd, args.replay) {
        (Some(program), None) => Box::new(CommandModel::new(program).with_args(args.model_args)),
        (None, Some(path)) => {
            let answer = std::fs::read_to_string(&path)
                .with_context(|| format!("read replay: {path:?}"))?;
            Box::new(ReplayModel::repeating(answer))
        }
        _ => bail!("pass --model-cmd (or set PARTGEN_MODEL_CMD) or --replay"),
    };

    let state = AppState::new(Pipeline::new(cfg), model);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    info!(addr = %args.addr, "listening");
    axum::serve(listener, app(state))
        .await
        .context("serve")?;
    Ok(())
}
