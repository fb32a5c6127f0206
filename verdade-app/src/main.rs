use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use verdade_common::observability::{init_logging, LogConfig, LogFormat};
use verdade_config::{discover_config_file, VerdadeConfig, VerdadeConfigLoader};
use verdade_runtime::{VerdadeHandle, VerdadeRuntime};
use verdade_server::create_router;

mod bootstrap;

/// Fact-check verification service.
#[derive(Debug, Parser)]
#[command(name = "verdade", version, about)]
struct Args {
    /// YAML config file (default: ./verdade.yaml, then the user config dir)
    #[arg(long, short, env = "VERDADE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Log encoding: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn load_config(args: &Args) -> Result<VerdadeConfig> {
    let loader = VerdadeConfigLoader::new();
    let loader = match args.config.as_ref() {
        Some(path) => loader.with_file(path),
        None => match discover_config_file() {
            Some(path) => loader.with_file(path),
            None => loader,
        },
    };
    loader.load().context("failed to load configuration")
}

async fn serve(cfg: VerdadeConfig, bind: String, handle: VerdadeHandle) -> Result<()> {
    let state = Arc::new(bootstrap::build_state(&cfg)?);
    let provider = state.provider;
    let model = state.model.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr=%listener.local_addr()?, %provider, %model, "app.listening");

    handle.cancel_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(handle.shutdown_signal())
        .await?;

    tracing::info!("app.stopped");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;

    let log_file = init_logging(LogConfig {
        app_name: "verdade",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: args.log_format.unwrap_or(cfg.logging.format),
        default_filter: cfg.logging.filter.clone(),
    })?;
    if let Some(path) = log_file {
        tracing::info!(path=%path.display(), "app.log_file");
    }

    let bind = args.bind.clone().unwrap_or_else(|| cfg.server.bind.clone());
    let runtime = VerdadeRuntime::build("verdade-worker", None)?;
    let result = runtime.block_on(serve(cfg, bind, runtime.handle()));
    runtime.shutdown(Duration::from_secs(5));
    result
}
