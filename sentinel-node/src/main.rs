use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use sentinel_ledger::Ledger;
use sentinel_node::{
    audit::AuditReport,
    build_runtime,
    cli::{Cli, Commands, RunOverrides},
    config::Config,
    run_simulation,
    setup::{ensure_config, run_name, write_default_config},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Parse Arguments
    let cli = Cli::parse();
    let name = run_name(cli.command.config_path()).unwrap_or_else(|| "sentinel".to_string());

    // 2. Initialize Logging
    std::fs::create_dir_all("logs")?;
    let file_appender = tracing_appender::rolling::never("logs", format!("audit-{}.log", name));
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let consensus_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "consensus"
                || metadata.target().starts_with("sentinel_ledger")
                || metadata.target().starts_with("sentinel_node")
        }));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sentinel_node=debug".into()),
        )
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| metadata.target() != "consensus"));

    tracing_subscriber::registry().with(consensus_layer).with(stdout_layer).init();

    // 3. Dispatch
    match cli.command {
        Commands::InitConfig { config, force } => init_config(&config, force),
        Commands::Run { config, overrides } => run(config, overrides).await,
        Commands::Audit { config, out } => audit(&config, out.as_deref()).await,
    }
}

fn init_config(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        info!("⚠️ {} already exists. Use --force to overwrite it.", path.display());
        return Ok(());
    }
    write_default_config(path)?;
    info!("✅ Default config written to {}", path.display());
    Ok(())
}

async fn run(path: PathBuf, overrides: RunOverrides) -> Result<(), Box<dyn std::error::Error>> {
    info!("--- STARTING SENTINEL ---");
    info!("Config: {}", path.display());

    if let Err(e) = ensure_config(&path) {
        error!("Config bootstrap failed: {}", e);
        return Err(e.into());
    }
    let mut config = Config::load_from_file(&path)?;
    overrides.apply(&mut config);

    let mut runtime = match build_runtime(config).await {
        Ok(rt) => rt,
        Err(e) => {
            error!("❌ Failed to start: {}", e);
            return Err(e.into());
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl+C received. Stopping after the current phase...");
            shutdown_tx.send_replace(true);
        }
    });

    let summary = run_simulation(&mut runtime, shutdown_rx).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(out) = &runtime.config.audit_path {
        let report = AuditReport::collect(&runtime.ledger, &runtime.reports.reports()).await?;
        report.write_to(out)?;
    }
    Ok(())
}

async fn audit(path: &Path, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from_file(path)?;
    if config.in_memory {
        return Err("in-memory runs keep no ledger on disk to audit".into());
    }
    if !Path::new(&config.data_dir).exists() {
        return Err(format!("no ledger found under {}", config.data_dir).into());
    }

    let ledger = Ledger::open(&config.data_dir, config.retry_policy()).await?;
    let report = AuditReport::collect(&ledger, &[]).await?;
    match out {
        Some(out) => report.write_to(out)?,
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}
