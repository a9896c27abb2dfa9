use anyhow::{Context, Result};
use autoheal::cli::{Args, ConfigDiscovery, ConfigOverrides, ExecutionMode, HealConfig, RunConfig};
use autoheal::container::{ContainerClient, DockerGateway};
use autoheal::heal::{Remediator, RestartStore, Scheduler};
use autoheal::status;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let verbose = matches!(&mode, ExecutionMode::Run(config) if config.verbose);
    init_tracing(verbose);

    match mode {
        ExecutionMode::Run(config) => run(config).await,
        ExecutionMode::CheckConfig { config_file } => check_config(config_file.as_deref()),
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "autoheal=debug"
    } else {
        "autoheal=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check_config(config_file: Option<&Path>) -> Result<()> {
    let config = ConfigDiscovery::load(config_file, &ConfigOverrides::default())
        .context("Invalid configuration")?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

async fn run(run_config: RunConfig) -> Result<()> {
    info!("Starting autoheal v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigDiscovery::load(run_config.config_file.as_deref(), &run_config.overrides)
        .context("Invalid configuration")?;
    log_config(&config);

    let client = ContainerClient::with_config(config.client_config())
        .await
        .context("Failed to connect to the container runtime")?;
    match client.runtime_type().await {
        Ok(runtime) => info!("Connected to {} runtime", runtime),
        Err(e) => warn!("Could not determine runtime type: {}", e),
    }

    let store = RestartStore::new();
    let gateway = DockerGateway::new(client, config.label_filter.clone());
    let remediator = Remediator::new(Arc::new(gateway), store.clone(), config.backoff_policy())
        .with_failure_policy(config.restart_failure_policy)
        .with_call_timeout(config.call_timeout());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::new(remediator, config.interval())
        .with_record_ttl(config.record_ttl_secs)
        .with_daily_clear(config.daily_clear)
        .spawn(shutdown_rx.clone());

    let mut status_server = if run_config.status_server {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind status API on {}", config.listen_addr))?;
        Some(tokio::spawn(status::serve(
            listener,
            store.clone(),
            shutdown_rx.clone(),
        )))
    } else {
        info!("Status API disabled");
        None
    };

    // A status server that dies early stops the controller too.
    let status_exit = {
        let status_done = async {
            match status_server.as_mut() {
                Some(handle) => Some(handle.await),
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                None
            }
            exit = status_done => exit,
        }
    };

    let status_failed = status_exit.is_some();
    if let Some(result) = status_exit {
        status_server = None;
        match result {
            Ok(Ok(())) => warn!("Status API stopped unexpectedly"),
            Ok(Err(e)) => error!("Status API failed: {}", e),
            Err(e) => error!("Status API task failed: {}", e),
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = status_server {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Status API failed: {}", e),
            Err(e) => error!("Status API task failed: {}", e),
        }
    }
    scheduler.await.context("Scheduler task failed")?;

    if status_failed {
        anyhow::bail!("Status API exited, controller stopped");
    }

    info!("autoheal stopped");
    Ok(())
}

fn log_config(config: &HealConfig) {
    info!(
        api_version = %config.api_version,
        interval_secs = config.interval_secs,
        base_backoff_secs = config.base_backoff_secs,
        max_backoff_secs = config.max_backoff_secs,
        reset_window_secs = config.reset_window_secs,
        max_restarts = config.max_restarts,
        call_timeout_secs = config.call_timeout_secs,
        record_ttl_secs = config.record_ttl_secs,
        daily_clear = config.daily_clear,
        label_filter = config.label_filter.as_deref().unwrap_or("none"),
        restart_failure_policy = %config.restart_failure_policy,
        listen_addr = %config.listen_addr,
        "Effective configuration"
    );
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
