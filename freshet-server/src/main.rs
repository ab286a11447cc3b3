//! The Freshet server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use freshet_server::config::ServerConfig;
use freshet_server::http::AdminState;
use freshet_server::{gateway, http};
use freshet_service::Service;
use freshet_storage::registry::BackendRegistry;

#[derive(Debug, Parser)]
#[command(name = "freshet-server", about = "Stream-processing service with live fan-out")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "freshet.toml")]
    config: PathBuf,

    /// Override the event gateway address.
    #[arg(long)]
    events_addr: Option<String>,

    /// Override the admin HTTP address.
    #[arg(long)]
    http_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = if args.config.exists() {
        ServerConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        warn!(path = %args.config.display(), "config file not found, using defaults");
        ServerConfig::default()
    };
    if let Some(addr) = args.events_addr {
        config.events_addr = addr;
    }
    if let Some(addr) = args.http_addr {
        config.http_addr = addr;
    }
    config.validate().context("validating configuration")?;

    let registry = BackendRegistry::with_defaults();
    let service = Arc::new(Service::new(config.delivery.into()));
    for entry in &config.backends {
        // backend construction may touch disk or spin up a blocking
        // HTTP client, neither of which belongs on a runtime worker
        let descriptor = entry.descriptor();
        let builder = registry.clone();
        let backend = tokio::task::spawn_blocking(move || builder.from_config(&descriptor))
            .await
            .context("backend construction task failed")?
            .with_context(|| format!("building backend \"{}\"", entry.name))?;
        service
            .add_backend(&entry.name, backend)
            .with_context(|| format!("registering backend \"{}\"", entry.name))?;
        info!(backend = %entry.name, kind = %entry.backend_type, "backend ready");
    }

    let (shutdown_tx, _) = broadcast::channel(1);

    let events_listener = TcpListener::bind(&config.events_addr)
        .await
        .with_context(|| format!("binding {}", config.events_addr))?;
    let http_listener = TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("binding {}", config.http_addr))?;

    let gateway_task = tokio::spawn(gateway::run(
        Arc::clone(&service),
        events_listener,
        shutdown_tx.subscribe(),
    ));
    let admin_state = Arc::new(AdminState::new(Arc::clone(&service), registry));
    let http_task = tokio::spawn(http::run(admin_state, http_listener, shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(());

    let _ = gateway_task.await;
    let _ = http_task.await;

    let service_shutdown = Arc::clone(&service);
    tokio::task::spawn_blocking(move || {
        if let Err(err) = service_shutdown.close() {
            warn!(error = %err, "service teardown reported failures");
        }
    })
    .await
    .ok();

    Ok(())
}
