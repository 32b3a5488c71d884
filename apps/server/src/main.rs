//! SmartSwitch Server - standalone host for an emulated WeMo switch.
//!
//! Runs a controller around an in-memory switch so hubs can discover and flip
//! it, and offers a `services` subcommand to inspect what a local minissdpd
//! is advertising.

mod config;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smartswitch_core::protocol_constants::DEFAULT_SOCKET_PATH;
use smartswitch_core::{DaemonClient, MemorySwitch, ServiceRecord};
use tokio::signal;

use crate::config::ServerConfig;

/// SmartSwitch Server - emulated WeMo socket for smart-home hubs.
#[derive(Parser, Debug)]
#[command(name = "smartswitch-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(
        short,
        long,
        default_value = "info",
        env = "SMARTSWITCH_LOG_LEVEL",
        global = true
    )]
    log_level: log::LevelFilter,

    /// minissdpd socket path (overrides config file).
    #[arg(short = 's', long, env = "SMARTSWITCH_MINISSDP_SOCKET", global = true)]
    minissdp_socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve and advertise the emulated switch (default).
    Run {
        /// Friendly name (overrides config file).
        #[arg(short, long)]
        name: Option<String>,

        /// Listen address (overrides config file).
        #[arg(short = 'a', long)]
        listen_address: Option<Ipv4Addr>,

        /// Listen port (overrides config file).
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Interface to advertise on (overrides config file).
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// List services registered with minissdpd.
    Services {
        /// Only services with this USN.
        #[arg(long, conflicts_with = "service_type")]
        usn: Option<String>,

        /// Only services of this type.
        #[arg(long = "type")]
        service_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(socket) = args.minissdp_socket {
        config.minissdp_socket = Some(socket);
    }

    match args.command {
        Some(Command::Services { usn, service_type }) => {
            list_services(&config, usn, service_type).await
        }
        Some(Command::Run {
            name,
            listen_address,
            port,
            interface,
        }) => {
            if name.is_some() {
                config.name = name;
            }
            if listen_address.is_some() {
                config.listen_address = listen_address;
            }
            if let Some(port) = port {
                config.listen_port = port;
            }
            if interface.is_some() {
                config.interface = interface;
            }
            run(config).await
        }
        None => run(config).await,
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    log::info!("SmartSwitch Server v{}", env!("CARGO_PKG_VERSION"));

    let switch = Arc::new(MemorySwitch::new(config.initial_state));
    let mut controller = config.to_builder(switch).build();

    log::info!(
        "Configuration: name={}, uuid={}, transport={}",
        controller.config().name,
        controller.config().uuid,
        match &controller.config().minissdp_socket {
            Some(path) => format!("minissdpd ({})", path.display()),
            None => "multicast".to_string(),
        }
    );

    let location = controller
        .start()
        .await
        .context("Failed to start emulated switch")?;
    log::info!("WeMo handler listening on {}", location);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    controller
        .stop()
        .await
        .context("Failed to stop emulated switch")?;

    log::info!("Shutdown complete");
    Ok(())
}

async fn list_services(
    config: &ServerConfig,
    usn: Option<String>,
    service_type: Option<String>,
) -> Result<()> {
    let socket = config
        .minissdp_socket
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));

    let records = tokio::task::spawn_blocking(move || -> Result<Vec<ServiceRecord>> {
        let mut client = DaemonClient::new(&socket);
        client
            .connect()
            .with_context(|| format!("Failed to connect to {}", socket.display()))?;
        let records = match (usn, service_type) {
            (Some(usn), _) => client.query_by_usn(&usn),
            (None, Some(service_type)) => client.query_by_type(&service_type),
            (None, None) => client.query_all(),
        };
        client.close();
        records.context("Failed to query minissdpd")
    })
    .await
    .context("Query task failed")??;

    for record in &records {
        println!("{}", record.location());
        println!("  type: {}", record.service_type());
        println!("  usn:  {}", record.usn());
    }
    log::info!("{} service(s) registered", records.len());
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
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
