//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use smartswitch_core::{Controller, ControllerBuilder, Switch};

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Friendly name shown by hubs. Generated from the serial if unset.
    /// Override: `SMARTSWITCH_NAME`
    pub name: Option<String>,

    /// Serial number. Random if unset.
    pub serial: Option<String>,

    /// Device UUID. Derived from the name if unset.
    pub uuid: Option<String>,

    /// Address to listen on and advertise. Auto-detected if unset.
    /// Override: `SMARTSWITCH_LISTEN_ADDRESS`
    pub listen_address: Option<Ipv4Addr>,

    /// Port for the emulation endpoints; `0` picks a free port.
    /// Override: `SMARTSWITCH_LISTEN_PORT`
    pub listen_port: u16,

    /// Interface whose address is advertised.
    /// Override: `SMARTSWITCH_INTERFACE`
    pub interface: Option<String>,

    /// Path prefix for all endpoints.
    pub uri_prefix: String,

    /// minissdpd socket. When set, the device is registered with the daemon
    /// instead of announcing itself over multicast.
    /// Override: `SMARTSWITCH_MINISSDP_SOCKET`
    pub minissdp_socket: Option<PathBuf>,

    /// Initial state of the in-memory switch.
    pub initial_state: bool,
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SMARTSWITCH_NAME") {
            if !val.is_empty() {
                self.name = Some(val);
            }
        }

        if let Ok(val) = std::env::var("SMARTSWITCH_LISTEN_ADDRESS") {
            if let Ok(ip) = val.parse() {
                self.listen_address = Some(ip);
            }
        }

        if let Ok(val) = std::env::var("SMARTSWITCH_LISTEN_PORT") {
            if let Ok(port) = val.parse() {
                self.listen_port = port;
            }
        }

        if let Ok(val) = std::env::var("SMARTSWITCH_INTERFACE") {
            if !val.is_empty() {
                self.interface = Some(val);
            }
        }

        // Note: SMARTSWITCH_MINISSDP_SOCKET is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Creates a controller builder for `switch` from these settings.
    pub fn to_builder(&self, switch: Arc<dyn Switch>) -> ControllerBuilder {
        let mut builder = Controller::builder()
            .switch(switch)
            .listen_port(self.listen_port)
            .uri_prefix(&self.uri_prefix);

        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(serial) = &self.serial {
            builder = builder.serial(serial);
        }
        if let Some(uuid) = &self.uuid {
            builder = builder.uuid(uuid);
        }
        if let Some(addr) = self.listen_address {
            builder = builder.listen_address(addr);
        }
        if let Some(interface) = &self.interface {
            builder = builder.interface(interface);
        }
        if let Some(socket) = &self.minissdp_socket {
            builder = builder.minissdp_socket(socket);
        }
        builder
    }
}
