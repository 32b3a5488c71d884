//! Controller lifecycle for the emulated switch.
//!
//! A [`Controller`] ties one [`Switch`] to an HTTP emulation server and an
//! [`Advertiser`]. It moves through three states:
//!
//! ```text
//! Unstarted --start--> Running --stop--> Stopped
//! ```
//!
//! `Stopped` is terminal; build a new controller to run again.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::advertise::{self, AdvertiseError, Advertiser, AdvertiserKind};
use crate::api::{self, AppState, ServerError, ServerHandle};
use crate::context::{
    normalize_prefix, resolve_addresses, validate_prefix, IpDetector, LocalIpDetector, NetworkError,
    UrlBuilder,
};
use crate::protocol_constants::{CONTROL_PATH, EVENT_PATH, SHUTDOWN_GRACE};
use crate::switch::Switch;
use crate::wemo::DeviceInfo;

const SERIAL_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SERIAL_LENGTH: usize = 8;

/// Errors returned by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Required settings are missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation is not valid in the current state.
    #[error("cannot {operation} a controller that is {state}")]
    InvalidState {
        operation: &'static str,
        state: ControllerState,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Advertise(#[from] AdvertiseError),
}

/// Convenient Result alias for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Lifecycle state of a [`Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Unstarted,
    Running,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unstarted => "unstarted",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Settings of one emulated device. Fixed once the controller is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Friendly name shown by hubs.
    pub name: String,
    pub serial: String,
    pub uuid: String,
    /// Address to listen on. `None` or `0.0.0.0` means auto-detect.
    pub listen_address: Option<Ipv4Addr>,
    /// Port to listen on; `0` picks an ephemeral port.
    pub listen_port: u16,
    /// Interface whose address is advertised.
    pub interface: Option<String>,
    /// minissdpd socket. When set, advertisement goes through the daemon.
    pub minissdp_socket: Option<PathBuf>,
    /// Normalized path prefix for all endpoints.
    pub uri_prefix: String,
}

#[cfg(test)]
impl ControllerConfig {
    pub(crate) fn for_tests() -> Self {
        Self {
            name: "test".to_string(),
            serial: "TEST0001".to_string(),
            uuid: "uuid-for-tests".to_string(),
            listen_address: None,
            listen_port: 0,
            interface: None,
            minissdp_socket: None,
            uri_prefix: String::new(),
        }
    }
}

/// Runtime record of an active advertisement.
pub struct AdvertisementSession {
    advertiser: Box<dyn Advertiser>,
    location: String,
}

impl AdvertisementSession {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> AdvertiserKind {
        self.advertiser.kind()
    }
}

/// Builder for constructing a [`Controller`].
#[derive(Default)]
pub struct ControllerBuilder {
    name: Option<String>,
    switch: Option<Arc<dyn Switch>>,
    listen_address: Option<Ipv4Addr>,
    listen_port: u16,
    interface: Option<String>,
    uuid: Option<String>,
    minissdp_socket: Option<PathBuf>,
    uri_prefix: String,
    serial: Option<String>,
    ip_detector: Option<Arc<dyn IpDetector>>,
    advertiser: Option<Box<dyn Advertiser>>,
}

impl ControllerBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the friendly name. Empty names are replaced by a generated one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    /// Sets the controlled device.
    pub fn switch(mut self, switch: Arc<dyn Switch>) -> Self {
        self.switch = Some(switch);
        self
    }

    /// Sets the IPv4 address to listen on and advertise.
    pub fn listen_address(mut self, addr: Ipv4Addr) -> Self {
        self.listen_address = Some(addr);
        self
    }

    /// Sets the TCP port to listen on.
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Restricts address detection to the named interface.
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    /// Sets a fixed device UUID.
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into()).filter(|u: &String| !u.is_empty());
        self
    }

    /// Advertises through the minissdpd socket at `path`.
    pub fn minissdp_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.minissdp_socket = Some(path.into());
        self
    }

    /// Serves every endpoint below `prefix`.
    pub fn uri_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.uri_prefix = normalize_prefix(prefix.as_ref());
        self
    }

    /// Sets a fixed serial number.
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Replaces the local address detector.
    pub fn ip_detector(mut self, detector: Arc<dyn IpDetector>) -> Self {
        self.ip_detector = Some(detector);
        self
    }

    /// Replaces the advertiser chosen from the configuration.
    pub fn advertiser(mut self, advertiser: Box<dyn Advertiser>) -> Self {
        self.advertiser = Some(advertiser);
        self
    }

    /// Fills in defaults and selects the advertisement transport.
    pub fn build(self) -> Controller {
        let serial = self.serial.unwrap_or_else(random_serial);
        let name = self
            .name
            .unwrap_or_else(|| format!("smartswitch-{}", serial));
        let uuid = self.uuid.unwrap_or_else(|| default_uuid(&name));

        let config = ControllerConfig {
            name,
            serial,
            uuid,
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            interface: self.interface,
            minissdp_socket: self.minissdp_socket,
            uri_prefix: self.uri_prefix,
        };

        let advertiser = self
            .advertiser
            .unwrap_or_else(|| advertise::for_config(&config));

        log::debug!(
            "[Controller] Built {} ({:?}, uuid {})",
            config.name,
            advertiser.kind(),
            config.uuid
        );

        Controller {
            config,
            switch: self.switch,
            ip_detector: self.ip_detector.unwrap_or_else(LocalIpDetector::arc),
            advertiser: Some(advertiser),
            state: ControllerState::Unstarted,
            session: None,
            server: None,
        }
    }
}

/// Generates a random serial of uppercase letters and digits.
fn random_serial() -> String {
    Uuid::new_v4().as_bytes()[..SERIAL_LENGTH]
        .iter()
        .map(|b| SERIAL_CHARS[*b as usize % SERIAL_CHARS.len()] as char)
        .collect()
}

/// Derives a stable UUID from the device name.
fn default_uuid(name: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_URL, format!("smartswitch{}", name).as_bytes()).to_string()
}

/// Exposes a [`Switch`] as an emulated WeMo socket.
pub struct Controller {
    config: ControllerConfig,
    switch: Option<Arc<dyn Switch>>,
    ip_detector: Arc<dyn IpDetector>,
    advertiser: Option<Box<dyn Advertiser>>,
    state: ControllerState,
    session: Option<AdvertisementSession>,
    server: Option<ServerHandle>,
}

impl Controller {
    /// Creates a new builder for constructing a `Controller`.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Advertised description URL while running.
    pub fn location(&self) -> Option<&str> {
        self.session.as_ref().map(AdvertisementSession::location)
    }

    /// Address the HTTP listener is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::local_addr)
    }

    /// Starts serving and advertising. Returns the advertised location.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::InvalidState`] unless the controller is unstarted
    /// - [`ControllerError::Configuration`] if no switch was set or the URI
    ///   prefix cannot be routed
    /// - [`ControllerError::Network`] if no address can be advertised
    /// - [`ControllerError::Server`] if the listener cannot be bound
    /// - [`ControllerError::Advertise`] if advertising fails; the server is
    ///   shut down again and the controller stays unstarted
    pub async fn start(&mut self) -> ControllerResult<String> {
        if self.state != ControllerState::Unstarted {
            return Err(ControllerError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let switch = self
            .switch
            .clone()
            .ok_or_else(|| ControllerError::Configuration("no switch configured".into()))?;
        validate_prefix(&self.config.uri_prefix).map_err(ControllerError::Configuration)?;

        let addrs = resolve_addresses(
            self.config.listen_address,
            self.config.interface.as_deref(),
            self.ip_detector.as_ref(),
        )?;

        let listener = api::bind(SocketAddr::from((addrs.bind, self.config.listen_port))).await?;
        let port = listener.local_addr().map_err(ServerError::Bind)?.port();

        let prefix = &self.config.uri_prefix;
        let location = UrlBuilder::new(addrs.advertise, port, prefix).location_url();
        let device = DeviceInfo {
            friendly_name: self.config.name.clone(),
            uuid: self.config.uuid.clone(),
            serial: self.config.serial.clone(),
            control_url: format!("{}{}", prefix, CONTROL_PATH),
            event_url: format!("{}{}", prefix, EVENT_PATH),
        };

        let server = api::spawn_server(
            listener,
            AppState::new(switch, device, prefix),
            CancellationToken::new(),
        )?;

        let Some(mut advertiser) = self.advertiser.take() else {
            shutdown_server(server).await;
            return Err(ControllerError::Configuration("no advertiser available".into()));
        };

        if let Err(e) = advertiser.advertise(&location).await {
            log::warn!("[Controller] Advertising {} failed: {}", location, e);
            self.advertiser = Some(advertiser);
            shutdown_server(server).await;
            return Err(e.into());
        }

        log::info!(
            "[Controller] {} running at {} ({:?})",
            self.config.name,
            location,
            advertiser.kind()
        );

        self.session = Some(AdvertisementSession {
            advertiser,
            location: location.clone(),
        });
        self.server = Some(server);
        self.state = ControllerState::Running;
        Ok(location)
    }

    /// Stops advertising and serving.
    ///
    /// Stopping an unstarted or stopped controller does nothing. Every step is
    /// attempted even if an earlier one fails; the first error is returned.
    pub async fn stop(&mut self) -> ControllerResult<()> {
        if self.state != ControllerState::Running {
            return Ok(());
        }

        let mut first_error: Option<ControllerError> = None;

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.advertiser.byebye().await {
                log::warn!("[Controller] Could not send byebye: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        if let Some(server) = self.server.take() {
            if let Err(e) = server.shutdown_and_join(SHUTDOWN_GRACE).await {
                log::warn!("[Controller] Could not stop http server: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        self.state = ControllerState::Stopped;
        log::info!("[Controller] {} stopped", self.config.name);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(server) = &self.server {
            server.shutdown();
        }
    }
}

async fn shutdown_server(server: ServerHandle) {
    if let Err(e) = server.shutdown_and_join(SHUTDOWN_GRACE).await {
        log::warn!("[Controller] Could not stop http server: {}", e);
    }
}
