//! Advertisement transports for the emulated device.
//!
//! Hubs find the device through SSDP. Two interchangeable transports exist:
//!
//! - [`DaemonRelay`] registers the device with a local minissdpd, for hosts
//!   where that daemon already owns UDP port 1900.
//! - [`DirectMulticast`] runs its own SSDP announcer on the multicast group.
//!
//! The transport is chosen once, from the controller configuration, by
//! [`for_config`].

use async_trait::async_trait;
use thiserror::Error;

use crate::controller::ControllerConfig;
use crate::minissdp::DaemonError;

pub mod daemon;
pub mod ssdp;

pub use daemon::DaemonRelay;
pub use ssdp::DirectMulticast;

/// Errors that can occur while advertising.
#[derive(Debug, Error)]
pub enum AdvertiseError {
    /// `advertise` was called with an empty location.
    #[error("no service location string provided")]
    NoLocation,

    /// The relay has no daemon socket path.
    #[error("no socket path provided for minissdp")]
    NoSocket,

    /// Talking to minissdpd failed.
    #[error("could not register with minissdp: {0}")]
    Daemon(#[from] DaemonError),

    /// A background advertisement task panicked.
    #[error("advertisement task failed: {0}")]
    Task(String),
}

/// Which transport an [`Advertiser`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiserKind {
    DaemonRelay,
    DirectMulticast,
}

/// Announces the device location to the network.
#[async_trait]
pub trait Advertiser: Send + Sync {
    /// Starts advertising `location`, the URL of the device description.
    async fn advertise(&mut self, location: &str) -> Result<(), AdvertiseError>;

    /// Withdraws the advertisement. Safe to call more than once.
    async fn byebye(&mut self) -> Result<(), AdvertiseError>;

    /// Transport used by this advertiser.
    fn kind(&self) -> AdvertiserKind;
}

/// Selects the transport for `config`: a configured daemon socket selects the
/// relay, otherwise the device announces itself over multicast.
pub fn for_config(config: &ControllerConfig) -> Box<dyn Advertiser> {
    match &config.minissdp_socket {
        Some(path) => Box::new(DaemonRelay::new(path.clone(), config.uuid.clone())),
        None => Box::new(DirectMulticast::new(config.uuid.clone())),
    }
}
