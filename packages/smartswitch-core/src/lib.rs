//! SmartSwitch Core - expose any on/off device as an emulated WeMo socket.
//!
//! Smart-home hubs that understand the Belkin WeMo protocol discover the
//! emulated socket through SSDP and then flip it through UPnP SOAP calls. The
//! host application only supplies a [`Switch`] implementation.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`minissdp`]: minissdpd wire codec and blocking socket client
//! - [`advertise`]: advertisement transports (daemon relay, direct multicast)
//! - [`wemo`]: device description and SOAP documents
//! - [`api`]: HTTP emulation server
//! - [`context`]: address resolution and URL building
//! - [`controller`]: start/stop lifecycle tying everything together
//! - [`error`]: error taxonomy
//!
//! # Abstraction Traits
//!
//! - [`Switch`](switch::Switch): the controlled device
//! - [`Advertiser`](advertise::Advertiser): announcing the device location
//! - [`IpDetector`](context::IpDetector): local IP detection
//!
//! # Example
//!
//! ```ignore
//! let mut controller = Controller::builder()
//!     .name("garage door")
//!     .switch(Arc::new(MemorySwitch::new(false)))
//!     .build();
//! let location = controller.start().await?;
//! // ...
//! controller.stop().await?;
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod advertise;
pub mod api;
pub mod context;
pub mod controller;
pub mod error;
pub mod minissdp;
pub mod protocol_constants;
pub mod switch;
pub mod wemo;

// Re-export commonly used types at the crate root
pub use advertise::{AdvertiseError, Advertiser, AdvertiserKind, DaemonRelay, DirectMulticast};
pub use api::{AppState, ServerError, ServerHandle};
pub use context::{IpDetector, LocalIpDetector, NetworkError, UrlBuilder};
pub use controller::{
    Controller, ControllerBuilder, ControllerConfig, ControllerError, ControllerResult,
    ControllerState,
};
pub use error::{ErrorCode, ErrorKind};
pub use minissdp::{DaemonClient, DaemonError, ServiceRecord, WireError};
pub use switch::{MemorySwitch, Switch, SwitchError, SwitchResult};
