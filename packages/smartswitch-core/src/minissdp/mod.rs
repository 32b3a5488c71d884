//! minissdpd integration.
//!
//! [minissdpd](http://miniupnp.free.fr/minissdpd.html) owns UDP port 1900 on
//! hosts such as Synology NAS units and advertises services on behalf of local
//! processes that register through its Unix socket.
//!
//! - `wire` - length prefix and service record codec
//! - `client` - blocking socket client (register and query requests)

pub mod client;
pub mod wire;

pub use client::{DaemonClient, DaemonError, DaemonResult};
pub use wire::{ServiceRecord, WireError, WireResult};
