//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (SSDP, UPnP, the WeMo
//! device profile, minissdpd) and changing them would break interoperability
//! with existing smart-home hubs.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// WeMo Device Profile
// ─────────────────────────────────────────────────────────────────────────────

/// UPnP device type of the emulated Belkin socket.
pub const WEMO_DEVICE_TYPE: &str = "urn:Belkin:device:controllee:1";

/// UPnP service type exposed by the emulated socket.
pub const WEMO_SERVICE_TYPE: &str = "urn:Belkin:service:basicevent:1";

/// Path (below the URI prefix) of the device description document.
pub const SETUP_PATH: &str = "/setup.xml";

/// Path (below the URI prefix) of the basicevent control endpoint.
pub const CONTROL_PATH: &str = "/upnp/control/basicevent1";

/// Path (below the URI prefix) advertised as the basicevent event endpoint.
pub const EVENT_PATH: &str = "/upnp/event/basicevent1";

/// Marker that identifies a `SetBinaryState` SOAP action in a control body.
pub const SET_STATE_MARKER: &str = "SetBinaryState";

/// Element carrying the on/off value in control requests and responses.
pub const BINARY_STATE_ELEMENT: &str = "BinaryState";

/// Product string used in SSDP `SERVER` headers and daemon registrations.
pub const SERVER_PRODUCT: &str = "Unspecified, UPnP/1.0, SmartSwitch/1.0";

// ─────────────────────────────────────────────────────────────────────────────
// SSDP
// ─────────────────────────────────────────────────────────────────────────────

/// SSDP multicast group.
pub const SSDP_MULTICAST_ADDR: [u8; 4] = [239, 255, 255, 250];

/// SSDP port.
pub const SSDP_PORT: u16 = 1900;

/// Advertisement lifetime announced in `CACHE-CONTROL: max-age` (seconds).
pub const SSDP_MAX_AGE_SECS: u64 = 3600;

/// UPnP 1.0 recommends a multicast TTL of 4 for SSDP.
pub const SSDP_MULTICAST_TTL: u32 = 4;

/// Search target wildcard used by Echo devices looking for Belkin hardware.
pub const BELKIN_DEVICE_WILDCARD: &str = "urn:Belkin:device:**";

// ─────────────────────────────────────────────────────────────────────────────
// minissdpd
// ─────────────────────────────────────────────────────────────────────────────

/// Conventional location of the minissdpd Unix socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/minissdpd.sock";

/// Maximum number of bytes a length prefix may occupy.
///
/// Five 7-bit groups allow lengths up to 2^35 - 1.
pub const MAX_LENGTH_BYTES: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Upper bound on handling a single emulation request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum accepted size of a control request body (bytes).
pub const MAX_CONTROL_BODY_SIZE: usize = 64 * 1024;

/// How long `stop` waits for in-flight requests and the SSDP byebye burst.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
