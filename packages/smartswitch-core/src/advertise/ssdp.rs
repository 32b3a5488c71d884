//! Direct SSDP announcer.
//!
//! Joins the SSDP multicast group, periodically multicasts `ssdp:alive`
//! notifications, answers matching `M-SEARCH` requests with unicast responses,
//! and multicasts `ssdp:byebye` when cancelled.
//!
//! Discovery is best-effort: socket failures are logged and never reach the
//! controller, so the HTTP endpoints keep working without multicast.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Uri;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{AdvertiseError, Advertiser, AdvertiserKind};
use crate::protocol_constants::{
    BELKIN_DEVICE_WILDCARD, SERVER_PRODUCT, SHUTDOWN_GRACE, SSDP_MAX_AGE_SECS,
    SSDP_MULTICAST_ADDR, SSDP_MULTICAST_TTL, SSDP_PORT, WEMO_DEVICE_TYPE,
};

const ROOT_DEVICE: &str = "upnp:rootdevice";
const SEARCH_ALL: &str = "ssdp:all";

// ─────────────────────────────────────────────────────────────────────────────
// ASCII Case-Insensitive Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Checks if `s` starts with `prefix` (ASCII case-insensitive, no allocation).
#[inline]
fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Checks if `haystack` contains `needle` (ASCII case-insensitive, no allocation).
#[inline]
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Returns the trimmed value of header `name` in an SSDP message.
fn header_value<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    message.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// What the announcer advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpDevice {
    pub device_type: String,
    pub uuid: String,
    pub location: String,
    pub max_age: u64,
}

impl SsdpDevice {
    pub fn new(uuid: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            device_type: WEMO_DEVICE_TYPE.to_string(),
            uuid: uuid.into(),
            location: location.into(),
            max_age: SSDP_MAX_AGE_SECS,
        }
    }

    fn uuid_target(&self) -> String {
        format!("uuid:{}", self.uuid)
    }

    /// Notification types announced for this device, in announcement order.
    pub fn notification_types(&self) -> [String; 3] {
        [
            ROOT_DEVICE.to_string(),
            self.uuid_target(),
            self.device_type.clone(),
        ]
    }

    /// USN paired with notification type `nt`.
    pub fn usn(&self, nt: &str) -> String {
        let uuid = self.uuid_target();
        if nt == uuid {
            uuid
        } else {
            format!("{}::{}", uuid, nt)
        }
    }

    /// Search targets to answer for an `M-SEARCH` with `ST: st`.
    pub fn search_response_targets(&self, st: &str) -> Vec<String> {
        if st.eq_ignore_ascii_case(SEARCH_ALL) {
            return self.notification_types().to_vec();
        }
        if st.eq_ignore_ascii_case(ROOT_DEVICE) {
            return vec![ROOT_DEVICE.to_string()];
        }
        if st == self.uuid_target() {
            return vec![self.uuid_target()];
        }
        if st.eq_ignore_ascii_case(&self.device_type) || st.eq_ignore_ascii_case(BELKIN_DEVICE_WILDCARD)
        {
            return vec![self.device_type.clone()];
        }
        Vec::new()
    }
}

/// Builds a multicast `NOTIFY` with sub-type `nts` (`ssdp:alive` / `ssdp:byebye`).
pub fn build_notify_message(device: &SsdpDevice, nt: &str, nts: &str) -> String {
    let mut message = format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         NT: {}\r\n\
         NTS: {}\r\n\
         USN: {}\r\n",
        nt,
        nts,
        device.usn(nt)
    );
    if nts == "ssdp:alive" {
        message.push_str(&format!(
            "CACHE-CONTROL: max-age={}\r\n\
             LOCATION: {}\r\n\
             SERVER: {}\r\n",
            device.max_age, device.location, SERVER_PRODUCT
        ));
    }
    message.push_str("\r\n");
    message
}

/// Builds the unicast response to an `M-SEARCH` for target `st`.
pub fn build_search_response(device: &SsdpDevice, st: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         ST: {}\r\n\
         USN: {}\r\n\r\n",
        device.max_age,
        device.location,
        SERVER_PRODUCT,
        st,
        device.usn(st)
    )
}

/// Returns the search target of an `M-SEARCH` discovery request.
///
/// Anything else (notifications from other devices, responses, malformed
/// packets) yields `None`.
pub fn parse_msearch(message: &str) -> Option<&str> {
    let start_line = message.lines().next()?;
    if !starts_with_ignore_ascii_case(start_line, "M-SEARCH") {
        return None;
    }
    let man = header_value(message, "MAN")?;
    if !contains_ignore_ascii_case(man, "ssdp:discover") {
        return None;
    }
    header_value(message, "ST").filter(|st| !st.is_empty())
}

/// Extracts the IPv4 host of a location URL, used to pick the multicast
/// interface. Falls back to the unspecified address.
fn interface_from_location(location: &str) -> Ipv4Addr {
    location
        .parse::<Uri>()
        .ok()
        .and_then(|uri| uri.host().and_then(|host| host.parse().ok()))
        .unwrap_or(Ipv4Addr::UNSPECIFIED)
}

// ─────────────────────────────────────────────────────────────────────────────
// Announcer
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the SSDP socket bound to port 1900 and joined to the multicast group.
///
/// Sets up socket options for sharing the port with other SSDP stacks:
/// - SO_REUSEADDR / SO_REUSEPORT
/// - Multicast TTL of 4 per UPnP spec
fn create_socket(iface_ip: Ipv4Addr) -> io::Result<UdpSocket> {
    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SSDP_PORT);
    let group = Ipv4Addr::from(SSDP_MULTICAST_ADDR);

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR: {}", e);
    }

    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEPORT: {}", e);
    }

    if let Err(e) = socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL) {
        log::warn!("[SSDP] Failed to set multicast TTL: {}", e);
    }

    if !iface_ip.is_unspecified() {
        if let Err(e) = socket.set_multicast_if_v4(&iface_ip) {
            log::warn!("[SSDP] Failed to select interface {}: {}", iface_ip, e);
        }
    }

    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&group, &iface_ip)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

async fn send_notifications(socket: &UdpSocket, device: &SsdpDevice, nts: &str) {
    let group = SocketAddr::from((SSDP_MULTICAST_ADDR, SSDP_PORT));
    for nt in device.notification_types() {
        let message = build_notify_message(device, &nt, nts);
        if let Err(e) = socket.send_to(message.as_bytes(), group).await {
            log::warn!("[SSDP] Failed to send {} for {}: {}", nts, nt, e);
        }
    }
}

async fn run_announcer(device: SsdpDevice, iface_ip: Ipv4Addr, cancel: CancellationToken) {
    let socket = match create_socket(iface_ip) {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("[SSDP] Announcer unavailable: {}", e);
            return;
        }
    };

    log::info!("[SSDP] Advertising {} on {}", device.location, iface_ip);
    send_notifications(&socket, &device, "ssdp:alive").await;

    let period = Duration::from_secs((device.max_age / 2).max(1));
    let mut refresh = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let mut buf = [0u8; 2048];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = refresh.tick() => {
                send_notifications(&socket, &device, "ssdp:alive").await;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, src) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        log::debug!("[SSDP] Receive failed: {}", e);
                        continue;
                    }
                };
                let message = String::from_utf8_lossy(&buf[..len]);
                let Some(st) = parse_msearch(&message) else {
                    continue;
                };
                for target in device.search_response_targets(st) {
                    let response = build_search_response(&device, &target);
                    if let Err(e) = socket.send_to(response.as_bytes(), src).await {
                        log::warn!("[SSDP] Failed to answer {}: {}", src, e);
                    }
                }
            }
        }
    }

    send_notifications(&socket, &device, "ssdp:byebye").await;
    log::info!("[SSDP] Stopped advertising {}", device.location);
}

struct Announcer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Advertises the device with a built-in SSDP announcer.
pub struct DirectMulticast {
    uuid: String,
    announcer: Option<Announcer>,
}

impl DirectMulticast {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            announcer: None,
        }
    }

    /// Returns true while an announcer task is running.
    pub fn is_running(&self) -> bool {
        self.announcer
            .as_ref()
            .is_some_and(|announcer| !announcer.task.is_finished())
    }
}

#[async_trait]
impl Advertiser for DirectMulticast {
    async fn advertise(&mut self, location: &str) -> Result<(), AdvertiseError> {
        if location.is_empty() {
            return Err(AdvertiseError::NoLocation);
        }
        self.byebye().await?;

        let device = SsdpDevice::new(self.uuid.clone(), location);
        let iface_ip = interface_from_location(location);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_announcer(device, iface_ip, cancel.clone()));

        self.announcer = Some(Announcer { cancel, task });
        Ok(())
    }

    async fn byebye(&mut self) -> Result<(), AdvertiseError> {
        let Some(Announcer { cancel, mut task }) = self.announcer.take() else {
            return Ok(());
        };

        cancel.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AdvertiseError::Task(e.to_string())),
            Err(_) => {
                log::warn!("[SSDP] Announcer did not stop within {:?}", SHUTDOWN_GRACE);
                task.abort();
                Ok(())
            }
        }
    }

    fn kind(&self) -> AdvertiserKind {
        AdvertiserKind::DirectMulticast
    }
}

impl Drop for DirectMulticast {
    fn drop(&mut self) {
        if let Some(announcer) = self.announcer.take() {
            announcer.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> SsdpDevice {
        SsdpDevice::new("abc-123", "http://192.168.1.20:49153/setup.xml")
    }

    fn msearch(st: &str) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: 239.255.255.250:1900\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 3\r\n\
             ST: {}\r\n\r\n",
            st
        )
    }

    #[test]
    fn alive_notification_carries_location_and_max_age() {
        let message = build_notify_message(&device(), WEMO_DEVICE_TYPE, "ssdp:alive");
        assert!(message.starts_with("NOTIFY * HTTP/1.1\r\n"));
        assert!(message.contains("NT: urn:Belkin:device:controllee:1\r\n"));
        assert!(message.contains("NTS: ssdp:alive\r\n"));
        assert!(message.contains("USN: uuid:abc-123::urn:Belkin:device:controllee:1\r\n"));
        assert!(message.contains("CACHE-CONTROL: max-age=3600\r\n"));
        assert!(message.contains("LOCATION: http://192.168.1.20:49153/setup.xml\r\n"));
        assert!(message.ends_with("\r\n\r\n"));
    }

    #[test]
    fn byebye_notification_omits_location() {
        let message = build_notify_message(&device(), "uuid:abc-123", "ssdp:byebye");
        assert!(message.contains("NTS: ssdp:byebye\r\n"));
        assert!(message.contains("USN: uuid:abc-123\r\n"));
        assert!(!message.contains("LOCATION"));
    }

    #[test]
    fn search_response_has_required_headers() {
        let response = build_search_response(&device(), ROOT_DEVICE);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("EXT:\r\n"));
        assert!(response.contains("ST: upnp:rootdevice\r\n"));
        assert!(response.contains("USN: uuid:abc-123::upnp:rootdevice\r\n"));
        assert!(response.contains("SERVER: "));
    }

    #[test]
    fn parse_msearch_extracts_search_target() {
        assert_eq!(parse_msearch(&msearch("ssdp:all")), Some("ssdp:all"));

        let lower = "m-search * HTTP/1.1\r\nman: \"ssdp:discover\"\r\nst: urn:Belkin:device:**\r\n\r\n";
        assert_eq!(parse_msearch(lower), Some("urn:Belkin:device:**"));
    }

    #[test]
    fn parse_msearch_ignores_other_messages() {
        let notify = build_notify_message(&device(), ROOT_DEVICE, "ssdp:alive");
        assert_eq!(parse_msearch(&notify), None);

        let no_man = "M-SEARCH * HTTP/1.1\r\nST: ssdp:all\r\n\r\n";
        assert_eq!(parse_msearch(no_man), None);

        assert_eq!(parse_msearch(""), None);
    }

    #[test]
    fn search_targets_match_device() {
        let device = device();
        assert_eq!(device.search_response_targets("ssdp:all").len(), 3);
        assert_eq!(
            device.search_response_targets("upnp:rootdevice"),
            vec![ROOT_DEVICE.to_string()]
        );
        assert_eq!(
            device.search_response_targets("uuid:abc-123"),
            vec!["uuid:abc-123".to_string()]
        );
        assert_eq!(
            device.search_response_targets("urn:Belkin:device:**"),
            vec![WEMO_DEVICE_TYPE.to_string()]
        );
        assert_eq!(
            device.search_response_targets("URN:BELKIN:DEVICE:CONTROLLEE:1"),
            vec![WEMO_DEVICE_TYPE.to_string()]
        );
    }

    #[test]
    fn unrelated_search_targets_are_ignored() {
        let device = device();
        assert!(device
            .search_response_targets("urn:schemas-upnp-org:device:ZonePlayer:1")
            .is_empty());
        assert!(device.search_response_targets("uuid:other").is_empty());
    }

    #[test]
    fn interface_is_taken_from_location_host() {
        assert_eq!(
            interface_from_location("http://192.168.1.20:49153/setup.xml"),
            Ipv4Addr::new(192, 168, 1, 20)
        );
        assert_eq!(
            interface_from_location("http://wemo.local/setup.xml"),
            Ipv4Addr::UNSPECIFIED
        );
    }

    #[tokio::test]
    async fn empty_location_is_rejected() {
        let mut advertiser = DirectMulticast::new("abc");
        assert!(matches!(
            advertiser.advertise("").await,
            Err(AdvertiseError::NoLocation)
        ));
        assert!(!advertiser.is_running());
    }

    #[tokio::test]
    async fn byebye_is_idempotent() {
        let mut advertiser = DirectMulticast::new("abc");
        advertiser.byebye().await.unwrap();

        advertiser
            .advertise("http://127.0.0.1:49153/setup.xml")
            .await
            .unwrap();
        advertiser.byebye().await.unwrap();
        assert!(!advertiser.is_running());
        advertiser.byebye().await.unwrap();
    }
}
