//! Network addressing for the emulated device.
//!
//! Resolves which IPv4 address is advertised to the network, which address the
//! HTTP listener binds to, and builds the URLs handed to discovery clients.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use crate::protocol_constants::{CONTROL_PATH, EVENT_PATH, SETUP_PATH};

/// Errors that can occur while resolving network addresses.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Local interfaces could not be enumerated.
    #[error("could not get local network addresses: {0}")]
    InterfaceList(String),

    /// The configured interface does not exist or has no addresses.
    #[error("could not get addresses for {0}")]
    InterfaceNotFound(String),

    /// No usable IPv4 address was found.
    #[error("could not discover IPv4 address to advertise{}", interface_suffix(.0))]
    NoIpv4Address(Option<String>),
}

fn interface_suffix(interface: &Option<String>) -> String {
    interface
        .as_ref()
        .map(|name| format!(" on {}", name))
        .unwrap_or_default()
}

/// Trait for finding the local address to advertise.
///
/// Abstracted so tests can run without depending on the host's interfaces.
pub trait IpDetector: Send + Sync {
    /// Returns the first advertisable IPv4 address, optionally restricted to
    /// the interface called `interface`.
    fn detect(&self, interface: Option<&str>) -> Result<Ipv4Addr, NetworkError>;
}

/// Default IP detector using the system's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    /// Creates a new `LocalIpDetector` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self, interface: Option<&str>) -> Result<Ipv4Addr, NetworkError> {
        let addrs = local_ip_address::list_afinet_netifas()
            .map_err(|e| NetworkError::InterfaceList(e.to_string()))?;
        first_advertisable(&addrs, interface)
    }
}

/// Picks the first IPv4 address that is neither loopback nor unspecified.
///
/// With `interface` set, only addresses of that interface are considered.
pub fn first_advertisable(
    addrs: &[(String, IpAddr)],
    interface: Option<&str>,
) -> Result<Ipv4Addr, NetworkError> {
    let mut candidates = addrs
        .iter()
        .filter(|(name, _)| interface.map_or(true, |wanted| name == wanted))
        .peekable();

    if let Some(wanted) = interface {
        if candidates.peek().is_none() {
            return Err(NetworkError::InterfaceNotFound(wanted.to_string()));
        }
    }

    candidates
        .find_map(|(_, addr)| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(*v4),
            _ => None,
        })
        .ok_or_else(|| NetworkError::NoIpv4Address(interface.map(str::to_string)))
}

/// Addresses chosen for one controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddrs {
    /// Address written into the advertised location URL.
    pub advertise: Ipv4Addr,
    /// Address the HTTP listener binds to.
    pub bind: Ipv4Addr,
}

/// Resolves the advertise and bind addresses.
///
/// An explicit (non-unspecified) listen address wins for both. Otherwise the
/// detector supplies the advertise address, and the listener binds to it only
/// when an interface was named; without one it binds to all interfaces.
pub fn resolve_addresses(
    listen: Option<Ipv4Addr>,
    interface: Option<&str>,
    detector: &dyn IpDetector,
) -> Result<ResolvedAddrs, NetworkError> {
    if let Some(ip) = listen.filter(|ip| !ip.is_unspecified()) {
        return Ok(ResolvedAddrs {
            advertise: ip,
            bind: ip,
        });
    }

    let advertise = detector.detect(interface)?;
    let bind = if interface.is_some() {
        advertise
    } else {
        Ipv4Addr::UNSPECIFIED
    };
    Ok(ResolvedAddrs { advertise, bind })
}

/// Normalizes a URI prefix to either `""` or `/segment[/segment...]`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Checks that a normalized prefix can be mounted as literal route segments.
///
/// The router treats `{`/`}` as captures and rejects segments starting with
/// `:` or `*`, so such prefixes are refused here instead of at route setup.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.contains(['{', '}']) {
        return Err(format!("uri prefix {:?} must not contain braces", prefix));
    }
    if let Some(segment) = prefix
        .split('/')
        .find(|s| s.starts_with(':') || s.starts_with('*'))
    {
        return Err(format!(
            "uri prefix segment {:?} must not start with ':' or '*'",
            segment
        ));
    }
    Ok(())
}

/// Builder for the URLs of the emulated device.
pub struct UrlBuilder {
    ip: Ipv4Addr,
    port: u16,
    prefix: String,
}

impl UrlBuilder {
    /// Creates a builder; `prefix` is normalized.
    pub fn new(ip: Ipv4Addr, port: u16, prefix: &str) -> Self {
        Self {
            ip,
            port,
            prefix: normalize_prefix(prefix),
        }
    }

    /// Returns the base URL (e.g., `http://192.168.1.100:49153`).
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// Returns the device description URL, advertised as SSDP `LOCATION`.
    #[must_use]
    pub fn location_url(&self) -> String {
        format!("{}{}{}", self.base_url(), self.prefix, SETUP_PATH)
    }

    /// Returns the absolute control URL.
    #[must_use]
    pub fn control_url(&self) -> String {
        format!("{}{}{}", self.base_url(), self.prefix, CONTROL_PATH)
    }

    /// Returns the absolute event subscription URL.
    #[must_use]
    pub fn event_url(&self) -> String {
        format!("{}{}{}", self.base_url(), self.prefix, EVENT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockIpDetector {
        result: Option<Ipv4Addr>,
    }

    impl IpDetector for MockIpDetector {
        fn detect(&self, interface: Option<&str>) -> Result<Ipv4Addr, NetworkError> {
            self.result
                .ok_or_else(|| NetworkError::NoIpv4Address(interface.map(str::to_string)))
        }
    }

    fn addrs() -> Vec<(String, IpAddr)> {
        vec![
            ("lo".to_string(), IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ("eth0".to_string(), "fe80::1".parse().unwrap()),
            ("eth0".to_string(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
            ("wlan0".to_string(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))),
        ]
    }

    #[test]
    fn first_advertisable_skips_loopback_and_ipv6() {
        assert_eq!(
            first_advertisable(&addrs(), None).unwrap(),
            Ipv4Addr::new(192, 168, 1, 20)
        );
    }

    #[test]
    fn first_advertisable_filters_by_interface() {
        assert_eq!(
            first_advertisable(&addrs(), Some("wlan0")).unwrap(),
            Ipv4Addr::new(10, 0, 0, 7)
        );
    }

    #[test]
    fn unknown_interface_is_reported() {
        assert!(matches!(
            first_advertisable(&addrs(), Some("eth9")),
            Err(NetworkError::InterfaceNotFound(name)) if name == "eth9"
        ));
    }

    #[test]
    fn loopback_only_interface_has_no_address() {
        let err = first_advertisable(&addrs(), Some("lo")).unwrap_err();
        assert!(matches!(err, NetworkError::NoIpv4Address(Some(_))));
        assert_eq!(
            err.to_string(),
            "could not discover IPv4 address to advertise on lo"
        );
    }

    #[test]
    fn explicit_listen_address_overrides_detection() {
        let detector = MockIpDetector { result: None };
        let ip = Ipv4Addr::new(127, 0, 0, 1);
        let resolved = resolve_addresses(Some(ip), None, &detector).unwrap();
        assert_eq!(resolved.advertise, ip);
        assert_eq!(resolved.bind, ip);
    }

    #[test]
    fn unspecified_listen_address_falls_back_to_detection() {
        let detector = MockIpDetector {
            result: Some(Ipv4Addr::new(192, 168, 1, 20)),
        };
        let resolved =
            resolve_addresses(Some(Ipv4Addr::UNSPECIFIED), None, &detector).unwrap();
        assert_eq!(resolved.advertise, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(resolved.bind, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn named_interface_binds_to_its_address() {
        let detector = MockIpDetector {
            result: Some(Ipv4Addr::new(10, 0, 0, 7)),
        };
        let resolved = resolve_addresses(None, Some("wlan0"), &detector).unwrap();
        assert_eq!(resolved.bind, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn detection_failure_propagates() {
        let detector = MockIpDetector { result: None };
        assert!(resolve_addresses(None, None, &detector).is_err());
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("wemo"), "/wemo");
        assert_eq!(normalize_prefix("/wemo/"), "/wemo");
        assert_eq!(normalize_prefix("/a/b"), "/a/b");
    }

    #[test]
    fn prefix_with_route_syntax_is_refused() {
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("/wemo/a:b").is_ok());
        assert!(validate_prefix("/:wemo").is_err());
        assert!(validate_prefix("/a/*rest").is_err());
        assert!(validate_prefix("/{wemo").is_err());
        assert!(validate_prefix("/{x}").is_err());
        assert!(validate_prefix("/wemo}").is_err());
    }

    #[test]
    fn url_builder_generates_correct_urls() {
        let builder = UrlBuilder::new(Ipv4Addr::new(192, 168, 1, 100), 49153, "/porch");
        assert_eq!(builder.base_url(), "http://192.168.1.100:49153");
        assert_eq!(
            builder.location_url(),
            "http://192.168.1.100:49153/porch/setup.xml"
        );
        assert_eq!(
            builder.control_url(),
            "http://192.168.1.100:49153/porch/upnp/control/basicevent1"
        );
        assert_eq!(
            builder.event_url(),
            "http://192.168.1.100:49153/porch/upnp/event/basicevent1"
        );
    }
}
