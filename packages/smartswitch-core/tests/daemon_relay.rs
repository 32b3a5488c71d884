//! Daemon relay against a fake minissdpd on a Unix socket.

use std::io::Read;
use std::net::Ipv4Addr;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use smartswitch_core::minissdp::wire::{decode_string, encode_string};
use smartswitch_core::minissdp::client::REQUEST_REGISTER;
use smartswitch_core::{
    AdvertiserKind, Controller, ControllerError, DaemonClient, MemorySwitch,
};

/// Accepts one connection and returns everything the client wrote.
fn fake_daemon(dir: &tempfile::TempDir) -> (PathBuf, thread::JoinHandle<Vec<u8>>) {
    let path = dir.path().join("minissdpd.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        stream.read_to_end(&mut request).unwrap();
        request
    });
    (path, handle)
}

#[tokio::test]
async fn controller_registers_with_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let (path, daemon) = fake_daemon(&dir);

    let mut controller = Controller::builder()
        .name("garage")
        .uuid("1234-abcd")
        .switch(Arc::new(MemorySwitch::new(false)))
        .listen_address(Ipv4Addr::LOCALHOST)
        .minissdp_socket(&path)
        .build();

    let location = controller.start().await.unwrap();

    // The relay closes its connection after registering, ending read_to_end.
    let request = daemon.join().unwrap();
    assert_eq!(request[0], REQUEST_REGISTER);

    let mut rest = &request[1..];
    assert_eq!(
        decode_string(&mut rest).unwrap(),
        "urn:Belkin:device:controllee:1"
    );
    assert_eq!(
        decode_string(&mut rest).unwrap(),
        "uuid:Socket-1_0-1234-abcd::urn:Belkin:device:controllee:1"
    );
    assert!(!decode_string(&mut rest).unwrap().is_empty());
    assert_eq!(decode_string(&mut rest).unwrap(), location);
    assert!(rest.is_empty());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn missing_daemon_fails_start_and_releases_listener() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = Controller::builder()
        .switch(Arc::new(MemorySwitch::new(false)))
        .listen_address(Ipv4Addr::LOCALHOST)
        .minissdp_socket(dir.path().join("absent.sock"))
        .build();

    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, ControllerError::Advertise(_)));
    assert!(controller.local_addr().is_none());
}

#[test]
fn client_reads_daemon_ordered_records() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minissdpd.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let daemon = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 3];
        stream.read_exact(&mut request).unwrap();

        let mut response = vec![2u8];
        for s in [
            "http://10.0.0.2:49153/setup.xml",
            "urn:Belkin:device:controllee:1",
            "uuid:Socket-1_0-a::urn:Belkin:device:controllee:1",
            "http://10.0.0.3:80/rootDesc.xml",
            "upnp:rootdevice",
            "uuid:router::upnp:rootdevice",
        ] {
            encode_string(s, &mut response).unwrap();
        }
        stream.write_all(&response).unwrap();
    });

    let mut client = DaemonClient::new(&path);
    client.connect().unwrap();
    let records = client.query_all().unwrap();
    client.close();
    daemon.join().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].location(), "http://10.0.0.2:49153/setup.xml");
    assert_eq!(records[0].service_type(), "urn:Belkin:device:controllee:1");
    assert_eq!(records[1].usn(), "uuid:router::upnp:rootdevice");
    assert!(records.iter().all(|r| r.server().is_empty()));
}

#[test]
fn socket_configuration_selects_relay() {
    let controller = Controller::builder()
        .minissdp_socket("/var/run/minissdpd.sock")
        .build();
    assert!(controller.config().minissdp_socket.is_some());
    assert_eq!(
        smartswitch_core::advertise::for_config(controller.config()).kind(),
        AdvertiserKind::DaemonRelay
    );
}
