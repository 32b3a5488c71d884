//! Advertisement through a local minissdpd.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{AdvertiseError, Advertiser, AdvertiserKind};
use crate::minissdp::{DaemonClient, DaemonError, ServiceRecord};
use crate::protocol_constants::{SERVER_PRODUCT, WEMO_DEVICE_TYPE};

/// Registers the device with minissdpd, which then answers searches for it.
///
/// Each `advertise` opens a fresh connection, registers, and closes again.
/// The daemon expires registrations on its own, so `byebye` has nothing to do.
#[derive(Debug, Clone)]
pub struct DaemonRelay {
    socket_path: PathBuf,
    uuid: String,
}

impl DaemonRelay {
    pub fn new(socket_path: impl Into<PathBuf>, uuid: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            uuid: uuid.into(),
        }
    }

    /// USN under which the device is registered.
    pub fn usn(&self) -> String {
        format!("uuid:Socket-1_0-{}::{}", self.uuid, WEMO_DEVICE_TYPE)
    }

    /// Builds the record registered for `location`.
    pub fn record(&self, location: &str) -> ServiceRecord {
        ServiceRecord::new(WEMO_DEVICE_TYPE, self.usn(), SERVER_PRODUCT, location)
    }
}

#[async_trait]
impl Advertiser for DaemonRelay {
    async fn advertise(&mut self, location: &str) -> Result<(), AdvertiseError> {
        if location.is_empty() {
            return Err(AdvertiseError::NoLocation);
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(AdvertiseError::NoSocket);
        }

        let record = self.record(location);
        let path = self.socket_path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), DaemonError> {
            let mut client = DaemonClient::new(path);
            client.connect()?;
            let result = client.register_service(&record);
            client.close();
            result
        })
        .await
        .map_err(|e| AdvertiseError::Task(e.to_string()))??;

        log::info!(
            "[Minissdp] Registered {} with {}",
            location,
            self.socket_path.display()
        );
        Ok(())
    }

    async fn byebye(&mut self) -> Result<(), AdvertiseError> {
        log::debug!("[Minissdp] Leaving registration to expire in the daemon");
        Ok(())
    }

    fn kind(&self) -> AdvertiserKind {
        AdvertiserKind::DaemonRelay
    }
}
