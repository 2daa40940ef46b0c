use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::error::TransportError;


/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Platform identifier (MAC address on Linux, UUID on macOS / Windows).
    pub id: String,
    pub name: String,
}

/// Raw PMD data notifications in arrival order.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// The GATT operations a PMD session needs from a BLE stack.
///
/// A transport serves one connected peripheral at a time.
#[async_trait]
pub trait PmdTransport: Send {
    /// Scans for `timeout` and returns every named device seen.
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceHandle>, TransportError>;

    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError>;

    /// Enables notifications on the PMD data characteristic.
    async fn subscribe(&mut self) -> Result<NotificationStream, TransportError>;

    async fn unsubscribe(&mut self) -> Result<(), TransportError>;

    /// Writes `frame` to the PMD control point, waiting for the write response.
    async fn write_control(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// First device whose advertised name contains `pattern`. Case sensitive.
pub fn find_by_name<'a>(devices: &'a [DeviceHandle], pattern: &str) -> Option<&'a DeviceHandle> {
    devices.iter().find(|device| device.name.contains(pattern))
}
