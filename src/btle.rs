use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use btleplug::api::{Central, CharPropFlags, Characteristic, Manager as _, Peripheral, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral};

use crate::error::TransportError;
use crate::pmd::{PMD_CONTROL_UUID, PMD_DATA_UUID};
use crate::transport::{DeviceHandle, NotificationStream, PmdTransport};


struct Link {
    peripheral: PlatformPeripheral,
    control: Characteristic,
    data: Characteristic,
}

/// [`PmdTransport`] backed by the platform BLE stack through btleplug.
pub struct BtleplugTransport {
    adapter: Adapter,
    // peripherals seen by the last scan, may no longer be reachable
    seen: Vec<PlatformPeripheral>,
    link: Option<Link>,
}

impl BtleplugTransport {
    /// Opens the first Bluetooth adapter of the system.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter_list = manager.adapters().await?;

        for adapter in adapter_list.iter() {
            let info = adapter.adapter_info().await.unwrap_or("No name adapter".to_string());
            debug!(adapter = %info, "found adapter");
        }

        // TODO: let the caller pick the adapter when more than one is present
        let adapter = adapter_list.into_iter().next().ok_or(TransportError::NoAdapter)?;

        Ok(BtleplugTransport {
            adapter,
            seen: vec![],
            link: None,
        })
    }

    fn link(&self) -> Result<&Link, TransportError> {
        self.link.as_ref().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl PmdTransport for BtleplugTransport {
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceHandle>, TransportError> {
        info!(?timeout, "scanning for BLE peripherals");
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(timeout).await;
        if let Err(err) = self.adapter.stop_scan().await {
            warn!(%err, "failed to stop scan");
        }

        self.seen = self.adapter.peripherals().await?;

        let mut devices = vec![];
        for peripheral in self.seen.iter() {
            let Some(name) = get_peripheral_name(peripheral).await else { continue; };
            debug!(%name, id = %peripheral.id(), "discovered peripheral");
            devices.push(DeviceHandle {
                id: peripheral.id().to_string(),
                name,
            });
        }

        Ok(devices)
    }

    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        let peripheral = match find_by_id(&self.seen, &device.id, peripheral_id) {
            Some(peripheral) => peripheral.clone(),
            None => {
                // handle from an earlier session, ask the adapter directly
                let known = self.adapter.peripherals().await?;
                find_by_id(&known, &device.id, peripheral_id)
                    .cloned()
                    .ok_or_else(|| TransportError::UnknownDevice(device.id.clone()))?
            }
        };

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }

        let (control, data) = match pmd_characteristics(&peripheral).await {
            Ok(chars) => chars,
            Err(err) => {
                if let Err(close_err) = peripheral.disconnect().await {
                    warn!(%close_err, "failed to close half-open link");
                }
                return Err(err);
            }
        };

        self.link = Some(Link {
            peripheral,
            control,
            data,
        });
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<NotificationStream, TransportError> {
        let link = self.link()?;
        debug!(uuid = %link.data.uuid, "subscribing to characteristic");
        link.peripheral.subscribe(&link.data).await?;

        let notifications = link.peripheral.notifications().await?;
        let stream = notifications
            .filter(|n| futures::future::ready(n.uuid == PMD_DATA_UUID))
            .map(|n| n.value);
        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        let link = self.link()?;
        link.peripheral.unsubscribe(&link.data).await?;
        Ok(())
    }

    async fn write_control(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let link = self.link()?;
        link.peripheral
            .write(&link.control, frame, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(link) = self.link.take() else { return Ok(()); };
        if link.peripheral.is_connected().await? {
            link.peripheral.disconnect().await?;
        }
        Ok(())
    }
}


fn peripheral_id(peripheral: &PlatformPeripheral) -> String {
    peripheral.id().to_string()
}

fn find_by_id<'a, P>(candidates: &'a [P], id: &str, id_of: impl Fn(&P) -> String) -> Option<&'a P> {
    candidates.iter().find(|candidate| id_of(candidate) == id)
}

async fn pmd_characteristics(
    peripheral: &PlatformPeripheral,
) -> Result<(Characteristic, Characteristic), TransportError> {
    debug!(id = %peripheral.id(), "discovering services");
    peripheral.discover_services().await?;
    select_pmd_characteristics(&peripheral.characteristics())
}

/// Control point and notifying data characteristic of the PMD service.
fn select_pmd_characteristics(
    chars: &BTreeSet<Characteristic>,
) -> Result<(Characteristic, Characteristic), TransportError> {
    let control = chars
        .iter()
        .find(|c| c.uuid == PMD_CONTROL_UUID)
        .cloned()
        .ok_or(TransportError::MissingCharacteristic(PMD_CONTROL_UUID))?;
    let data = chars
        .iter()
        .find(|c| c.uuid == PMD_DATA_UUID && c.properties.contains(CharPropFlags::NOTIFY))
        .cloned()
        .ok_or(TransportError::MissingCharacteristic(PMD_DATA_UUID))?;
    Ok((control, data))
}

async fn get_peripheral_name(peripheral: &PlatformPeripheral) -> Option<String> {
    let Ok(Some(properties)) = peripheral.properties().await else { return None; };

    properties.local_name
}
