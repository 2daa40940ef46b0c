use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::TransportError;
use crate::pmd::ControlCommand;
use crate::transport::{DeviceHandle, NotificationStream, PmdTransport};


pub const FAKE_DEVICE_NAME: &str = "Polar H10 ABCD1234";

#[derive(Debug, Default)]
struct FakeState {
    devices: Vec<DeviceHandle>,
    connected: Option<DeviceHandle>,
    notify_tx: Option<UnboundedSender<Vec<u8>>>,
    writes: Vec<Vec<u8>>,
    scan_calls: usize,
    connect_calls: usize,
    unsubscribe_calls: usize,
    disconnect_calls: usize,
    fail_connect: bool,
    fail_subscribe: bool,
    fail_write: bool,
    fail_unsubscribe: bool,
    fail_disconnect: bool,
}

#[derive(Debug, Clone, Copy)]
struct Generator {
    interval: Duration,
    chunk_len: usize,
}

/// In-memory [`PmdTransport`] with no radio behind it.
///
/// Notifications are injected through a [`FakeController`], or produced as
/// random payloads after a start command when built with
/// [`FakeTransport::with_generated_data`].
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    generator: Option<Generator>,
    streaming: Option<JoinHandle<()>>,
}

impl FakeTransport {
    pub fn new(devices: Vec<DeviceHandle>) -> Self {
        FakeTransport {
            state: Arc::new(Mutex::new(FakeState {
                devices,
                ..FakeState::default()
            })),
            generator: None,
            streaming: None,
        }
    }

    /// A transport advertising a single Polar H10.
    pub fn polar_h10() -> Self {
        Self::new(vec![DeviceHandle {
            id: "A0:9E:1A:00:00:01".to_string(),
            name: FAKE_DEVICE_NAME.to_string(),
        }])
    }

    pub fn with_generated_data(mut self, interval: Duration, chunk_len: usize) -> Self {
        self.generator = Some(Generator { interval, chunk_len });
        self
    }

    pub fn controller(&self) -> FakeController {
        FakeController {
            state: Arc::clone(&self.state),
        }
    }

    fn stop_streaming(&mut self) {
        if let Some(task) = self.streaming.take() {
            task.abort();
        }
    }

    fn start_streaming(&mut self, measurement: u8) {
        let Some(generator) = self.generator else { return; };
        let Some(tx) = self.state.lock().notify_tx.clone() else { return; };

        self.stop_streaming();
        self.streaming = Some(tokio::spawn(async move {
            loop {
                let chunk = random_chunk(measurement, generator.chunk_len);
                if tx.send(chunk).is_err() {
                    break;
                }
                tokio::time::sleep(generator.interval).await;
            }
        }));
    }
}

impl Drop for FakeTransport {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

fn random_chunk(measurement: u8, len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut chunk = Vec::with_capacity(len.max(1));
    chunk.push(measurement);
    chunk.extend((1..len).map(|_| rng.gen::<u8>()));
    chunk
}

fn simulated(what: &str) -> TransportError {
    TransportError::Simulated(what.to_string())
}

#[async_trait]
impl PmdTransport for FakeTransport {
    async fn scan(&mut self, _timeout: Duration) -> Result<Vec<DeviceHandle>, TransportError> {
        let mut state = self.state.lock();
        state.scan_calls += 1;
        Ok(state.devices.clone())
    }

    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        if state.fail_connect {
            return Err(simulated("connect refused"));
        }
        if !state.devices.iter().any(|d| d.id == device.id) {
            return Err(TransportError::UnknownDevice(device.id.clone()));
        }
        state.connected = Some(device.clone());
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<NotificationStream, TransportError> {
        let mut state = self.state.lock();
        if state.connected.is_none() {
            return Err(TransportError::NotConnected);
        }
        if state.fail_subscribe {
            return Err(simulated("subscribe refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.notify_tx = Some(tx);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.stop_streaming();
        let mut state = self.state.lock();
        state.unsubscribe_calls += 1;
        if state.fail_unsubscribe {
            return Err(simulated("unsubscribe refused"));
        }
        state.notify_tx = None;
        Ok(())
    }

    async fn write_control(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.connected.is_none() {
                return Err(TransportError::NotConnected);
            }
            if state.fail_write {
                return Err(simulated("write refused"));
            }
            state.writes.push(frame.to_vec());
        }
        debug!(?frame, "fake control point write");

        match frame {
            [command, measurement] if *command == ControlCommand::Start.as_byte() => {
                self.start_streaming(*measurement)
            }
            [command, _] if *command == ControlCommand::Stop.as_byte() => self.stop_streaming(),
            _ => {}
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.stop_streaming();
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.notify_tx = None;
        if state.fail_disconnect {
            return Err(simulated("disconnect refused"));
        }
        state.connected = None;
        Ok(())
    }
}

/// Test-side view of a [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct FakeController {
    state: Arc<Mutex<FakeState>>,
}

impl FakeController {
    /// Delivers a notification chunk. Returns false when nobody is subscribed.
    pub fn notify(&self, chunk: &[u8]) -> bool {
        match &self.state.lock().notify_tx {
            Some(tx) => tx.send(chunk.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Every frame written to the control point, oldest first.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().notify_tx.is_some()
    }

    pub fn scan_calls(&self) -> usize {
        self.state.lock().scan_calls
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state.lock().unsubscribe_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.state.lock().fail_subscribe = fail;
    }

    pub fn fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.state.lock().fail_unsubscribe = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.state.lock().fail_disconnect = fail;
    }
}
