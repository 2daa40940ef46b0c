use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc::{self, Sender as TokioSender, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{NotificationBuffer, NotificationRouter, NotificationSink, SinkSlot};
use crate::config::SessionConfig;
use crate::error::PmdError;
use crate::signal::SessionSignal;
use crate::transport::{find_by_name, DeviceHandle, NotificationStream, PmdTransport};


/// The task pumping PMD notifications into the buffer.
pub(crate) struct PumpHandle {
    cancel: CancellationToken,
    // each request is acked once every chunk already delivered is buffered
    flush: UnboundedSender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// A single Polar H10 session over some [`PmdTransport`].
///
/// Owns discovery, the connection lifecycle and the notification buffer.
/// The PMD commands live in [`crate::control`].
pub struct PolarH10<T: PmdTransport> {
    pub(crate) transport: T,
    pub(crate) config: SessionConfig,
    pub(crate) device: Option<DeviceHandle>,
    pub(crate) pump: Option<PumpHandle>,
    pub(crate) recording: bool,
    pub(crate) buffer: NotificationBuffer,
    sink: SinkSlot,
    observer: Option<TokioSender<SessionSignal>>,
}

impl<T: PmdTransport> PolarH10<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        PolarH10 {
            transport,
            config,
            device: None,
            pump: None,
            recording: false,
            buffer: NotificationBuffer::new(),
            sink: SinkSlot::default(),
            observer: None,
        }
    }

    /// Pushes [`SessionSignal`]s to `observer`. Signals are dropped when the
    /// channel is full.
    pub fn with_observer(mut self, observer: TokioSender<SessionSignal>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Uses `device` instead of scanning on the next [`PolarH10::connect`].
    pub fn with_device(mut self, device: DeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    /// Registers a callback receiving every notification chunk in arrival order.
    ///
    /// The callback runs on a blocking thread of its own, a slow callback
    /// delays only itself. Replacing it does not wait for a running call.
    pub fn set_notification_sink<F>(&mut self, sink: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let sink: NotificationSink = Box::new(sink);
        self.sink.set(Some(sink));
    }

    pub fn clear_notification_sink(&mut self) {
        self.sink.set(None);
    }

    pub fn device(&self) -> Option<&DeviceHandle> {
        self.device.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.pump.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Bytes accumulated since the last start or drain. Chunks the pump has
    /// not routed yet are not counted.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Waits until every notification the transport has already delivered
    /// is in the buffer.
    pub(crate) async fn flush_notifications(&mut self) {
        let Some(pump) = &self.pump else { return; };
        let (ack_tx, ack_rx) = oneshot::channel();
        if pump.flush.send(ack_tx).is_err() {
            return;
        }
        // a dropped ack means the pump ended, nothing more can arrive
        let _ = ack_rx.await;
    }

    pub(crate) fn signal(&self, signal: SessionSignal) {
        let Some(observer) = &self.observer else { return; };
        if let Err(err) = observer.try_send(signal) {
            debug!(%err, "observer did not take signal");
        }
    }

    pub(crate) fn warn_observer(&self, message: String) {
        warn!("{message}");
        self.signal(SessionSignal::Warning(message));
    }

    /// Scans and returns the first device whose advertised name contains
    /// `pattern`. The device is remembered for [`PolarH10::connect`].
    pub async fn discover(&mut self, pattern: &str) -> Result<DeviceHandle, PmdError> {
        info!(pattern, timeout = ?self.config.scan_timeout, "scanning for device");
        let devices = self
            .transport
            .scan(self.config.scan_timeout)
            .await
            .map_err(PmdError::Scan)?;

        let Some(device) = find_by_name(&devices, pattern).cloned() else {
            warn!(pattern, seen = devices.len(), "no matching device found");
            return Err(PmdError::DiscoveryNotFound {
                pattern: pattern.to_string(),
            });
        };

        info!(name = %device.name, id = %device.id, "found device");
        self.signal(SessionSignal::DeviceFound(device.name.clone()));
        self.device = Some(device.clone());
        Ok(device)
    }

    /// Connects and enables PMD data notifications, scanning first when no
    /// device is known yet.
    pub async fn connect(&mut self) -> Result<(), PmdError> {
        if self.pump.is_some() {
            warn!("connect requested while already connected");
            return Ok(());
        }

        let device = match self.device.clone() {
            Some(device) => device,
            None => {
                let pattern = self.config.name_pattern.clone();
                self.discover(&pattern).await?
            }
        };

        info!(name = %device.name, "connecting");
        if let Err(err) = self.transport.connect(&device).await {
            error!(%err, name = %device.name, "error connecting to device");
            self.teardown_transport().await;
            return Err(PmdError::ConnectionFailure(err));
        }

        let stream = match self.transport.subscribe().await {
            Ok(stream) => stream,
            Err(err) => {
                error!(%err, "error enabling PMD data notifications");
                self.teardown_transport().await;
                return Err(PmdError::ConnectionFailure(err));
            }
        };

        self.pump = Some(self.spawn_pump(stream));
        info!(name = %device.name, "connected, PMD data notifications enabled");
        self.signal(SessionSignal::Connected(device.name));
        Ok(())
    }

    /// Closes the link. Safe to call at any time, failures are only logged.
    pub async fn disconnect(&mut self) {
        if self.pump.is_none() {
            debug!("disconnect requested while not connected");
            return;
        }

        self.flush_notifications().await;
        let Some(pump) = self.pump.take() else { return; };

        if let Err(err) = self.transport.unsubscribe().await {
            self.warn_observer(format!("error disabling notifications: {err}"));
        }
        if let Err(err) = self.transport.disconnect().await {
            self.warn_observer(format!("error during disconnect: {err}"));
        }

        pump.cancel.cancel();
        if let Err(err) = pump.task.await {
            warn!(%err, "notification task ended abnormally");
        }

        self.recording = false;
        info!("disconnected");
        self.signal(SessionSignal::Disconnected);
    }

    async fn teardown_transport(&mut self) {
        if let Err(err) = self.transport.disconnect().await {
            warn!(%err, "error tearing down partial connection");
        }
    }

    fn spawn_pump(&self, mut stream: NotificationStream) -> PumpHandle {
        let cancel = CancellationToken::new();
        let (flush, mut flush_rx) = mpsc::unbounded_channel::<oneshot::Sender<()>>();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let router = NotificationRouter::new(self.buffer.clone(), sink_tx);

        let pump_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => break,
                    Some(ack) = flush_rx.recv() => {
                        let ended = route_ready(&mut stream, &router);
                        let _ = ack.send(());
                        if ended {
                            debug!("notification stream ended");
                            break;
                        }
                    }
                    next = stream.next() => match next {
                        Some(chunk) => router.route(chunk),
                        None => {
                            debug!("notification stream ended");
                            break;
                        }
                    },
                }
            }
        });

        // ends once the router is dropped and every queued chunk is delivered
        let sink = self.sink.clone();
        tokio::task::spawn_blocking(move || {
            while let Some(chunk) = sink_rx.blocking_recv() {
                sink.deliver(&chunk);
            }
        });

        PumpHandle { cancel, flush, task }
    }
}

impl<T: PmdTransport> Drop for PolarH10<T> {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.cancel.cancel();
        }
    }
}

/// Routes every chunk that is ready without waiting. True when the stream ended.
fn route_ready(stream: &mut NotificationStream, router: &NotificationRouter) -> bool {
    loop {
        match stream.next().now_or_never() {
            Some(Some(chunk)) => router.route(chunk),
            Some(None) => return true,
            None => return false,
        }
    }
}
