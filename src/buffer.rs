use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;


/// Notification bytes shared between the notification pump and the caller.
#[derive(Debug, Clone, Default)]
pub struct NotificationBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl NotificationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        self.inner.lock().extend_from_slice(chunk);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Takes everything accumulated so far and leaves the buffer empty.
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type NotificationSink = Box<dyn FnMut(&[u8]) + Send>;

#[derive(Default)]
struct SlotState {
    sink: Option<NotificationSink>,
    generation: u64,
}

/// Holds the caller's sink. The sink is taken out while it runs, so replacing
/// it never waits for a call in progress.
#[derive(Clone, Default)]
pub(crate) struct SinkSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl SinkSlot {
    pub(crate) fn set(&self, sink: Option<NotificationSink>) {
        let mut state = self.inner.lock();
        state.sink = sink;
        state.generation += 1;
    }

    /// Calls the current sink, if any, with the slot unlocked.
    pub(crate) fn deliver(&self, chunk: &[u8]) {
        let (mut sink, generation) = {
            let mut state = self.inner.lock();
            let Some(sink) = state.sink.take() else { return; };
            (sink, state.generation)
        };

        sink(chunk);

        // replaced or cleared meanwhile: the old sink is dropped
        let mut state = self.inner.lock();
        if state.generation == generation {
            state.sink = Some(sink);
        }
    }
}

/// Routes each notification chunk into the buffer, then on to the sink thread.
pub(crate) struct NotificationRouter {
    buffer: NotificationBuffer,
    sink_tx: UnboundedSender<Vec<u8>>,
}

impl NotificationRouter {
    pub(crate) fn new(buffer: NotificationBuffer, sink_tx: UnboundedSender<Vec<u8>>) -> Self {
        NotificationRouter { buffer, sink_tx }
    }

    pub(crate) fn route(&self, chunk: Vec<u8>) {
        trace!(len = chunk.len(), "notification");
        self.buffer.append(&chunk);
        // sink task already gone means nobody listens anymore
        let _ = self.sink_tx.send(chunk);
    }
}
