use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::pipeline::payload_encoder::StreamPayload;

/// Returned by a sink whose receiving end has gone away.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("viewer disconnected")]
pub struct ViewerGone;

/// Per-viewer delivery endpoint.
///
/// `deliver` must return immediately: it is called from the streaming
/// worker and a slow viewer must never hold up the others.
pub trait ViewerSink: Send {
    fn deliver(&self, payload: Arc<StreamPayload>) -> Result<(), ViewerGone>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

/// Connected viewers. Attach and detach are safe at any time, including
/// while a broadcast is in progress on the worker thread.
#[derive(Default)]
pub struct ViewerRegistry {
    viewers: Mutex<HashMap<ViewerId, Box<dyn ViewerSink>>>,
    next_id: AtomicU64,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Box<dyn ViewerSink>) -> ViewerId {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.viewers().insert(id, sink);
        log::info!("Viewer {} connected", id.0);
        id
    }

    /// Returns `false` if the viewer was already gone.
    pub fn unregister(&self, id: ViewerId) -> bool {
        let removed = self.viewers().remove(&id).is_some();
        if removed {
            log::info!("Viewer {} disconnected", id.0);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.viewers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers().is_empty()
    }

    /// Fire-and-forget fan-out. Viewers whose sink reports `ViewerGone`
    /// are dropped. Returns how many viewers accepted the payload.
    pub fn broadcast(&self, payload: Arc<StreamPayload>) -> usize {
        let mut viewers = self.viewers();
        let mut delivered = 0;
        viewers.retain(|id, sink| match sink.deliver(Arc::clone(&payload)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(ViewerGone) => {
                log::debug!("Pruning viewer {}", id.0);
                false
            }
        });
        delivered
    }

    fn viewers(&self) -> MutexGuard<'_, HashMap<ViewerId, Box<dyn ViewerSink>>> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process viewer backed by an unbounded crossbeam channel.
pub struct ChannelViewer {
    tx: crossbeam_channel::Sender<Arc<StreamPayload>>,
}

impl ChannelViewer {
    pub fn new() -> (Self, crossbeam_channel::Receiver<Arc<StreamPayload>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ViewerSink for ChannelViewer {
    fn deliver(&self, payload: Arc<StreamPayload>) -> Result<(), ViewerGone> {
        self.tx.send(payload).map_err(|_| ViewerGone)
    }
}
