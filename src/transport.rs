//! Messages exchanged with a param server and the publish/subscribe seam the
//! replication client talks through.

use crate::error::ParamError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const PARAM_REQUEST_CHANNEL: &str = "PARAM_REQUEST";
pub const PARAM_UPDATE_CHANNEL: &str = "PARAM_UPDATE";

/// Asks the server to publish a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRequest {
    pub utime: i64,
}

impl ParamRequest {
    pub fn now() -> Self {
        ParamRequest {
            utime: timestamp_now(),
        }
    }
}

/// A full snapshot of the server's tree, rendered as param text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamUpdate {
    pub utime: i64,
    pub server_id: i64,
    pub sequence_number: i64,
    pub params: String,
}

/// Microseconds since the Unix epoch.
pub fn timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback for update messages. It may run on any thread the transport chooses.
pub type UpdateHandler = Arc<dyn Fn(&ParamUpdate) + Send + Sync>;

pub trait Transport: Send + Sync {
    fn publish_request(&self, channel: &str, request: &ParamRequest) -> Result<(), ParamError>;

    fn subscribe(&self, channel: &str, handler: UpdateHandler) -> Result<SubscriptionId, ParamError>;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Called by [`MemoryTransport`] for every published request.
pub type RequestResponder = Arc<dyn Fn(&MemoryTransport, &str, &ParamRequest) + Send + Sync>;

/// In-process transport. Deliveries run the subscribed handlers on the
/// calling thread.
#[derive(Default)]
pub struct MemoryTransport {
    next_id: AtomicU64,
    requests: AtomicUsize,
    subscriptions: Mutex<Vec<(SubscriptionId, String, UpdateHandler)>>,
    responder: Mutex<Option<RequestResponder>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the callback that answers published requests, typically by
    /// calling [`MemoryTransport::deliver`] with a snapshot.
    pub fn set_responder(&self, responder: RequestResponder) {
        *self.responder.lock() = Some(responder);
    }

    /// Hands `update` to every handler subscribed to `channel`.
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, channel: &str, update: &ParamUpdate) -> usize {
        let handlers: Vec<UpdateHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(_, ch, _)| ch == channel)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(update);
        }
        handlers.len()
    }

    pub fn requests_published(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl Transport for MemoryTransport {
    fn publish_request(&self, channel: &str, request: &ParamRequest) -> Result<(), ParamError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let responder = self.responder.lock().clone();
        if let Some(responder) = responder {
            responder(self, channel, request);
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str, handler: UpdateHandler) -> Result<SubscriptionId, ParamError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions
            .lock()
            .push((id, channel.to_string(), handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.lock().retain(|(sub, _, _)| *sub != id);
    }
}
