//! Same-origin publish/subscribe between application instances.
//!
//! An [`Origin`] is the shared channel every instance attaches to. Attaching
//! yields a [`Bus`] handle for publishing and registering handlers, and a
//! [`BusListener`] that owns the receive side and dispatches incoming
//! messages to the instance's [`HandlerRegistry`].
//!
//! Delivery is best effort: at most once, FIFO per sender, never echoed back
//! to the sender, and silently dropped when no handler is registered.

mod metrics;
pub mod registry;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::message::{Message, ToolId};

pub use metrics::{BusMetrics, BusMetricsSnapshot};
pub use registry::{Handler, HandlerRegistry};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Identifies one attached instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wire value tagged with the instance that posted it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: InstanceId,
    pub body: Arc<Value>,
}

/// The channel shared by every instance of the application.
#[derive(Clone)]
pub struct Origin {
    tx: broadcast::Sender<Envelope>,
}

impl Origin {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Post an already-encoded wire value. Returns how many listeners were
    /// attached when it was sent, the sender's own listener included.
    pub fn post_raw(&self, sender: InstanceId, body: Value) -> usize {
        self.tx
            .send(Envelope {
                sender,
                body: Arc::new(body),
            })
            .unwrap_or(0)
    }

    /// Number of listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// What happened to one received envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered(ToolId),
    Unregistered(ToolId),
    Malformed,
    /// Posted by this instance; never dispatched locally.
    OwnMessage,
}

struct Shared {
    instance_id: InstanceId,
    registry: Mutex<HandlerRegistry>,
    metrics: BusMetrics,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, HandlerRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, envelope: &Envelope) -> Delivery {
        if envelope.sender == self.instance_id {
            return Delivery::OwnMessage;
        }

        let message = match Message::from_wire(&envelope.body) {
            Ok(message) => message,
            Err(err) => {
                self.metrics.inc_malformed();
                tracing::debug!(
                    instance = %self.instance_id,
                    sender = %envelope.sender,
                    error = %err,
                    "Dropping malformed message"
                );
                return Delivery::Malformed;
            }
        };

        // Release the registry before calling out so handlers may re-register.
        let handler = self.registry().get(message.tool);
        match handler {
            Some(handler) => {
                handler.handle(&message.action, &message.payload);
                self.metrics.inc_delivered();
                tracing::trace!(
                    instance = %self.instance_id,
                    tool = %message.tool,
                    action = %message.action,
                    "Delivered message"
                );
                Delivery::Delivered(message.tool)
            }
            None => {
                self.metrics.inc_unregistered();
                tracing::trace!(
                    instance = %self.instance_id,
                    tool = %message.tool,
                    "No handler registered, dropping message"
                );
                Delivery::Unregistered(message.tool)
            }
        }
    }
}

/// Publishing and registration handle for one instance. Cheap to clone.
#[derive(Clone)]
pub struct Bus {
    origin: Origin,
    shared: Arc<Shared>,
}

impl Bus {
    /// Attach a new instance to `origin`.
    ///
    /// Messages posted after this call are queued for the returned listener
    /// until it is polled.
    pub fn connect(origin: &Origin) -> (Self, BusListener) {
        let rx = origin.tx.subscribe();
        let shared = Arc::new(Shared {
            instance_id: InstanceId::new(),
            registry: Mutex::new(HandlerRegistry::new()),
            metrics: BusMetrics::default(),
        });

        tracing::debug!(instance = %shared.instance_id, "Attached instance to origin");

        let bus = Self {
            origin: origin.clone(),
            shared: shared.clone(),
        };
        (bus, BusListener { shared, rx })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.shared.instance_id
    }

    /// Broadcast `message` to every other instance. Fire and forget.
    pub fn publish(&self, message: Message) {
        let receivers = self
            .origin
            .post_raw(self.shared.instance_id, message.to_wire());
        self.shared.metrics.inc_published();
        tracing::debug!(
            instance = %self.shared.instance_id,
            tool = %message.tool,
            action = %message.action,
            receivers,
            "Published message"
        );
    }

    /// Register `handler` for `tool`, silently replacing any previous one.
    pub fn subscribe<H>(&self, tool: ToolId, handler: H)
    where
        H: Handler + 'static,
    {
        let replaced = self.shared.registry().insert(tool, Arc::new(handler));
        tracing::debug!(
            instance = %self.shared.instance_id,
            tool = %tool,
            replaced,
            "Registered handler"
        );
    }

    pub fn unsubscribe(&self, tool: ToolId) {
        if self.shared.registry().remove(tool) {
            tracing::debug!(instance = %self.shared.instance_id, tool = %tool, "Removed handler");
        }
    }

    pub fn is_subscribed(&self, tool: ToolId) -> bool {
        self.shared.registry().contains(tool)
    }

    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("instance_id", &self.shared.instance_id)
            .field("registry", &*self.shared.registry())
            .finish()
    }
}

/// Receive side of one instance. Dispatches on whatever task polls it, so an
/// instance that drives its listener from a single task never runs two
/// handlers at once.
pub struct BusListener {
    shared: Arc<Shared>,
    rx: broadcast::Receiver<Envelope>,
}

impl BusListener {
    pub fn instance_id(&self) -> InstanceId {
        self.shared.instance_id
    }

    /// Wait for the next envelope and dispatch it. Returns `None` once every
    /// sender attached to the origin is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(self.shared.dispatch(&envelope)),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => self.record_lag(n),
            }
        }
    }

    /// Dispatch every envelope already queued without waiting for more.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => deliveries.push(self.shared.dispatch(&envelope)),
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => break,
            }
        }
        deliveries
    }

    /// Dispatch until the origin closes.
    pub async fn run(mut self) {
        while self.recv().await.is_some() {}
        tracing::debug!(instance = %self.shared.instance_id, "Bus listener stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn record_lag(&self, skipped: u64) {
        self.shared.metrics.add_lagged(skipped);
        tracing::warn!(
            instance = %self.shared.instance_id,
            lagged = skipped,
            "Bus listener lagged, some messages were dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn own_messages_are_skipped() {
        let origin = Origin::default();
        let (bus, mut listener) = Bus::connect(&origin);
        bus.subscribe(ToolId::Memo, |_: &str, _: &Value| {});

        bus.publish(Message::new(ToolId::Memo, "save", json!({ "text": "a" })));

        assert_eq!(listener.drain(), vec![Delivery::OwnMessage]);
        assert_eq!(bus.metrics().delivered, 0);
    }

    #[test]
    fn publish_without_peers_is_silent() {
        let origin = Origin::new(4);
        let (bus, listener) = Bus::connect(&origin);
        drop(listener);

        bus.publish(Message::new(ToolId::Qr, "gen", json!({ "text": "x" })));
        assert_eq!(bus.metrics().published, 1);
        assert_eq!(origin.listener_count(), 0);
    }

    #[test]
    fn lag_is_counted_and_later_messages_still_arrive() {
        let origin = Origin::new(2);
        let (sender, _sender_listener) = Bus::connect(&origin);
        let (receiver, mut listener) = Bus::connect(&origin);
        receiver.subscribe(ToolId::Timer, |_: &str, _: &Value| {});

        for rem in 0..5 {
            sender.publish(Message::new(ToolId::Timer, "start", json!({ "rem": rem })));
        }

        let deliveries = listener.drain();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(receiver.metrics().lagged, 3);
    }

    #[tokio::test]
    async fn recv_returns_none_after_origin_is_gone() {
        let origin = Origin::new(4);
        let (bus, mut listener) = Bus::connect(&origin);
        drop(bus);
        drop(origin);

        assert_eq!(listener.recv().await, None);
    }
}
