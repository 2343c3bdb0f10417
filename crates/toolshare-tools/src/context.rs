use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use toolshare_core::{
    Bus, DurableStore, DurableStoreExt, Message, NotificationGateway, NotificationOptions, ToolId,
};

/// Everything an adapter needs from its instance: the bus it publishes on,
/// the shared store and the process-wide notification gateway.
#[derive(Clone)]
pub struct ToolContext {
    pub bus: Bus,
    pub store: Arc<dyn DurableStore>,
    pub notifier: Arc<NotificationGateway>,
}

impl ToolContext {
    pub fn new(bus: Bus, store: Arc<dyn DurableStore>, notifier: Arc<NotificationGateway>) -> Self {
        Self {
            bus,
            store,
            notifier,
        }
    }

    /// Read `key`, falling back to the default when it is missing or has a
    /// shape this version does not understand.
    pub(crate) fn load_or_default<T>(&self, tool: ToolId, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.store.read_as::<T>(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(tool = %tool, key, "Discarding unreadable stored state: {e}");
                T::default()
            }
        }
    }

    pub(crate) fn publish(&self, tool: ToolId, action: &str, payload: Value) {
        self.bus.publish(Message::new(tool, action, payload));
    }

    pub(crate) async fn announce(&self, title: &str, options: NotificationOptions) {
        self.notifier.notify(title, options).await;
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("instance_id", &self.bus.instance_id())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Decode a remote payload, logging and returning `None` when it does not fit.
pub(crate) fn decode_payload<T: DeserializeOwned>(
    tool: ToolId,
    action: &str,
    payload: &Value,
) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(tool = %tool, action, "Ignoring remote message with bad payload: {e}");
            None
        }
    }
}
