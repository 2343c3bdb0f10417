use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use strum::{EnumCount, IntoEnumIterator};

use crate::message::ToolId;

/// Callback that applies a remotely published change to local state.
pub trait Handler: Send + Sync {
    fn handle(&self, action: &str, payload: &Value);
}

impl<F> Handler for F
where
    F: Fn(&str, &Value) + Send + Sync,
{
    fn handle(&self, action: &str, payload: &Value) {
        self(action, payload);
    }
}

/// One handler slot per [`ToolId`]. The table is sized by the enum, so every
/// tool always has a slot even when nothing is registered in it.
pub struct HandlerRegistry {
    slots: [Option<Arc<dyn Handler>>; ToolId::COUNT],
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Register `handler` for `tool`, returning true when it replaced another.
    pub fn insert(&mut self, tool: ToolId, handler: Arc<dyn Handler>) -> bool {
        self.slots[tool.slot()].replace(handler).is_some()
    }

    /// Clear the slot for `tool`. Returns false when it was already empty.
    pub fn remove(&mut self, tool: ToolId) -> bool {
        self.slots[tool.slot()].take().is_some()
    }

    pub fn get(&self, tool: ToolId) -> Option<Arc<dyn Handler>> {
        self.slots[tool.slot()].clone()
    }

    pub fn contains(&self, tool: ToolId) -> bool {
        self.slots[tool.slot()].is_some()
    }

    pub fn registered(&self) -> Vec<ToolId> {
        ToolId::iter().filter(|tool| self.contains(*tool)).collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Handler>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let handler: Arc<dyn Handler> = Arc::new(move |action: &str, _: &Value| {
            sink.lock().unwrap().push(action.to_string());
        });
        (calls, handler)
    }

    #[test]
    fn lookup_hits_only_the_matching_slot() {
        let mut registry = HandlerRegistry::new();
        let (memo_calls, memo) = recorder();
        let (timer_calls, timer) = recorder();
        registry.insert(ToolId::Memo, memo);
        registry.insert(ToolId::Timer, timer);

        registry.get(ToolId::Memo).unwrap().handle("save", &json!({}));

        assert_eq!(*memo_calls.lock().unwrap(), vec!["save"]);
        assert!(timer_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn insert_replaces_existing_handler() {
        let mut registry = HandlerRegistry::new();
        let (first_calls, first) = recorder();
        let (second_calls, second) = recorder();

        assert!(!registry.insert(ToolId::Qr, first));
        assert!(registry.insert(ToolId::Qr, second));
        registry
            .get(ToolId::Qr)
            .unwrap()
            .handle("gen", &json!({ "text": "x" }));

        assert!(first_calls.lock().unwrap().is_empty());
        assert_eq!(*second_calls.lock().unwrap(), vec!["gen"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = HandlerRegistry::new();
        let (_, handler) = recorder();
        registry.insert(ToolId::Calendar, handler);

        assert!(registry.remove(ToolId::Calendar));
        assert!(!registry.remove(ToolId::Calendar));
        assert!(registry.get(ToolId::Calendar).is_none());
    }

    #[test]
    fn registered_lists_tools_in_declaration_order() {
        let mut registry = HandlerRegistry::new();
        let (_, a) = recorder();
        let (_, b) = recorder();
        registry.insert(ToolId::Calendar, a);
        registry.insert(ToolId::Timer, b);

        assert_eq!(registry.registered(), vec![ToolId::Timer, ToolId::Calendar]);
    }
}
