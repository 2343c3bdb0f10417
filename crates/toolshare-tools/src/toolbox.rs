use std::sync::Arc;

use serde_json::Value;
use toolshare_core::{Bus, DurableStore, InstanceId, NotificationGateway, ToolId};

use crate::calendar::CalendarTool;
use crate::context::ToolContext;
use crate::memo::MemoTool;
use crate::progress_map::ProgressMapTool;
use crate::qr::QrTool;
use crate::rewrite::RewriteTool;
use crate::timer::TimerTool;

/// Tools that run entirely locally and never share state.
pub const LOCAL_ONLY_TOOLS: [ToolId; 2] = [ToolId::Ocr, ToolId::Imgconv];

/// Every adapter for one instance, each registered on that instance's bus.
#[derive(Debug)]
pub struct Toolbox {
    pub timer: TimerTool,
    pub memo: MemoTool,
    pub calendar: CalendarTool,
    pub map: ProgressMapTool,
    pub qr: QrTool,
    pub rewrite: RewriteTool,
    instance_id: InstanceId,
}

impl Toolbox {
    pub fn new(bus: Bus, store: Arc<dyn DurableStore>, notifier: Arc<NotificationGateway>) -> Self {
        let instance_id = bus.instance_id();
        for tool in LOCAL_ONLY_TOOLS {
            bus.subscribe(tool, move |action: &str, _: &Value| {
                tracing::trace!(tool = %tool, action, "Tool has no shared state, ignoring");
            });
        }

        let ctx = ToolContext::new(bus, store, notifier);
        let toolbox = Self {
            timer: TimerTool::new(ctx.clone()),
            memo: MemoTool::new(ctx.clone()),
            calendar: CalendarTool::new(ctx.clone()),
            map: ProgressMapTool::new(ctx.clone()),
            qr: QrTool::new(ctx.clone()),
            rewrite: RewriteTool::new(ctx),
            instance_id,
        };
        tracing::debug!(instance = %instance_id, "Toolbox ready");
        toolbox
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use toolshare_core::test_utils::recording_gateway;
    use toolshare_core::{InMemoryStore, Origin};

    #[tokio::test]
    async fn registers_a_handler_for_every_tool() {
        let origin = Origin::default();
        let (bus, _listener) = Bus::connect(&origin);
        let (gateway, _) = recording_gateway();

        let toolbox = Toolbox::new(bus.clone(), Arc::new(InMemoryStore::new()), gateway);

        assert_eq!(toolbox.instance_id(), bus.instance_id());
        for tool in ToolId::iter() {
            assert!(bus.is_subscribed(tool), "{tool} has no handler");
        }
    }
}
