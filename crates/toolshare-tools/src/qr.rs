use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{Value, json};
use toolshare_core::{NotificationOptions, ToolId};

use crate::context::{ToolContext, decode_payload};
use crate::error::{Result, ToolError};

const TOOL: ToolId = ToolId::Qr;

#[derive(Deserialize)]
struct GeneratePayload {
    text: String,
}

/// Shares the text last encoded as a QR code. Rendering is left to the
/// display.
#[derive(Debug)]
pub struct QrTool {
    ctx: ToolContext,
    last: Arc<Mutex<Option<String>>>,
}

impl QrTool {
    pub fn new(ctx: ToolContext) -> Self {
        let last = Arc::new(Mutex::new(None));

        let remote = Arc::clone(&last);
        ctx.bus.subscribe(TOOL, move |action: &str, payload: &Value| {
            apply_remote(&remote, action, payload);
        });

        Self { ctx, last }
    }

    pub fn last_text(&self) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn generate(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ToolError::invalid_input(TOOL, "nothing to encode"));
        }

        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());

        self.ctx.publish(TOOL, "gen", json!({ "text": text }));
        self.ctx
            .announce("QR code generated", NotificationOptions::default())
            .await;
        Ok(())
    }
}

fn apply_remote(last: &Mutex<Option<String>>, action: &str, payload: &Value) {
    if action != "gen" {
        tracing::debug!(action, "Ignoring unknown qr action");
        return;
    }
    if let Some(GeneratePayload { text }) = decode_payload(TOOL, action, payload) {
        *last.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
    }
}
