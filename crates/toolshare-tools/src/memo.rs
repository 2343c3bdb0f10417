use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{Value, json};
use toolshare_core::{DurableStoreExt, NotificationOptions, ToolId};

use crate::context::{ToolContext, decode_payload};
use crate::error::Result;

pub const MEMO_KEY: &str = "memo_text";

const TOOL: ToolId = ToolId::Memo;

#[derive(Deserialize)]
struct SavePayload {
    text: String,
}

/// A single free-form note shared by every instance.
#[derive(Debug)]
pub struct MemoTool {
    ctx: ToolContext,
    text: Arc<Mutex<String>>,
}

impl MemoTool {
    pub fn new(ctx: ToolContext) -> Self {
        let text = Arc::new(Mutex::new(ctx.load_or_default::<String>(TOOL, MEMO_KEY)));

        let remote = Arc::clone(&text);
        ctx.bus.subscribe(TOOL, move |action: &str, payload: &Value| {
            apply_remote(&remote, action, payload);
        });

        Self { ctx, text }
    }

    pub fn text(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn save(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.ctx.store.write_as(MEMO_KEY, &text)?;
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text.clone();

        self.ctx.publish(TOOL, "save", json!({ "text": text }));
        self.ctx
            .announce("Memo saved", NotificationOptions::default())
            .await;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.ctx.store.delete(MEMO_KEY)?;
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.ctx.publish(TOOL, "clear", json!({}));
        self.ctx
            .announce("Memo cleared", NotificationOptions::default())
            .await;
        Ok(())
    }
}

fn apply_remote(text: &Mutex<String>, action: &str, payload: &Value) {
    match action {
        "save" => {
            if let Some(SavePayload { text: remote }) = decode_payload(TOOL, action, payload) {
                *text.lock().unwrap_or_else(PoisonError::into_inner) = remote;
            }
        }
        "clear" => text.lock().unwrap_or_else(PoisonError::into_inner).clear(),
        other => tracing::debug!(action = other, "Ignoring unknown memo action"),
    }
}
