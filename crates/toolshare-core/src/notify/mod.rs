//! Permission-gated user notifications.
//!
//! Permission moves `default -> granted | denied` at most once; both end
//! states are final. Only one permission prompt is ever in flight: callers
//! that arrive while it is pending wait for it and reuse its outcome.
//! `notify` never fails, it resolves to whether something was shown.

mod prompt;
mod transport;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::{Mutex, watch};

pub use prompt::{PermissionPrompt, PromptRequest, StaticPrompt, TerminalPrompt, parse_answer};
pub use transport::{
    DesktopTransport, DisabledTransport, LogTransport, NotificationTransport, Osc9Transport,
    RecordingTransport, ShownNotification, TransportError, TransportKind, transport_for,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Default,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_final(self) -> bool {
        !matches!(self, PermissionState::Default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    pub body: Option<String>,
}

impl NotificationOptions {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }
}

pub struct NotificationGateway {
    state: watch::Sender<PermissionState>,
    prompt_lock: Mutex<()>,
    prompt: Arc<dyn PermissionPrompt>,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationGateway {
    pub fn new(
        initial: PermissionState,
        prompt: Arc<dyn PermissionPrompt>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            prompt_lock: Mutex::new(()),
            prompt,
            transport,
        }
    }

    pub fn permission(&self) -> PermissionState {
        *self.state.borrow()
    }

    pub fn permission_watch(&self) -> watch::Receiver<PermissionState> {
        self.state.subscribe()
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Resolve the permission state, prompting when it is still `default`.
    pub async fn request_permission(&self) -> PermissionState {
        let current = self.permission();
        if current.is_final() {
            return current;
        }

        let _guard = self.prompt_lock.lock().await;
        // Another caller may have settled it while we waited for the lock.
        let current = self.permission();
        if current.is_final() {
            return current;
        }

        let decision = self.prompt.request().await;
        if decision.is_final() {
            self.state.send_replace(decision);
            tracing::info!(permission = %decision, "Notification permission decided");
        } else {
            tracing::debug!("Notification permission prompt dismissed");
        }
        decision
    }

    /// Show a notification if the transport works and permission allows it.
    pub async fn notify(&self, title: &str, options: NotificationOptions) -> bool {
        if !self.transport.is_supported() {
            tracing::debug!(
                transport = self.transport.name(),
                title,
                "Notifications unsupported, skipping"
            );
            return false;
        }

        if self.request_permission().await != PermissionState::Granted {
            tracing::debug!(title, "Notification suppressed, permission not granted");
            return false;
        }

        match self.transport.show(title, options.body.as_deref()) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(transport = self.transport.name(), "Failed to show notification: {err}");
                false
            }
        }
    }
}

impl std::fmt::Debug for NotificationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationGateway")
            .field("permission", &self.permission())
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}
