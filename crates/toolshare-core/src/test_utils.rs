//! Helpers shared by tests across the workspace.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::notify::{
    NotificationGateway, PermissionPrompt, PermissionState, RecordingTransport, StaticPrompt,
};

/// Prompt that replays a fixed list of answers, repeating the last one, and
/// counts how often it was asked.
#[derive(Debug)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<PermissionState>>,
    last: PermissionState,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answer: PermissionState) -> Self {
        Self::sequence([answer])
    }

    pub fn sequence(answers: impl IntoIterator<Item = PermissionState>) -> Self {
        let answers: VecDeque<_> = answers.into_iter().collect();
        let last = answers.back().copied().unwrap_or_default();
        Self {
            answers: Mutex::new(answers),
            last,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Suspend for `delay` before answering, like a user thinking it over.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionPrompt for ScriptedPrompt {
    async fn request(&self) -> PermissionState {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.last)
    }
}

/// Gateway with permission already granted that records what it shows.
pub fn recording_gateway() -> (Arc<NotificationGateway>, Arc<RecordingTransport>) {
    gateway_with_permission(PermissionState::Granted)
}

pub fn gateway_with_permission(
    permission: PermissionState,
) -> (Arc<NotificationGateway>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let gateway = NotificationGateway::new(
        permission,
        Arc::new(StaticPrompt(permission)),
        transport.clone(),
    );
    (Arc::new(gateway), transport)
}
