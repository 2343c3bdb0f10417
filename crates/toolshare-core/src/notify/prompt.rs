use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::PermissionState;

const DEFAULT_QUESTION: &str = "Allow toolshare to show notifications?";

/// Asks the user whether notifications may be shown.
///
/// Returning [`PermissionState::Default`] means the prompt was dismissed
/// without a decision.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn request(&self) -> PermissionState;
}

/// Answers every request with a fixed decision.
#[derive(Debug, Clone, Copy)]
pub struct StaticPrompt(pub PermissionState);

#[async_trait]
impl PermissionPrompt for StaticPrompt {
    async fn request(&self) -> PermissionState {
        self.0
    }
}

/// A question waiting for whoever owns the terminal to answer it.
///
/// Dropping the request unanswered dismisses the prompt.
#[derive(Debug)]
pub struct PromptRequest {
    question: String,
    reply: oneshot::Sender<PermissionState>,
}

impl PromptRequest {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn resolve(self, decision: PermissionState) {
        if self.reply.send(decision).is_err() {
            tracing::debug!("Permission prompt abandoned before it was answered");
        }
    }
}

/// Hands the question to the terminal's owner (the shell loop) and waits
/// for its answer. The owner reads the answer from its own input, so no
/// other reader ever competes for the same line.
#[derive(Debug, Clone)]
pub struct TerminalPrompt {
    question: String,
    requests: mpsc::Sender<PromptRequest>,
}

impl TerminalPrompt {
    /// A prompt plus the receiving end its questions arrive on.
    pub fn channel() -> (Self, mpsc::Receiver<PromptRequest>) {
        let (requests, receiver) = mpsc::channel(1);
        (
            Self {
                question: DEFAULT_QUESTION.to_string(),
                requests,
            },
            receiver,
        )
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }
}

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn request(&self) -> PermissionState {
        let (reply, answer) = oneshot::channel();
        let request = PromptRequest {
            question: self.question.clone(),
            reply,
        };
        if self.requests.send(request).await.is_err() {
            tracing::debug!("No terminal to ask for notification permission");
            return PermissionState::Default;
        }
        answer.await.unwrap_or(PermissionState::Default)
    }
}

/// Read a typed answer. `None` when the line is not an answer at all.
pub fn parse_answer(line: &str) -> Option<PermissionState> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(PermissionState::Granted),
        "" | "n" | "no" => Some(PermissionState::Denied),
        "later" | "skip" => Some(PermissionState::Default),
        _ => None,
    }
}
