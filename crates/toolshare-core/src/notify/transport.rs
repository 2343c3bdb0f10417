//! Ways of actually putting a notification in front of the user.

use std::fmt;
use std::io::{self, IsTerminal, stdout};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::{Command, execute};
use notify_rust::Notification;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Desktop notification error: {0}")]
    Desktop(String),
}

pub trait NotificationTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this transport can show anything in the current environment.
    fn is_supported(&self) -> bool {
        true
    }

    fn show(&self, title: &str, body: Option<&str>) -> Result<(), TransportError>;
}

/// Transport selection as it appears in preferences and on the command line.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransportKind {
    /// OSC 9 when stdout is a terminal, the log otherwise.
    #[default]
    Auto,
    Osc9,
    Desktop,
    Log,
    Off,
}

pub fn transport_for(kind: TransportKind) -> Arc<dyn NotificationTransport> {
    match kind {
        TransportKind::Auto if stdout().is_terminal() => Arc::new(Osc9Transport),
        TransportKind::Auto | TransportKind::Log => Arc::new(LogTransport),
        TransportKind::Osc9 => Arc::new(Osc9Transport),
        TransportKind::Desktop => Arc::new(DesktopTransport::new("toolshare")),
        TransportKind::Off => Arc::new(DisabledTransport),
    }
}

fn join_title(title: &str, body: Option<&str>) -> String {
    match body {
        Some(body) if !body.is_empty() && !title.is_empty() => format!("{title}: {body}"),
        Some(body) if !body.is_empty() => body.to_string(),
        _ => title.to_string(),
    }
}

/// Command that emits an OSC 9 notification with a message.
#[derive(Debug, Clone)]
struct PostNotification(String);

impl Command for PostNotification {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(f, "\x1b]9;{}\x07", self.0)
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> io::Result<()> {
        Err(std::io::Error::other(
            "tried to execute PostNotification using WinAPI; use ANSI instead",
        ))
    }

    #[cfg(windows)]
    fn is_ansi_code_supported(&self) -> bool {
        true
    }
}

/// Terminal notification through the OSC 9 escape sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct Osc9Transport;

impl NotificationTransport for Osc9Transport {
    fn name(&self) -> &'static str {
        "osc9"
    }

    fn is_supported(&self) -> bool {
        stdout().is_terminal()
    }

    fn show(&self, title: &str, body: Option<&str>) -> Result<(), TransportError> {
        execute!(stdout(), PostNotification(join_title(title, body)))?;
        Ok(())
    }
}

/// Native desktop notification.
#[derive(Debug, Clone)]
pub struct DesktopTransport {
    app_name: String,
}

impl DesktopTransport {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl NotificationTransport for DesktopTransport {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn show(&self, title: &str, body: Option<&str>) -> Result<(), TransportError> {
        let mut notification = Notification::new();
        notification.summary(title).appname(&self.app_name);
        if let Some(body) = body {
            notification.body(body);
        }

        #[cfg(target_os = "linux")]
        {
            notification.icon("terminal").timeout(5000);
        }

        notification
            .show()
            .map(|_| ())
            .map_err(|e| TransportError::Desktop(e.to_string()))
    }
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn show(&self, title: &str, body: Option<&str>) -> Result<(), TransportError> {
        tracing::info!(title, body = body.unwrap_or_default(), "Notification");
        Ok(())
    }
}

/// Environment without notification support.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTransport;

impl NotificationTransport for DisabledTransport {
    fn name(&self) -> &'static str {
        "off"
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn show(&self, _title: &str, _body: Option<&str>) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownNotification {
    pub title: String,
    pub body: Option<String>,
}

/// Keeps every notification in memory instead of showing it.
#[derive(Debug)]
pub struct RecordingTransport {
    shown: Mutex<Vec<ShownNotification>>,
    failing: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// A transport whose every `show` fails.
    pub fn failing() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn shown(&self) -> Vec<ShownNotification> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.title).collect()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn show(&self, title: &str, body: Option<&str>) -> Result<(), TransportError> {
        if self.failing {
            return Err(TransportError::Io(io::Error::other("transport unavailable")));
        }
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ShownNotification {
                title: title.to_string(),
                body: body.map(str::to_string),
            });
        Ok(())
    }
}
