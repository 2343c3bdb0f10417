//! Countdown timer. Starting a timer tells every other instance to run its
//! own independent countdown from the same value; nothing is persisted.
//!
//! Countdowns in different instances drift apart by however long delivery
//! took. They are never re-synchronized.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use toolshare_core::{NotificationGateway, NotificationOptions, ToolId};

use crate::context::{ToolContext, decode_payload};
use crate::error::{Result, ToolError};

pub const MAX_TIMER_SECONDS: u32 = 3600;

const TOOL: ToolId = ToolId::Timer;
const TICK: Duration = Duration::from_secs(1);

/// What a display of the timer shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerView {
    pub remaining: u32,
    pub running: bool,
}

#[derive(Deserialize)]
struct StartPayload {
    rem: u32,
}

/// One running countdown at most, ticking once per second.
struct Countdown {
    view: watch::Sender<TimerView>,
    task: Mutex<Option<JoinHandle<()>>>,
    notifier: Arc<NotificationGateway>,
}

impl Countdown {
    fn new(notifier: Arc<NotificationGateway>) -> Self {
        let (view, _) = watch::channel(TimerView::default());
        Self {
            view,
            task: Mutex::new(None),
            notifier,
        }
    }

    fn is_running(&self) -> bool {
        self.view.borrow().running
    }

    /// Begin counting down from `seconds`. Returns false when a countdown is
    /// already running or there is no runtime to run it on.
    fn start(self: &Arc<Self>, seconds: u32, finished_title: &'static str) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available, cannot run timer");
            return false;
        };

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            return false;
        }

        self.view.send_replace(TimerView {
            remaining: seconds,
            running: true,
        });
        let countdown = Arc::clone(self);
        *task = Some(runtime.spawn(countdown.run(seconds, finished_title)));
        true
    }

    async fn run(self: Arc<Self>, seconds: u32, finished_title: &'static str) {
        let mut ticks = tokio::time::interval(TICK);
        // The first tick completes immediately.
        ticks.tick().await;

        let mut remaining = seconds;
        while remaining > 0 {
            ticks.tick().await;
            remaining -= 1;
            self.view.send_modify(|view| view.remaining = remaining);
        }

        self.view.send_replace(TimerView::default());
        tracing::debug!(seconds, "Timer finished");
        self.notifier
            .notify(finished_title, NotificationOptions::default())
            .await;
    }

    /// Abort a running countdown and reset the display. Returns whether one
    /// was running. A finished countdown is left to deliver its notification.
    fn stop(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = self.view.send_replace(TimerView::default()).running;
        if let Some(handle) = task.take().filter(|_| was_running) {
            handle.abort();
        }
        was_running
    }
}

pub struct TimerTool {
    ctx: ToolContext,
    countdown: Arc<Countdown>,
}

impl TimerTool {
    pub fn new(ctx: ToolContext) -> Self {
        let countdown = Arc::new(Countdown::new(Arc::clone(&ctx.notifier)));

        let remote = Arc::clone(&countdown);
        ctx.bus.subscribe(TOOL, move |action: &str, payload: &Value| {
            apply_remote(&remote, action, payload);
        });

        Self { ctx, countdown }
    }

    pub fn view(&self) -> TimerView {
        *self.countdown.view.borrow()
    }

    /// Follow the countdown as it ticks.
    pub fn watch(&self) -> watch::Receiver<TimerView> {
        self.countdown.view.subscribe()
    }

    pub async fn start(&self, seconds: u32) -> Result<()> {
        if !(1..=MAX_TIMER_SECONDS).contains(&seconds) {
            return Err(ToolError::invalid_input(
                TOOL,
                format!("seconds must be between 1 and {MAX_TIMER_SECONDS}, got {seconds}"),
            ));
        }
        if !self.countdown.start(seconds, "Timer finished") {
            return Err(ToolError::TimerRunning);
        }

        self.ctx.publish(TOOL, "start", json!({ "rem": seconds }));
        self.ctx
            .announce(
                "Timer started",
                NotificationOptions::body(format!("{seconds}s countdown")),
            )
            .await;
        Ok(())
    }

    pub async fn stop(&self) {
        self.countdown.stop();

        self.ctx.publish(TOOL, "stop", json!({}));
        self.ctx
            .announce("Timer stopped", NotificationOptions::default())
            .await;
    }
}

impl std::fmt::Debug for TimerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerTool")
            .field("view", &self.view())
            .finish_non_exhaustive()
    }
}

fn apply_remote(countdown: &Arc<Countdown>, action: &str, payload: &Value) {
    match action {
        "start" => {
            let Some(StartPayload { rem }) = decode_payload(TOOL, action, payload) else {
                return;
            };
            if !(1..=MAX_TIMER_SECONDS).contains(&rem) {
                tracing::debug!(rem, "Ignoring remote timer start out of range");
                return;
            }
            if !countdown.start(rem, "Timer finished (shared)") {
                tracing::debug!(rem, "Timer already running, ignoring remote start");
            }
        }
        "stop" => {
            countdown.stop();
        }
        other => tracing::debug!(action = other, "Ignoring unknown timer action"),
    }
}
