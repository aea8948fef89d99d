//! Idle-session tracking: warn before automatic logout, extend on activity.
//!
//! The monitor runs as a background task with two deadlines. The warning
//! deadline fires `timeout - warning` after the last extension and starts a
//! countdown; the logout deadline fires at `timeout` and ends the session.
//! Extending pings the backend and re-arms both deadlines from scratch.
//!
//! Token validity is not decided here. The ping is advisory; a dead token is
//! still caught by the request pipeline's own 401 handling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::ApiError;

/// Default idle timeout in minutes
const DEFAULT_TIMEOUT_MINUTES: u64 = 60;

/// Default warning lead time in minutes
const DEFAULT_WARNING_MINUTES: u64 = 5;

/// Minimum gap between activity-driven extensions
const DEFAULT_DEBOUNCE_SECS: u64 = 5;

/// User interaction kinds the shell can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyDown,
    TouchStart,
    Scroll,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub timeout: Duration,
    /// Lead time before `timeout` at which the warning starts
    pub warning: Duration,
    pub auto_logout: bool,
    /// Activity kinds that count as the user being present
    pub tracked: Vec<ActivityKind>,
    pub debounce: Duration,
    /// Countdown refresh interval while warning
    pub tick: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_TIMEOUT_MINUTES, DEFAULT_WARNING_MINUTES)
    }
}

impl MonitorConfig {
    pub fn from_minutes(timeout_minutes: u64, warning_minutes: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_minutes * 60),
            warning: Duration::from_secs(warning_minutes * 60),
            auto_logout: true,
            tracked: vec![
                ActivityKind::PointerDown,
                ActivityKind::KeyDown,
                ActivityKind::TouchStart,
            ],
            debounce: Duration::from_secs(DEFAULT_DEBOUNCE_SECS),
            tick: Duration::from_secs(1),
        }
    }

    fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum MonitorPhase {
    Active,
    Warning,
    LoggedOut,
}

/// What the shell needs to render the idle warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    /// Seconds until the warning appears
    pub time_until_warning: u64,
    /// Seconds until automatic logout
    pub time_until_logout: u64,
}

impl MonitorSnapshot {
    pub fn show_warning(&self) -> bool {
        self.phase == MonitorPhase::Warning
    }

    pub fn is_timed_out(&self) -> bool {
        self.phase == MonitorPhase::LoggedOut
    }
}

/// Backend side of the monitor: the liveness ping and the forced logout.
#[async_trait]
pub trait SessionKeeper: Send + Sync + 'static {
    async fn touch(&self) -> Result<(), ApiError>;
    async fn expire(&self);
}

enum Command {
    Activity(ActivityKind),
    Extend(oneshot::Sender<bool>),
}

/// Handle to a running monitor. Dropping it stops the monitor.
pub struct SessionMonitor {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<MonitorSnapshot>,
    task: JoinHandle<()>,
}

impl SessionMonitor {
    /// Arm the timers and start watching. One extension is attempted
    /// immediately so the backend sees the session as active.
    pub fn start<K: SessionKeeper>(config: MonitorConfig, keeper: K) -> Self {
        let now = Instant::now();
        let initial = MonitorSnapshot {
            phase: MonitorPhase::Active,
            time_until_warning: config.warning_after().as_secs(),
            time_until_logout: config.timeout.as_secs(),
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ping_tx, ping_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            warning_at: now + config.warning_after(),
            logout_at: now + config.timeout,
            last_extension: now,
            phase: MonitorPhase::Active,
            timed_out: false,
            pinging: false,
            waiters: Vec::new(),
            pings: ping_tx,
            config,
            keeper: Arc::new(keeper),
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(command_rx, ping_rx));

        Self {
            commands: command_tx,
            state: state_rx,
            task,
        }
    }

    /// Report a user interaction. Debounced; untracked kinds are ignored.
    pub fn record_activity(&self, kind: ActivityKind) {
        let _ = self.commands.send(Command::Activity(kind));
    }

    /// Ping the backend and restart the idle clock. Returns `false` if the
    /// ping failed (timers are then left as they were) or the monitor ended.
    pub async fn extend_session(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Extend(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker<K> {
    config: MonitorConfig,
    keeper: Arc<K>,
    state: watch::Sender<MonitorSnapshot>,
    warning_at: Instant,
    logout_at: Instant,
    last_extension: Instant,
    phase: MonitorPhase,
    /// Logout deadline passed with auto-logout off
    timed_out: bool,
    /// A liveness ping is running in its own task
    pinging: bool,
    /// `extend_session` callers waiting on the ping in flight
    waiters: Vec<oneshot::Sender<bool>>,
    pings: mpsc::UnboundedSender<bool>,
}

impl<K: SessionKeeper> Worker<K> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut pings: mpsc::UnboundedReceiver<bool>,
    ) {
        self.start_ping(None);

        let mut countdown = time::interval(self.config.tick);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.phase != MonitorPhase::LoggedOut {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Activity(kind)) => self.on_activity(kind),
                    Some(Command::Extend(reply)) => self.start_ping(Some(reply)),
                    None => break,
                },
                Some(extended) = pings.recv() => self.on_ping(extended),
                _ = time::sleep_until(self.warning_at), if self.phase == MonitorPhase::Active => {
                    self.enter_warning();
                }
                _ = time::sleep_until(self.logout_at), if !self.timed_out => {
                    self.on_timeout().await;
                }
                _ = countdown.tick(), if self.phase == MonitorPhase::Warning && !self.timed_out => {
                    self.publish();
                }
            }
        }
        debug!("Session monitor stopped");
    }

    fn on_activity(&mut self, kind: ActivityKind) {
        if !self.config.tracked.contains(&kind) {
            return;
        }
        if self.last_extension.elapsed() <= self.config.debounce {
            return;
        }
        self.start_ping(None);
    }

    // At most one ping in flight, off the loop; deadlines fire regardless.
    // Callers arriving mid-ping share its result.
    fn start_ping(&mut self, reply: Option<oneshot::Sender<bool>>) {
        self.waiters.extend(reply);
        if self.pinging {
            return;
        }
        self.pinging = true;

        let keeper = Arc::clone(&self.keeper);
        let done = self.pings.clone();
        tokio::spawn(async move {
            let extended = match keeper.touch().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to extend session");
                    false
                }
            };
            let _ = done.send(extended);
        });
    }

    fn on_ping(&mut self, extended: bool) {
        self.pinging = false;
        if extended {
            let now = Instant::now();
            self.last_extension = now;
            self.warning_at = now + self.config.warning_after();
            self.logout_at = now + self.config.timeout;
            self.phase = MonitorPhase::Active;
            self.timed_out = false;
            self.publish();
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(extended);
        }
    }

    fn enter_warning(&mut self) {
        self.phase = MonitorPhase::Warning;
        info!(
            seconds_left = self.logout_at.saturating_duration_since(Instant::now()).as_secs(),
            "Session about to expire"
        );
        self.publish();
    }

    async fn on_timeout(&mut self) {
        if self.config.auto_logout {
            info!("Session idle timeout reached, logging out");
            self.keeper.expire().await;
            self.phase = MonitorPhase::LoggedOut;
        } else {
            self.phase = MonitorPhase::Warning;
            self.timed_out = true;
        }
        self.publish();
    }

    fn publish(&self) {
        let now = Instant::now();
        let time_until_logout = if self.timed_out || self.phase == MonitorPhase::LoggedOut {
            0
        } else {
            self.logout_at.saturating_duration_since(now).as_secs()
        };
        self.state.send_replace(MonitorSnapshot {
            phase: self.phase,
            time_until_warning: self.warning_at.saturating_duration_since(now).as_secs(),
            time_until_logout,
        });
    }
}
