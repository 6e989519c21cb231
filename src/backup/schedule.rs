//! Automatic backups
//!
//! The scheduler is a tokio task driven by two injected capabilities: a
//! [`Clock`] for "now" and a [`Timer`] for waiting. Settings are re-read
//! before arming the timer and again when it fires, so turning automatic
//! backups off stops the task at the next decision point. Missed runs are
//! not caught up.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{BackupManager, BackupSchedule, BackupSettings};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deferred wake-up
#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Interval between automatic runs, `None` for manual
pub fn interval(schedule: BackupSchedule) -> Option<ChronoDuration> {
    match schedule {
        BackupSchedule::Daily => Some(ChronoDuration::hours(24)),
        BackupSchedule::Weekly => Some(ChronoDuration::days(7)),
        BackupSchedule::Manual => None,
    }
}

/// When the next automatic backup is due, if any
pub fn next_run(settings: &BackupSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !settings.auto_backup {
        return None;
    }
    interval(settings.schedule).map(|step| now + step)
}

/// Observable scheduler progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub next_run: Option<DateTime<Utc>>,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub last_backup: Option<String>,
    pub last_error: Option<String>,
    pub stopped: bool,
}

pub struct AutoBackupScheduler {
    manager: Arc<BackupManager>,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
}

impl AutoBackupScheduler {
    pub fn new(manager: Arc<BackupManager>) -> Self {
        Self {
            manager,
            clock: Arc::new(SystemClock),
            timer: Arc::new(TokioTimer),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// Spawn the scheduler task. Must be called inside a tokio runtime.
    pub fn start(self, password: Zeroizing<String>) -> AutoBackupHandle {
        let (tx, rx) = watch::channel(SchedulerState::default());
        let task = tokio::spawn(async move { self.run(password, tx).await });
        AutoBackupHandle {
            task: Some(task),
            state: rx,
        }
    }

    /// Settings for the next decision; `None` means stop
    fn active_settings(&self) -> Option<BackupSettings> {
        match self.manager.settings() {
            Ok(settings) if next_run(&settings, self.clock.now()).is_some() => Some(settings),
            Ok(_) => {
                info!("Automatic backups disabled, scheduler stopping");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not read backup settings, scheduler stopping");
                None
            }
        }
    }

    async fn run(self, password: Zeroizing<String>, state: watch::Sender<SchedulerState>) {
        while let Some(settings) = self.active_settings() {
            let now = self.clock.now();
            let Some(due) = next_run(&settings, now) else {
                break;
            };
            state.send_modify(|s| s.next_run = Some(due));
            debug!(next_run = %due, schedule = ?settings.schedule, "Automatic backup armed");

            let wait = (due - now).to_std().unwrap_or_default();
            self.timer.sleep(wait).await;

            if self.active_settings().is_none() {
                break;
            }

            match self.manager.create_backup(&password, None).await {
                Ok(created) => {
                    info!(archive = %created.filename, "Automatic backup completed");
                    state.send_modify(|s| {
                        s.completed_runs += 1;
                        s.last_backup = Some(created.filename);
                        s.last_error = None;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Automatic backup failed");
                    state.send_modify(|s| {
                        s.failed_runs += 1;
                        s.last_error = Some(e.to_string());
                    });
                }
            }
        }

        state.send_modify(|s| {
            s.next_run = None;
            s.stopped = true;
        });
    }
}

/// Handle to a running scheduler; dropping it aborts the task
pub struct AutoBackupHandle {
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<SchedulerState>,
}

impl AutoBackupHandle {
    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AutoBackupHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
