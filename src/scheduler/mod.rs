//! Hourly measurement scheduling.
//!
//! [`SchedulerHandle`] owns the recurring timer. Starting it prints the
//! history report, runs a catch-up cycle when the current hour has no record
//! yet, and arms a timer that fires once at the computed due time and then
//! every period. Without a catch-up the first fire is immediate. Each fire
//! spawns an independent cycle; cycles may overlap.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speedwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> speedwatch::Result<()> {
//!     let repository = Arc::new(SqliteRepository::open("speedwatch.db")?);
//!     let source = Arc::new(SpeedtestCli::new(SpeedtestSettings::new(12345)));
//!     let reporter = Arc::new(Reporter::stdout(50, true));
//!
//!     let mut handle = SchedulerHandle::new(Scheduler::new(repository, source, reporter));
//!     handle.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop();
//!     handle.dispose().await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::clock::{hour_start, Clock, SystemClock};
use crate::error::{Error, Result};
use crate::history::{History, DEFAULT_HISTORY_DAYS};
use crate::report::{DaySummary, Reporter};
use crate::source::MeasurementSource;
use crate::storage::Repository;

mod cycle;

pub use cycle::CycleOutcome;

/// Interval between regular cycles.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60 * 60);

/// How long [`SchedulerHandle::dispose`] waits for the timer task.
const DISPOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Reporting,
    AwaitingMeasurement,
    Armed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Days covered by the startup report.
    pub history_days: u32,
    pub period: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            period: DEFAULT_PERIOD,
        }
    }
}

/// The collaborators a cycle needs. Cheap to clone; every spawned cycle gets
/// its own copy.
#[derive(Clone)]
pub struct Scheduler {
    repository: Arc<dyn Repository>,
    source: Arc<dyn MeasurementSource>,
    reporter: Arc<Reporter>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("reporter", &self.reporter)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        repository: Arc<dyn Repository>,
        source: Arc<dyn MeasurementSource>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            repository,
            source,
            reporter,
            clock: Arc::new(SystemClock),
            settings: SchedulerSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Print one line per day of the last `days` days and return the
    /// summaries together with the history they came from.
    pub async fn report_history(&self, days: u32) -> Result<(History, Vec<DaySummary>)> {
        self.report_history_at(days, self.clock.now()).await
    }

    /// Like [`report_history`](Self::report_history) for a window ending at `now`.
    pub async fn report_history_at(
        &self,
        days: u32,
        now: NaiveDateTime,
    ) -> Result<(History, Vec<DaySummary>)> {
        let history = History::load(self.repository.as_ref(), days, now).await?;
        let summaries = history.iter().map(|bucket| self.reporter.day(bucket)).collect();
        Ok((history, summaries))
    }
}

/// Delay from `now` until two hours past `hour_start`, or zero if that
/// instant has already passed.
pub fn catch_up_due(hour_start: NaiveDateTime, now: NaiveDateTime) -> Duration {
    (hour_start + chrono::Duration::hours(2) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// What `start` decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupSummary {
    /// Report lines printed, oldest day first.
    pub days: Vec<DaySummary>,
    /// Whether an immediate cycle ran because the current hour had no record.
    pub caught_up: bool,
    /// Delay until the first timer fire.
    pub first_due: Duration,
}

/// Owner of the recurring timer.
///
/// Dropping the handle aborts the timer task; cycles already spawned keep
/// running.
pub struct SchedulerHandle {
    scheduler: Scheduler,
    state: Arc<Mutex<SchedulerState>>,
    stop_tx: Option<mpsc::Sender<()>>,
    timer_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("state", &self.state())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl SchedulerHandle {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            stop_tx: None,
            timer_task: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn set_state(&self, state: SchedulerState) {
        debug!(?state, "scheduler state");
        *self.state.lock() = state;
    }

    /// Run the startup protocol and arm the timer.
    ///
    /// Storage failures here are fatal and leave the handle stopped.
    pub async fn start(&mut self) -> Result<StartupSummary> {
        if self.state() != SchedulerState::Idle {
            return Err(Error::invalid_state(format!(
                "cannot start scheduler in state {:?}",
                self.state()
            )));
        }

        match self.startup().await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.set_state(SchedulerState::Stopped);
                Err(e)
            }
        }
    }

    async fn startup(&mut self) -> Result<StartupSummary> {
        let scheduler = self.scheduler.clone();
        let settings = scheduler.settings;

        self.set_state(SchedulerState::Reporting);
        scheduler.repository.ensure_schema().await?;

        let now = scheduler.clock.now();
        let (history, days) = scheduler.report_history_at(settings.history_days, now).await?;

        let caught_up = !history.has_current_hour_entry(now);
        let first_due = if caught_up {
            info!("no record for the current hour, measuring now");
            self.set_state(SchedulerState::AwaitingMeasurement);
            scheduler.run_cycle().await;
            catch_up_due(hour_start(now), scheduler.clock.now())
        } else {
            Duration::ZERO
        };

        let (stop_tx, stop_rx) = mpsc::channel(1);
        self.timer_task = Some(tokio::spawn(run_timer(scheduler, first_due, stop_rx)));
        self.stop_tx = Some(stop_tx);
        self.set_state(SchedulerState::Armed);

        info!(?first_due, period = ?settings.period, "scheduler armed");
        Ok(StartupSummary {
            days,
            caught_up,
            first_due,
        })
    }

    /// Stop future timer fires. In-flight cycles are left to finish.
    /// Safe to call at any time and more than once.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
            info!("scheduler stopped");
        }
        self.set_state(SchedulerState::Stopped);
    }

    /// Stop if needed and wait for the timer task to exit.
    pub async fn dispose(&mut self) -> Result<()> {
        self.stop();
        if let Some(handle) = self.timer_task.take() {
            match tokio::time::timeout(DISPOSE_TIMEOUT, handle).await {
                Ok(result) => {
                    result.map_err(|e| Error::invalid_state(format!("timer task failed: {e}")))?
                }
                Err(_) => {
                    return Err(Error::invalid_state("timed out waiting for timer task to stop"));
                }
            }
        }
        Ok(())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.timer_task.take() {
            handle.abort();
        }
    }
}

/// Fire at `first_due`, then every period, until the stop channel fires or
/// closes.
async fn run_timer(scheduler: Scheduler, first_due: Duration, mut stop_rx: mpsc::Receiver<()>) {
    let mut ticks = tokio::time::interval_at(Instant::now() + first_due, scheduler.settings.period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            _ = ticks.tick() => {
                let cycle = scheduler.clone();
                tokio::spawn(async move {
                    cycle.run_cycle().await;
                });
            }
        }
    }
    debug!("timer task exiting");
}
