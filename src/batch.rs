// ⏱️ Batch Runner - one item per tick, tallied by category
//
// Lifecycle:
//   Idle ──start──▶ Running ──tick (self-loop)──▶ Running
//   Running ──exhausted / stop / failure──▶ Stopped
//   Stopped ──start──▶ Running
//   Idle | Stopped ──reset──▶ Idle
//
// Ticks come from a tokio interval owned by a spawned task. Every tick and
// every public call takes the same lock, so a tick is atomic per item and a
// `stop` is always observed before the next tick does any work.

use crate::classifier::{ClassificationResult, Classifier};
use crate::error::{BatchError, BatchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// STATUS / MODE / SCHEDULE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Stopped,
}

/// Selects the tick interval for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Standard,
    /// Slower cadence
    Enhanced,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Standard => "standard",
            RunMode::Enhanced => "enhanced",
        }
    }
}

/// Inter-item delays in milliseconds, one per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSchedule {
    pub standard_ms: u64,
    pub enhanced_ms: u64,
}

impl TickSchedule {
    /// Same interval for both modes
    pub fn fixed(interval_ms: u64) -> Self {
        TickSchedule {
            standard_ms: interval_ms,
            enhanced_ms: interval_ms,
        }
    }

    pub fn interval_for(&self, mode: RunMode) -> Duration {
        match mode {
            RunMode::Standard => Duration::from_millis(self.standard_ms),
            RunMode::Enhanced => Duration::from_millis(self.enhanced_ms),
        }
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.standard_ms == 0 || self.enhanced_ms == 0 {
            return Err(BatchError::invalid("tick interval must be positive"));
        }
        Ok(())
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        TickSchedule {
            standard_ms: 1000,
            enhanced_ms: 2000,
        }
    }
}

// ============================================================================
// TALLIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub category: String,
    pub count: usize,
}

/// Per-category counters, kept in configured category order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tallies {
    entries: Vec<Tally>,
}

impl Tallies {
    pub fn new(categories: &[String]) -> Self {
        Tallies {
            entries: categories
                .iter()
                .map(|c| Tally {
                    category: c.clone(),
                    count: 0,
                })
                .collect(),
        }
    }

    pub fn get(&self, category: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|t| t.category == category)
            .map(|t| t.count)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|t| t.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tally> {
        self.entries.iter()
    }

    /// Returns false (and changes nothing) for an unknown category
    fn increment(&mut self, category: &str) -> bool {
        match self.entries.iter_mut().find(|t| t.category == category) {
            Some(tally) => {
                tally.count += 1;
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        for tally in &mut self.entries {
            tally.count = 0;
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// One item classified
    Progress {
        run_id: Uuid,
        processed: usize,
        total: usize,
        tallies: Tallies,
        result: ClassificationResult,
    },

    /// Every item processed
    Completed { run_id: Uuid, tallies: Tallies },

    /// Cancelled by `stop`
    Stopped {
        run_id: Uuid,
        tallies: Tallies,
        cursor: usize,
    },

    /// Aborted by a classifier error or an unknown category
    Failed {
        run_id: Uuid,
        tallies: Tallies,
        cursor: usize,
        error: BatchError,
    },
}

impl BatchEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            BatchEvent::Progress { run_id, .. }
            | BatchEvent::Completed { run_id, .. }
            | BatchEvent::Stopped { run_id, .. }
            | BatchEvent::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn tallies(&self) -> &Tallies {
        match self {
            BatchEvent::Progress { tallies, .. }
            | BatchEvent::Completed { tallies, .. }
            | BatchEvent::Stopped { tallies, .. }
            | BatchEvent::Failed { tallies, .. } => tallies,
        }
    }

    /// True for the last event of a run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchEvent::Progress { .. })
    }
}

// ============================================================================
// SNAPSHOT / SUMMARY
// ============================================================================

/// Point-in-time view of the runner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub run_id: Option<Uuid>,
    pub status: RunStatus,
    pub mode: RunMode,
    pub cursor: usize,
    pub total: usize,
    pub tallies: Tallies,
}

impl RunSnapshot {
    /// 0.0 - 100.0, for progress bars
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.cursor as f64 / self.total as f64) * 100.0
        }
    }
}

/// Description of the most recent run once it has ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub processed: usize,
    pub total: usize,
    pub tallies: Tallies,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .tallies
            .iter()
            .map(|t| format!("{} {}", t.count, t.category))
            .collect();
        format!(
            "{}/{} processed ({}) in {} ms",
            self.processed,
            self.total,
            counts.join(", "),
            (self.finished_at - self.started_at).num_milliseconds()
        )
    }
}

// ============================================================================
// RUNNER CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Closed set of tags the classifier may return, in display order
    pub categories: Vec<String>,
    pub schedule: TickSchedule,
}

impl RunnerConfig {
    pub fn new<S: Into<String>>(categories: impl IntoIterator<Item = S>, schedule: TickSchedule) -> Self {
        RunnerConfig {
            categories: categories.into_iter().map(Into::into).collect(),
            schedule,
        }
    }

    fn validate(&self) -> BatchResult<()> {
        if self.categories.is_empty() {
            return Err(BatchError::invalid("at least one category is required"));
        }
        for (i, category) in self.categories.iter().enumerate() {
            if self.categories[..i].contains(category) {
                return Err(BatchError::invalid(format!("duplicate category '{}'", category)));
            }
        }
        self.schedule.validate()
    }
}

// ============================================================================
// RUN STATE
// ============================================================================

struct RunState<T> {
    status: RunStatus,
    items: Vec<T>,
    cursor: usize,
    tallies: Tallies,
    run_id: Option<Uuid>,
    mode: RunMode,
    started_at: Option<DateTime<Utc>>,
    last_summary: Option<RunSummary>,
}

impl<T> RunState<T> {
    fn new(categories: &[String]) -> Self {
        RunState {
            status: RunStatus::Idle,
            items: Vec::new(),
            cursor: 0,
            tallies: Tallies::new(categories),
            run_id: None,
            mode: RunMode::Standard,
            started_at: None,
            last_summary: None,
        }
    }

    /// Move to Stopped and record the summary
    fn finish(&mut self, run_id: Uuid) {
        self.status = RunStatus::Stopped;
        self.last_summary = Some(RunSummary {
            run_id,
            mode: self.mode,
            processed: self.cursor,
            total: self.items.len(),
            tallies: self.tallies.clone(),
            started_at: self.started_at.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
        });
    }
}

struct Shared<T, C> {
    state: RunState<T>,
    classifier: C,
    events: UnboundedSender<BatchEvent>,
}

impl<T, C> Shared<T, C> {
    fn emit(&self, event: BatchEvent) {
        // Nobody listening is fine; progress is emitted unconditionally
        let _ = self.events.send(event);
    }
}

fn lock<T, C>(shared: &Mutex<Shared<T, C>>) -> MutexGuard<'_, Shared<T, C>> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// BATCH RUNNER
// ============================================================================

/// Drives a classifier over a list of items, one item per tick
pub struct BatchRunner<T, C> {
    shared: Arc<Mutex<Shared<T, C>>>,
    config: RunnerConfig,
    task: Option<JoinHandle<()>>,
}

impl<T, C> BatchRunner<T, C>
where
    T: Send + 'static,
    C: Classifier<T>,
{
    /// New idle runner plus the receiving end of its event stream
    pub fn new(classifier: C, config: RunnerConfig) -> BatchResult<(Self, UnboundedReceiver<BatchEvent>)> {
        config.validate()?;

        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            state: RunState::new(&config.categories),
            classifier,
            events,
        };

        let runner = BatchRunner {
            shared: Arc::new(Mutex::new(shared)),
            config,
            task: None,
        };
        Ok((runner, rx))
    }

    pub fn categories(&self) -> &[String] {
        &self.config.categories
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.shared).state.status
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let guard = lock(&self.shared);
        let state = &guard.state;
        RunSnapshot {
            run_id: state.run_id,
            status: state.status,
            mode: state.mode,
            cursor: state.cursor,
            total: state.items.len(),
            tallies: state.tallies.clone(),
        }
    }

    /// Summary of the last run that reached Stopped
    pub fn last_summary(&self) -> Option<RunSummary> {
        lock(&self.shared).state.last_summary.clone()
    }

    /// Start a run at the standard interval
    pub fn start(&mut self, items: Vec<T>) -> BatchResult<Uuid> {
        self.start_in_mode(items, RunMode::Standard)
    }

    /// Start a run at the interval configured for `mode`.
    ///
    /// Rejected while Running or with an empty list; in both cases nothing
    /// about the current state changes. Must be called inside a tokio runtime.
    pub fn start_in_mode(&mut self, items: Vec<T>, mode: RunMode) -> BatchResult<Uuid> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| BatchError::invalid("start requires a running tokio runtime"))?;

        let period = self.config.schedule.interval_for(mode);
        let run_id = Uuid::new_v4();

        {
            let mut guard = lock(&self.shared);
            let state = &mut guard.state;

            if state.status == RunStatus::Running {
                return Err(BatchError::invalid("a run is already in progress"));
            }
            if items.is_empty() {
                return Err(BatchError::invalid("item list is empty"));
            }

            state.items = items;
            state.cursor = 0;
            state.tallies.clear();
            state.run_id = Some(run_id);
            state.mode = mode;
            state.started_at = Some(Utc::now());
            state.status = RunStatus::Running;

            info!(
                run_id = %run_id,
                items = state.items.len(),
                mode = mode.as_str(),
                interval_ms = period.as_millis() as u64,
                "batch run started"
            );
        }

        if let Some(previous) = self.task.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !tick(&shared, run_id) {
                    break;
                }
            }
        }));

        Ok(run_id)
    }

    /// Cancel the current run. Returns false (and emits nothing) unless Running.
    pub fn stop(&mut self) -> bool {
        let stopped = {
            let mut guard = lock(&self.shared);
            let current = (guard.state.status, guard.state.run_id);
            match current {
                (RunStatus::Running, Some(run_id)) => {
                    guard.state.finish(run_id);
                    let event = BatchEvent::Stopped {
                        run_id,
                        tallies: guard.state.tallies.clone(),
                        cursor: guard.state.cursor,
                    };
                    guard.emit(event);
                    info!(run_id = %run_id, cursor = guard.state.cursor, "batch run stopped");
                    true
                }
                _ => false,
            }
        };

        if let Some(task) = self.task.take() {
            task.abort();
        }

        stopped
    }

    /// Clear items, cursor and tallies. Rejected while Running.
    pub fn reset(&mut self) -> BatchResult<()> {
        let mut guard = lock(&self.shared);
        let state = &mut guard.state;

        if state.status == RunStatus::Running {
            return Err(BatchError::invalid("cannot reset while a run is in progress; stop it first"));
        }

        state.items.clear();
        state.cursor = 0;
        state.tallies.clear();
        state.run_id = None;
        state.started_at = None;
        state.status = RunStatus::Idle;
        debug!("batch runner reset");
        Ok(())
    }
}

impl<T, C> Drop for BatchRunner<T, C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One tick for `run_id`. Returns false once the ticker should stop.
fn tick<T, C: Classifier<T>>(shared: &Mutex<Shared<T, C>>, run_id: Uuid) -> bool {
    let mut guard = lock(shared);
    let Shared {
        state,
        classifier,
        events,
    } = &mut *guard;

    if state.status != RunStatus::Running || state.run_id != Some(run_id) {
        return false;
    }

    if state.cursor >= state.items.len() {
        state.finish(run_id);
        let _ = events.send(BatchEvent::Completed {
            run_id,
            tallies: state.tallies.clone(),
        });
        info!(run_id = %run_id, processed = state.cursor, "batch run completed");
        return false;
    }

    let index = state.cursor;
    let item = &state.items[index];
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(item)));
    let error = match outcome {
        Ok(Ok(result)) => {
            if state.tallies.increment(&result.category) {
                state.cursor += 1;
                let _ = events.send(BatchEvent::Progress {
                    run_id,
                    processed: state.cursor,
                    total: state.items.len(),
                    tallies: state.tallies.clone(),
                    result,
                });
                return true;
            }
            BatchError::ContractViolation {
                category: result.category,
                item_index: index,
            }
        }
        Ok(Err(e)) => BatchError::ClassifierFailed {
            item_index: index,
            message: format!("{:#}", e),
        },
        Err(payload) => BatchError::ClassifierFailed {
            item_index: index,
            message: format!("classifier panicked: {}", panic_message(payload.as_ref())),
        },
    };

    warn!(run_id = %run_id, error = %error, "batch run aborted");
    state.finish(run_id);
    let _ = events.send(BatchEvent::Failed {
        run_id,
        tallies: state.tallies.clone(),
        cursor: state.cursor,
        error,
    });
    false
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

// ============================================================================
// TESTS
// ============================================================================
