//! Named registry of recurring background jobs.
//!
//! Constructed once at startup and injected where needed; nothing here is a
//! module-level global, so tests build a fresh registry each. Every run is
//! wrapped: failures (including panics) are logged and recorded in a bounded
//! per-job history, and never stop the schedule — the next tick still fires.
//!
//! The registry does not serialize overlapping runs of the same job: if a
//! tick fires while the previous run is still going, both execute. Tasks that
//! cannot tolerate overlap must guard themselves.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::schedule::{CronExpr, ScheduleError};

/// Runs kept per job in the in-memory history.
const HISTORY_LIMIT: usize = 50;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type JobTask = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Adapts an async closure into a [`JobTask`].
pub fn task<F, Fut>(f: F) -> JobTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid schedule for job `{name}`: {source}")]
    InvalidSchedule {
        name: String,
        #[source]
        source: ScheduleError,
    },

    #[error("no job named `{0}` is registered")]
    UnknownJob(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failed { error: String },
}

/// One wrapped execution, success or failure.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunRecord {
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
}

/// Listing entry, in registration order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobInfo {
    pub name: String,
    pub expression: String,
    pub timezone: String,
    pub registered_at: DateTime<Utc>,
    /// Best-effort: whether a scheduler loop is currently armed.
    pub running: bool,
    pub runs: u64,
    pub failures: u64,
    pub last_run: Option<RunRecord>,
}

#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub timezone: FixedOffset,
    /// Arm the scheduler loop immediately on registration.
    pub auto_start: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            // São Paulo.
            timezone: FixedOffset::west_opt(3 * 3600).expect("static offset"),
            auto_start: true,
        }
    }
}

struct JobState {
    name: String,
    runs: AtomicU64,
    failures: AtomicU64,
    history: Mutex<VecDeque<RunRecord>>,
}

impl JobState {
    fn record(&self, record: RunRecord) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if matches!(record.outcome, RunOutcome::Failed { .. }) {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let mut history = self.history.lock().unwrap();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(record);
    }
}

struct JobEntry {
    schedule: CronExpr,
    timezone: FixedOffset,
    registered_at: DateTime<Utc>,
    task: JobTask,
    state: Arc<JobState>,
    runner: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<String, JobEntry>,
    /// Registration order for `list`. Re-registering keeps the original slot.
    order: Vec<String>,
}

pub struct JobRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Validates the cron expression, then installs the job. If a job with
    /// the same name exists its scheduler loop is stopped and discarded
    /// first, so no two instances of one name ever run side by side.
    pub fn register(
        &self,
        name: &str,
        expression: &str,
        options: JobOptions,
        task: JobTask,
    ) -> Result<(), JobError> {
        let schedule = CronExpr::parse(expression).map_err(|source| JobError::InvalidSchedule {
            name: name.to_string(),
            source,
        })?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(old) = inner.jobs.remove(name) {
            if let Some(handle) = old.runner {
                handle.abort();
            }
            info!(job = name, "stopping previous registration before replacing");
        } else {
            inner.order.push(name.to_string());
        }

        let state = Arc::new(JobState {
            name: name.to_string(),
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
        });

        let runner = if options.auto_start {
            Some(spawn_runner(
                schedule.clone(),
                options.timezone,
                task.clone(),
                state.clone(),
            ))
        } else {
            None
        };

        inner.jobs.insert(
            name.to_string(),
            JobEntry {
                schedule,
                timezone: options.timezone,
                registered_at: Utc::now(),
                task,
                state,
                runner,
            },
        );
        info!(job = name, expression, "job registered");
        Ok(())
    }

    pub fn stop(&self, name: &str) -> Result<(), JobError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .jobs
            .get_mut(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        if let Some(handle) = entry.runner.take() {
            handle.abort();
            info!(job = name, "job stopped");
        }
        Ok(())
    }

    pub fn start(&self, name: &str) -> Result<(), JobError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .jobs
            .get_mut(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        let armed = entry.runner.as_ref().is_some_and(|h| !h.is_finished());
        if !armed {
            entry.runner = Some(spawn_runner(
                entry.schedule.clone(),
                entry.timezone,
                entry.task.clone(),
                entry.state.clone(),
            ));
            info!(job = name, "job started");
        }
        Ok(())
    }

    pub fn restart(&self, name: &str) -> Result<(), JobError> {
        self.stop(name)?;
        self.start(name)
    }

    /// Immediate out-of-schedule invocation, awaited to completion.
    pub async fn run_now(&self, name: &str) -> Result<RunRecord, JobError> {
        let (task, state) = {
            let inner = self.inner.lock().unwrap();
            let entry = inner
                .jobs
                .get(name)
                .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
            (entry.task.clone(), entry.state.clone())
        };
        Ok(run_wrapped(&state, &task, RunTrigger::Manual).await)
    }

    pub fn list(&self) -> Vec<JobInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| inner.jobs.get(name))
            .map(|entry| JobInfo {
                name: entry.state.name.clone(),
                expression: entry.schedule.raw().to_string(),
                timezone: entry.timezone.to_string(),
                registered_at: entry.registered_at,
                running: entry.runner.as_ref().is_some_and(|h| !h.is_finished()),
                runs: entry.state.runs.load(Ordering::Relaxed),
                failures: entry.state.failures.load(Ordering::Relaxed),
                last_run: entry.state.history.lock().unwrap().back().cloned(),
            })
            .collect()
    }

    pub fn history(&self, name: &str) -> Result<Vec<RunRecord>, JobError> {
        let inner = self.inner.lock().unwrap();
        let entry = inner
            .jobs
            .get(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        let records = entry.state.history.lock().unwrap().iter().cloned().collect();
        Ok(records)
    }

    /// Aborts every scheduler loop; used on shutdown.
    pub fn stop_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for entry in inner.jobs.values_mut() {
            if let Some(handle) = entry.runner.take() {
                handle.abort();
            }
        }
    }
}

fn spawn_runner(
    schedule: CronExpr,
    timezone: FixedOffset,
    task: JobTask,
    state: Arc<JobState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now().with_timezone(&timezone);
            let Some(next) = schedule.next_after(now) else {
                warn!(job = %state.name, "schedule has no future occurrence, runner exiting");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            run_wrapped(&state, &task, RunTrigger::Scheduled).await;
        }
    })
}

/// Executes one run. The task runs in its own spawned task so a panic is
/// caught as a failed run instead of taking the scheduler loop down.
async fn run_wrapped(state: &JobState, task: &JobTask, trigger: RunTrigger) -> RunRecord {
    let started_at = Utc::now();
    let clock = std::time::Instant::now();

    let result = tokio::spawn(task()).await;
    let duration_ms = clock.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(Ok(())) => RunOutcome::Success,
        Ok(Err(e)) => RunOutcome::Failed {
            error: format!("{e:#}"),
        },
        Err(join_err) => RunOutcome::Failed {
            error: if join_err.is_panic() {
                "task panicked".to_string()
            } else {
                join_err.to_string()
            },
        },
    };

    match &outcome {
        RunOutcome::Success => {
            info!(job = %state.name, ?trigger, duration_ms, "job run completed");
        }
        RunOutcome::Failed { error } => {
            error!(job = %state.name, ?trigger, duration_ms, error, "job run failed");
        }
    }

    let record = RunRecord {
        trigger,
        started_at,
        duration_ms,
        outcome,
    };
    state.record(record.clone());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn paused() -> JobOptions {
        JobOptions {
            auto_start: false,
            ..Default::default()
        }
    }

    fn noop() -> JobTask {
        task(|| async { Ok(()) })
    }

    #[tokio::test]
    async fn reregistering_replaces_instead_of_duplicating() {
        let registry = JobRegistry::new();
        registry.register("x", "0 3 * * *", paused(), noop()).unwrap();
        registry.register("x", "30 4 * * *", paused(), noop()).unwrap();

        let jobs = registry.list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "x");
        assert_eq!(jobs[0].expression, "30 4 * * *");
    }

    #[tokio::test]
    async fn reregistering_keeps_original_listing_slot() {
        let registry = JobRegistry::new();
        registry.register("a", "0 1 * * *", paused(), noop()).unwrap();
        registry.register("b", "0 2 * * *", paused(), noop()).unwrap();
        registry.register("a", "0 5 * * *", paused(), noop()).unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn invalid_expression_is_rejected_up_front() {
        let registry = JobRegistry::new();
        let err = registry
            .register("bad", "every tuesday", paused(), noop())
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidSchedule { .. }));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn run_now_executes_and_records() {
        let registry = JobRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        registry
            .register(
                "tick",
                "* * * * *",
                paused(),
                task(move || {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        let record = registry.run_now("tick").await.unwrap();
        assert_eq!(record.outcome, RunOutcome::Success);
        assert_eq!(record.trigger, RunTrigger::Manual);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let history = registry.history("tick").unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn run_now_on_unknown_job_fails() {
        let registry = JobRegistry::new();
        let err = registry.run_now("ghost").await.unwrap_err();
        assert!(matches!(err, JobError::UnknownJob(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn failing_task_stays_registered_and_schedulable() {
        let registry = JobRegistry::new();
        registry
            .register(
                "flaky",
                "* * * * *",
                paused(),
                task(|| async { Err(anyhow::anyhow!("disk on fire")) }),
            )
            .unwrap();

        for _ in 0..2 {
            let record = registry.run_now("flaky").await.unwrap();
            assert!(matches!(record.outcome, RunOutcome::Failed { .. }));
        }

        // Still listed and still eligible for its next tick.
        let jobs = registry.list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].failures, 2);
        assert_eq!(jobs[0].runs, 2);
        registry.start("flaky").unwrap();
        assert!(registry.list()[0].running);
        registry.stop_all();
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_as_failure() {
        let registry = JobRegistry::new();
        let explosive: JobTask =
            Arc::new(|| -> TaskFuture { Box::pin(async { panic!("job blew up") }) });
        registry
            .register("explosive", "* * * * *", paused(), explosive)
            .unwrap();

        let record = registry.run_now("explosive").await.unwrap();
        match record.outcome {
            RunOutcome::Failed { ref error } => assert!(error.contains("panicked")),
            RunOutcome::Success => panic!("panic must surface as a failed run"),
        }
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn stop_and_start_toggle_the_runner() {
        let registry = JobRegistry::new();
        registry
            .register("cleanup", "0 3 * * *", JobOptions::default(), noop())
            .unwrap();
        assert!(registry.list()[0].running);

        registry.stop("cleanup").unwrap();
        assert!(!registry.list()[0].running);

        registry.start("cleanup").unwrap();
        assert!(registry.list()[0].running);

        registry.restart("cleanup").unwrap();
        assert!(registry.list()[0].running);

        assert!(matches!(registry.stop("nope"), Err(JobError::UnknownJob(_))));
        registry.stop_all();
        assert!(!registry.list()[0].running);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let registry = JobRegistry::new();
        registry.register("busy", "* * * * *", paused(), noop()).unwrap();
        for _ in 0..(HISTORY_LIMIT + 10) {
            registry.run_now("busy").await.unwrap();
        }
        let history = registry.history("busy").unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(registry.list()[0].runs, (HISTORY_LIMIT + 10) as u64);
    }
}
