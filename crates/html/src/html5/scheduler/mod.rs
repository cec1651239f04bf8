//! Cooperative yield scheduling for the pump loop.
//!
//! A pump in `AllowYield` mode asks `should_continue_parsing` before every
//! token. Once the pump's budget is spent the scheduler posts a resume task to
//! the host and parsing stops until the host runs it. The armed task is the
//! only way back in: while it is pending no other pump may start.

use core_types::TaskId;
use std::time::{Duration, Instant};

/// Host event loop capability: run something later on the same thread.
pub trait HostScheduler {
    fn post_task(&mut self, delay: Duration) -> TaskId;
    fn cancel_task(&mut self, task: TaskId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynchronousMode {
    /// Run until input or a script stops the pump. Final flush, fragments and
    /// `document.write`.
    ForceSynchronous,
    /// Network-driven parsing; may yield to the host.
    AllowYield,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Wall-clock budget per pump.
    pub time_budget: Duration,
    /// Tokens between wall-clock checks.
    pub check_interval: u32,
    /// Optional hard cap on tokens per pump.
    pub token_budget: Option<u64>,
    /// Delay passed to `HostScheduler::post_task` when yielding.
    pub resume_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_millis(200),
            check_interval: 256,
            token_budget: None,
            resume_delay: Duration::ZERO,
        }
    }
}

/// Per-pump bookkeeping; lives on the stack of one pump.
#[derive(Debug)]
pub struct PumpSession {
    started_at: Instant,
    tokens_since_check: u32,
    tokens_processed: u64,
}

impl PumpSession {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            tokens_since_check: 0,
            tokens_processed: 0,
        }
    }

    pub fn tokens_processed(&self) -> u64 {
        self.tokens_processed
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for PumpSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub yields: u64,
    pub resumes: u64,
    pub stale_tasks: u64,
    pub cancelled: u64,
}

pub struct ParserScheduler {
    config: SchedulerConfig,
    host: Box<dyn HostScheduler>,
    pending: Option<TaskId>,
    stats: SchedulerStats,
}

impl ParserScheduler {
    pub fn new(config: SchedulerConfig, host: Box<dyn HostScheduler>) -> Self {
        assert!(
            config.check_interval > 0,
            "SchedulerConfig::check_interval must be non-zero"
        );
        Self {
            config,
            host,
            pending: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Budget check before fetching the next token.
    ///
    /// Returns false (and arms the resume task) once the budget is spent. A
    /// pump always gets at least one token so yielding cannot livelock.
    pub fn should_continue_parsing(&mut self, session: &mut PumpSession) -> bool {
        assert!(
            self.pending.is_none(),
            "ParserScheduler::should_continue_parsing called while a resume is scheduled"
        );
        if session.tokens_processed > 0 && self.budget_exhausted(session) {
            self.schedule_resume(session);
            return false;
        }
        session.tokens_processed = session.tokens_processed.saturating_add(1);
        true
    }

    fn budget_exhausted(&self, session: &mut PumpSession) -> bool {
        if let Some(budget) = self.config.token_budget
            && session.tokens_processed >= budget
        {
            return true;
        }
        session.tokens_since_check += 1;
        if session.tokens_since_check < self.config.check_interval {
            return false;
        }
        session.tokens_since_check = 0;
        session.elapsed() >= self.config.time_budget
    }

    fn schedule_resume(&mut self, session: &PumpSession) {
        let task = self.host.post_task(self.config.resume_delay);
        self.pending = Some(task);
        self.stats.yields = self.stats.yields.saturating_add(1);
        log::debug!(
            target: "html5.scheduler",
            "yield after {} tokens in {:?}; resume task {task:?}",
            session.tokens_processed,
            session.elapsed()
        );
    }

    pub fn is_scheduled_for_resume(&self) -> bool {
        self.pending.is_some()
    }

    /// The host ran `task`. True if it is the armed resume task, which is then
    /// disarmed; stale or foreign tasks are ignored.
    pub fn task_fired(&mut self, task: TaskId) -> bool {
        if self.pending == Some(task) {
            self.pending = None;
            self.stats.resumes = self.stats.resumes.saturating_add(1);
            return true;
        }
        self.stats.stale_tasks = self.stats.stale_tasks.saturating_add(1);
        log::debug!(target: "html5.scheduler", "ignoring stale task {task:?}");
        false
    }

    /// Cancel the armed resume task, if any.
    pub fn stop(&mut self) {
        if let Some(task) = self.pending.take() {
            self.host.cancel_task(task);
            self.stats.cancelled = self.stats.cancelled.saturating_add(1);
            log::debug!(target: "html5.scheduler", "cancelled resume task {task:?}");
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

impl Drop for ParserScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests;
