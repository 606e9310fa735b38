//! Cooperative interval scheduler.
//!
//! A registry of named tasks, each with an interval and an optional start
//! delay. `tick` walks the tasks in registration order and runs the ones
//! whose interval has strictly elapsed since their previous run. Nothing
//! runs in parallel: a slow task simply delays the ones after it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::clock::Clock;

/// Something that knows how to perform the tasks keyed by `K`.
///
/// Owners usually keep their scheduler in one field and the state the tasks
/// act on in another, then pass the latter here.
#[async_trait]
pub trait TaskRunner<K>: Send
where
    K: Send + 'static,
{
    async fn run_task(&mut self, task: K) -> Result<()>;
}

#[derive(Debug)]
struct ScheduledTask<K> {
    key: K,
    interval: Duration,
    /// `None` until the first run; a start delay pre-seeds it so the first
    /// run lands `delay` after registration.
    last_run: Option<DateTime<Utc>>,
}

impl<K> ScheduledTask<K> {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now - last > self.interval,
        }
    }
}

pub struct TaskScheduler<K> {
    clock: Arc<dyn Clock>,
    tasks: Vec<ScheduledTask<K>>,
}

impl<K> TaskScheduler<K>
where
    K: Copy + PartialEq + Debug + Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
        }
    }

    /// Add a task. With `delay_secs == 0` it is eligible on the next tick,
    /// otherwise first strictly after `delay_secs` from now.
    pub fn register(&mut self, key: K, interval_secs: u64, delay_secs: u64) {
        let interval = Duration::seconds(interval_secs as i64);
        let last_run = if delay_secs == 0 {
            None
        } else {
            Some(self.clock.now() - interval + Duration::seconds(delay_secs as i64))
        };
        debug!(task = ?key, interval_secs, delay_secs, "Task registered");
        self.tasks.push(ScheduledTask {
            key,
            interval,
            last_run,
        });
    }

    /// Run every due task once, in registration order. Returns how many ran.
    ///
    /// The run timestamp is taken after the task finishes. A task error
    /// aborts the tick; the failed task keeps its previous timestamp.
    pub async fn tick<R>(&mut self, runner: &mut R) -> Result<usize>
    where
        R: TaskRunner<K> + ?Sized,
    {
        let mut ran = 0;
        for task in self.tasks.iter_mut() {
            if !task.is_due(self.clock.now()) {
                continue;
            }
            trace!(task = ?task.key, "Running scheduled task");
            runner.run_task(task.key).await?;
            task.last_run = Some(self.clock.now());
            ran += 1;
        }
        Ok(ran)
    }

    /// Replace a task's interval, returning the previous one in seconds.
    pub fn reset_interval(&mut self, key: K, interval_secs: u64) -> Option<u64> {
        let task = self.tasks.iter_mut().find(|t| t.key == key)?;
        let old = task.interval.num_seconds() as u64;
        task.interval = Duration::seconds(interval_secs as i64);
        debug!(task = ?key, old, new = interval_secs, "Task interval reset");
        Some(old)
    }

    /// Current interval of a task in seconds.
    pub fn interval(&self, key: K) -> Option<u64> {
        self.tasks
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.interval.num_seconds() as u64)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
