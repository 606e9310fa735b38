//! A set of traders driven by one JSON pool file.
//!
//! The file is re-read when its modification time moves forward, so
//! targets can be added, removed or retuned while the agent runs. A reload
//! builds the complete new set before swapping it in; a file that fails to
//! load leaves the running traders untouched.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

use super::config::{PoolFile, TraderConfig};
use super::{Trader, TraderState};
use crate::context::TradingContext;
use crate::engine::scheduler::{TaskRunner, TaskScheduler};
use crate::error::TraderConfigError;
use crate::storage;

pub const STATUS_INTERVAL_SECS: u64 = 1200;
pub const RELOAD_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolTask {
    Status,
    ReloadConfig,
}

/// Everything the pool's own tasks act on.
struct Members {
    name: String,
    ctx: Arc<TradingContext>,
    path: Option<PathBuf>,
    traders: Vec<Trader>,
    enabled: bool,
    last_modified: Option<SystemTime>,
}

impl Members {
    fn log_status(&self) {
        for t in &self.traders {
            info!(pool = %self.name, trader = %t.name(), "{}", t.status_line());
        }
    }

    async fn reload_if_changed(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let mtime = match storage::last_modified(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(pool = %self.name, error = %e, "Pool file not readable, keeping traders");
                return Ok(());
            }
        };
        if self.last_modified.is_some_and(|seen| mtime <= seen) {
            return Ok(());
        }

        let age = SystemTime::now()
            .duration_since(mtime)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        info!(pool = %self.name, path = %path.display(), age_secs = age, "Reloading pool file");
        // a broken file is reported once; the next edit bumps the time again
        self.last_modified = Some(mtime);
        match build_traders(&self.name, &path, &self.ctx) {
            Ok(traders) => {
                self.traders = traders;
            }
            Err(e) => {
                error!(pool = %self.name, error = %e, "Pool reload failed, keeping current traders");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRunner<PoolTask> for Members {
    async fn run_task(&mut self, task: PoolTask) -> Result<()> {
        match task {
            PoolTask::Status => {
                self.log_status();
                Ok(())
            }
            PoolTask::ReloadConfig => self.reload_if_changed().await,
        }
    }
}

/// Load a pool file into traders. Invalid entries and unknown goods are
/// logged and skipped; only an unreadable or malformed file is an error.
fn build_traders(pool: &str, path: &Path, ctx: &Arc<TradingContext>) -> Result<Vec<Trader>> {
    let file: PoolFile = storage::load_json(path)?;
    let mut traders = Vec::new();
    for (family, defaults, entry) in file.entries() {
        let config = match TraderConfig::from_entry(family, defaults, entry) {
            Ok(c) => c,
            Err(e) => {
                error!(pool, error = %e, "Invalid trader entry, skipped");
                continue;
            }
        };
        let Some(good) = ctx.catalog.resolve(config.resource_id) else {
            let e = TraderConfigError::UnknownGood {
                rid: config.resource_id,
            };
            error!(pool, error = %e, "Invalid trader entry, skipped");
            continue;
        };
        traders.push(Trader::new(ctx.clone(), good, config));
    }

    info!(pool, count = traders.len(), "Traders initialized");
    for t in &traders {
        info!(pool, trader = %t.name(), config = %t.config(), "Trader");
    }
    Ok(traders)
}

/// Traders from one pool file plus the pool's own schedule.
pub struct TraderPool {
    schedule: TaskScheduler<PoolTask>,
    members: Members,
}

impl TraderPool {
    /// Build a pool from `path`. Fails when the file cannot be loaded.
    pub fn load(name: &str, path: impl AsRef<Path>, ctx: Arc<TradingContext>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_modified = storage::last_modified(&path)?;
        let traders = build_traders(name, &path, &ctx)?;
        let mut pool = Self::with_members(name, ctx, Some(path), traders);
        pool.members.last_modified = Some(last_modified);
        pool.schedule
            .register(PoolTask::ReloadConfig, RELOAD_INTERVAL_SECS, RELOAD_INTERVAL_SECS);
        Ok(pool)
    }

    /// A pool with no file and no traders.
    pub fn empty(name: &str, ctx: Arc<TradingContext>) -> Self {
        Self::with_members(name, ctx, None, Vec::new())
    }

    fn with_members(
        name: &str,
        ctx: Arc<TradingContext>,
        path: Option<PathBuf>,
        traders: Vec<Trader>,
    ) -> Self {
        let mut schedule = TaskScheduler::new(ctx.clock.clone());
        schedule.register(PoolTask::Status, STATUS_INTERVAL_SECS, 0);
        Self {
            schedule,
            members: Members {
                name: name.to_string(),
                ctx,
                path,
                traders,
                enabled: true,
                last_modified: None,
            },
        }
    }

    /// Advance every non-terminal trader (when enabled), then the pool's
    /// own tasks.
    pub async fn run(&mut self) -> Result<()> {
        if self.members.enabled {
            for trader in self.members.traders.iter_mut() {
                if !trader.state().is_terminal() {
                    trader.run().await?;
                }
            }
        }
        self.schedule.tick(&mut self.members).await?;
        Ok(())
    }

    pub fn enable(&mut self) {
        if !self.members.enabled {
            warn!(pool = %self.members.name, "Pool enabled");
            self.members.enabled = true;
        }
    }

    pub fn disable(&mut self) {
        if self.members.enabled {
            warn!(pool = %self.members.name, "Pool disabled");
            self.members.enabled = false;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.members.enabled
    }

    pub fn name(&self) -> &str {
        &self.members.name
    }

    pub fn traders(&self) -> &[Trader] {
        &self.members.traders
    }

    pub fn count_in(&self, state: TraderState) -> usize {
        self.members
            .traders
            .iter()
            .filter(|t| t.state() == state)
            .count()
    }

    /// Log every trader's status line now.
    pub fn log_status(&self) {
        self.members.log_status();
    }

    /// Run the reload check now instead of waiting for the schedule.
    pub async fn reload_if_changed(&mut self) -> Result<()> {
        self.members.reload_if_changed().await
    }
}
