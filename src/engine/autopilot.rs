//! The top-level trading loop.
//!
//! Every tick: advance the pilot's own maintenance schedule, then the buyer
//! pool, then the flipper pool. Everything runs on one task; a slow remote
//! call simply delays whatever comes after it.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::maintenance::Maintenance;
use super::scheduler::{TaskRunner, TaskScheduler};
use crate::config::{AutoPilotConfig, TaskTiming};
use crate::context::TradingContext;
use crate::error::PilotError;
use crate::strategy::pool::TraderPool;
use crate::strategy::TraderState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PilotTask {
    Status,
    RefreshResaleQueue,
    Packs,
    CheckTraders,
}

/// Everything the pilot's own tasks act on.
pub struct Pilot {
    ctx: Arc<TradingContext>,
    config: AutoPilotConfig,
    pub buyers: TraderPool,
    pub flippers: TraderPool,
    maintenance: Maintenance,
    round: u64,
}

impl Pilot {
    /// Log the balance and enforce the floor.
    async fn status(&self) -> Result<()> {
        let balance = self.ctx.session.balance().await?;
        info!(
            round = self.round,
            balance,
            buyers_active = self.buyers.count_in(TraderState::Active),
            flippers_enabled = self.flippers.is_enabled(),
            "Status"
        );
        if balance < self.config.min_balance {
            error!(balance, floor = self.config.min_balance, "Balance below floor, shutting down");
            return Err(PilotError::BalanceBelowFloor {
                balance,
                floor: self.config.min_balance,
            }
            .into());
        }
        Ok(())
    }

    /// Keep flippers out of the way while enough buyers are working.
    fn check_traders(&mut self) {
        let active = self.buyers.count_in(TraderState::Active);
        if active >= self.config.flipper_pause_threshold {
            self.flippers.disable();
        } else {
            self.flippers.enable();
        }
    }
}

#[async_trait]
impl TaskRunner<PilotTask> for Pilot {
    async fn run_task(&mut self, task: PilotTask) -> Result<()> {
        match task {
            PilotTask::Status => self.status().await,
            PilotTask::RefreshResaleQueue => self.maintenance.refresh_resale_queue().await,
            PilotTask::Packs => self.maintenance.packs().await.map(|_| ()),
            PilotTask::CheckTraders => {
                self.check_traders();
                Ok(())
            }
        }
    }
}

pub struct AutoPilot {
    schedule: TaskScheduler<PilotTask>,
    pilot: Pilot,
}

impl AutoPilot {
    pub fn new(
        ctx: Arc<TradingContext>,
        config: AutoPilotConfig,
        buyers: TraderPool,
        flippers: TraderPool,
        maintenance: Maintenance,
    ) -> Self {
        let mut schedule = TaskScheduler::new(ctx.clock.clone());
        let tasks = &config.tasks;
        let wanted: [(PilotTask, Option<TaskTiming>); 4] = [
            (PilotTask::Status, tasks.status),
            (PilotTask::RefreshResaleQueue, tasks.refresh_resale_queue),
            (PilotTask::Packs, tasks.packs),
            (PilotTask::CheckTraders, tasks.check_traders),
        ];
        for (task, timing) in wanted {
            if let Some(t) = timing {
                schedule.register(task, t.interval, t.delay);
            }
        }
        info!(
            tasks = schedule.len(),
            buyers = buyers.traders().len(),
            flippers = flippers.traders().len(),
            "Autopilot ready"
        );
        Self {
            schedule,
            pilot: Pilot {
                ctx,
                config,
                buyers,
                flippers,
                maintenance,
                round: 0,
            },
        }
    }

    /// One round: pilot tasks, buyers, flippers.
    pub async fn tick(&mut self) -> Result<()> {
        self.pilot.round += 1;
        self.schedule.tick(&mut self.pilot).await?;
        self.pilot.buyers.run().await?;
        self.pilot.flippers.run().await?;
        Ok(())
    }

    /// Tick until Ctrl-C or the first error.
    pub async fn run(&mut self) -> Result<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(self.pilot.config.tick_secs));
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(tick_secs = self.pilot.config.tick_secs, "Entering main loop. Press Ctrl+C to stop.");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await?;
                }
                _ = &mut shutdown => {
                    info!(round = self.pilot.round, "Shutdown signal received.");
                    return Ok(());
                }
            }
        }
    }

    pub fn round(&self) -> u64 {
        self.pilot.round
    }

    pub fn pilot(&self) -> &Pilot {
        &self.pilot
    }

    pub fn task_count(&self) -> usize {
        self.schedule.len()
    }
}
