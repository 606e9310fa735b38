//! Trading strategies: per-good traders and the pools that run them.
//!
//! A `Trader` owns a small schedule of its own (bid refresh, purchase
//! attempt) and a strategy that decides what an attempt does. Both strategy
//! families share the bid logic in `TraderCore`; they differ only in what
//! happens around a purchase.

pub mod buyer;
pub mod config;
pub mod flipper;
pub mod pool;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::TradingContext;
use crate::engine::scheduler::{TaskRunner, TaskScheduler};
use crate::pricing::ladder;
use crate::types::{GoodDefinition, Price, PriceTarget};
use buyer::Buyer;
use config::{BidPolicy, StrategyConfig, TraderConfig};
use flipper::Flipper;

/// Seconds between bid refreshes.
pub const BID_REFRESH_SECS: u64 = 1200;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraderState {
    Active,
    Paused,
    /// Single purchase made.
    Done,
    /// Purchase quantity reached.
    Complete,
}

impl TraderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TraderState::Done | TraderState::Complete)
    }

    /// One-letter form for status tables.
    pub fn letter(self) -> char {
        match self {
            TraderState::Active => 'A',
            TraderState::Paused => 'P',
            TraderState::Done => 'D',
            TraderState::Complete => 'C',
        }
    }
}

impl fmt::Display for TraderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraderState::Active => write!(f, "active"),
            TraderState::Paused => write!(f, "paused"),
            TraderState::Done => write!(f, "done"),
            TraderState::Complete => write!(f, "complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared trader state
// ---------------------------------------------------------------------------

/// What every trader tracks regardless of strategy.
pub struct TraderCore {
    pub ctx: Arc<TradingContext>,
    pub good: GoodDefinition,
    pub config: TraderConfig,
    /// `"B Harry Striker"`, used as the log prefix.
    pub name: String,
    pub state: TraderState,
    /// Current bid; 0 means there is nothing worth bidding on.
    pub bid: Price,
    /// Last discovered market price; 0 when unknown.
    pub market_price: Price,
    pub attempts: u32,
}

impl TraderCore {
    pub fn new(ctx: Arc<TradingContext>, good: GoodDefinition, config: TraderConfig, tag: char) -> Self {
        let name = format!("{tag} {}", good.short_name(24));
        Self {
            ctx,
            good,
            config,
            name,
            state: TraderState::Active,
            bid: 0,
            market_price: 0,
            attempts: 0,
        }
    }

    pub fn resource_id(&self) -> u64 {
        self.good.resource_id
    }

    pub fn price_target(&self) -> PriceTarget {
        PriceTarget::from(&self.good)
    }

    /// Move to `new`, logging the reason. Same state is a no-op; terminal
    /// states are never left.
    pub fn set_state(&mut self, new: TraderState, reason: &str) {
        if self.state == new {
            return;
        }
        if self.state.is_terminal() {
            debug!(trader = %self.name, state = %self.state, "Terminal state, ignoring change");
            return;
        }
        if reason.is_empty() {
            warn!(trader = %self.name, "State change: {} -> {}", self.state, new);
        } else {
            warn!(trader = %self.name, "State change: {} -> {} ({reason})", self.state, new);
        }
        self.state = new;
    }

    /// Recompute the bid.
    ///
    /// Flexible bids follow the market: the discounted market price, capped
    /// by the configured ceiling, and never below one step over the item's
    /// discard value. An empty market zeroes both bid and market price.
    pub async fn refresh_bid(&mut self) -> Result<()> {
        let ceiling = match self.config.bid {
            BidPolicy::Fixed(bid) => {
                self.bid = bid;
                return Ok(());
            }
            BidPolicy::Flexible { ceiling } => ceiling,
        };

        let estimate = self.ctx.market.discover_price(self.price_target()).await?;
        match &estimate.listing {
            None => {
                self.bid = 0;
                self.market_price = 0;
            }
            Some(listing) => {
                self.market_price = listing.buy_now_price;
                let discounted =
                    ladder::round(Decimal::from(self.market_price) * self.config.discount);
                let adjusted = match ceiling {
                    Some(c) => c.min(discounted),
                    None => discounted,
                };
                let lowest = ladder::step(listing.discard_value, 1);
                self.bid = lowest.max(adjusted);
            }
        }
        info!(
            trader = %self.name,
            bid = self.bid,
            mp = self.market_price,
            seen = %estimate.samples_str(),
            "Bid refreshed"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Strategy dispatch
// ---------------------------------------------------------------------------

/// What a strategy family does on each attempt.
#[async_trait]
pub trait TradeStrategy: Send {
    async fn attempt(&mut self, core: &mut TraderCore) -> Result<()>;

    /// Strategy-specific status summary.
    fn status(&self, core: &TraderCore) -> String;

    /// One-letter family tag.
    fn tag(&self) -> char;
}

pub enum Strategy {
    Buyer(Buyer),
    Flipper(Flipper),
}

#[async_trait]
impl TradeStrategy for Strategy {
    async fn attempt(&mut self, core: &mut TraderCore) -> Result<()> {
        match self {
            Strategy::Buyer(b) => b.attempt(core).await,
            Strategy::Flipper(f) => f.attempt(core).await,
        }
    }

    fn status(&self, core: &TraderCore) -> String {
        match self {
            Strategy::Buyer(b) => b.status(core),
            Strategy::Flipper(f) => f.status(core),
        }
    }

    fn tag(&self) -> char {
        match self {
            Strategy::Buyer(b) => b.tag(),
            Strategy::Flipper(f) => f.tag(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraderTask {
    RefreshBid,
    Attempt,
}

/// A trader's state as seen by its own scheduler during one tick.
struct Turn<'a> {
    core: &'a mut TraderCore,
    strategy: &'a mut Strategy,
}

#[async_trait]
impl<'a> TaskRunner<TraderTask> for Turn<'a> {
    async fn run_task(&mut self, task: TraderTask) -> Result<()> {
        match task {
            TraderTask::RefreshBid => self.core.refresh_bid().await,
            TraderTask::Attempt => self.strategy.attempt(self.core).await,
        }
    }
}

/// One strategy instance working one good.
pub struct Trader {
    schedule: TaskScheduler<TraderTask>,
    core: TraderCore,
    strategy: Strategy,
}

impl Trader {
    pub fn new(ctx: Arc<TradingContext>, good: GoodDefinition, config: TraderConfig) -> Self {
        let strategy = match config.strategy {
            StrategyConfig::Buyer { quantity } => Strategy::Buyer(Buyer::new(quantity)),
            StrategyConfig::Flipper {
                max_flips,
                sell_for,
            } => Strategy::Flipper(Flipper::new(max_flips, sell_for)),
        };
        let mut schedule = TaskScheduler::new(ctx.clock.clone());
        schedule.register(TraderTask::RefreshBid, BID_REFRESH_SECS, 0);
        schedule.register(TraderTask::Attempt, config.interval, 0);
        let core = TraderCore::new(ctx, good, config, strategy.tag());
        Self {
            schedule,
            core,
            strategy,
        }
    }

    /// Run whatever is due on this trader's schedule. A trader in a
    /// terminal state does nothing.
    pub async fn run(&mut self) -> Result<()> {
        if self.core.state.is_terminal() {
            return Ok(());
        }
        let mut turn = Turn {
            core: &mut self.core,
            strategy: &mut self.strategy,
        };
        self.schedule.tick(&mut turn).await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn state(&self) -> TraderState {
        self.core.state
    }

    pub fn bid(&self) -> Price {
        self.core.bid
    }

    pub fn market_price(&self) -> Price {
        self.core.market_price
    }

    pub fn attempts(&self) -> u32 {
        self.core.attempts
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn config(&self) -> &TraderConfig {
        &self.core.config
    }

    /// `"<state letter> <status>"` line for the periodic report.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.core.state.letter(), self.strategy.status(&self.core))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
