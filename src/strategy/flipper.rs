//! Flipper: buy below market and relist at market.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{TradeStrategy, TraderCore, TraderState};
use crate::pricing::ladder;
use crate::types::Price;

pub struct Flipper {
    /// Resale listings of the good allowed at once.
    max_flips: usize,
    /// Never relist below this.
    sell_for: Option<Price>,
    flips: u32,
}

impl Flipper {
    pub fn new(max_flips: usize, sell_for: Option<Price>) -> Self {
        Self {
            max_flips,
            sell_for,
            flips: 0,
        }
    }

    pub fn flips(&self) -> u32 {
        self.flips
    }

    /// Relist price: the floor (`sell_for`, else the market price the bid
    /// was based on) or the current market price, whichever is higher. With
    /// neither known, one step over what was paid.
    fn relist_price(&self, last_market: Price, current_market: Price, paid: Price) -> Price {
        let floor = self.sell_for.unwrap_or(last_market);
        match floor.max(current_market) {
            0 => ladder::step(paid, 1),
            price => price,
        }
    }
}

#[async_trait]
impl TradeStrategy for Flipper {
    async fn attempt(&mut self, core: &mut TraderCore) -> Result<()> {
        if core.bid == 0 {
            core.set_state(TraderState::Paused, "nothing in market");
            return Ok(());
        }

        let ctx = core.ctx.clone();
        let listed = ctx.resale.listed_count(core.resource_id()).await?;
        if listed >= self.max_flips {
            core.set_state(
                TraderState::Paused,
                &format!("{listed} active flips. {} max", self.max_flips),
            );
            return Ok(());
        }

        if let Some(sell_for) = self.sell_for {
            if sell_for < core.bid {
                core.set_state(
                    TraderState::Paused,
                    &format!("sellfor ({sell_for}) is less than bid ({})", core.bid),
                );
                return Ok(());
            }
        }

        core.set_state(TraderState::Active, "");
        core.attempts += 1;
        let Some(won) = ctx.market.buy_now(core.resource_id(), core.bid).await? else {
            return Ok(());
        };

        let current = ctx
            .market
            .discover_price(core.price_target())
            .await?
            .price()
            .unwrap_or(0);
        let price = self.relist_price(core.market_price, current, won.buy_now_price);
        let trade_id = ctx.market.sell(won.item_id, price).await?;
        ctx.resale.invalidate().await;
        self.flips += 1;
        info!(
            trader = %core.name,
            item_id = won.item_id,
            paid = won.buy_now_price,
            current_mp = current,
            price,
            listed = trade_id.is_some(),
            "Flipped"
        );
        Ok(())
    }

    fn status(&self, core: &TraderCore) -> String {
        format!(
            "bid={} mp={} atps={} flips={}",
            core.bid, core.market_price, core.attempts, self.flips
        )
    }

    fn tag(&self) -> char {
        'F'
    }
}
