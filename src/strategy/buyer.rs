//! Buyer: acquire a good at or below the bid and keep it.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::{TradeStrategy, TraderCore, TraderState};
use crate::types::Price;

pub struct Buyer {
    /// Items to buy before stopping; `None` stops after the first.
    quantity: Option<u32>,
    bought: u32,
    last_paid: Option<Price>,
}

impl Buyer {
    pub fn new(quantity: Option<u32>) -> Self {
        Self {
            quantity,
            bought: 0,
            last_paid: None,
        }
    }

    pub fn bought(&self) -> u32 {
        self.bought
    }

    pub fn last_paid(&self) -> Option<Price> {
        self.last_paid
    }
}

#[async_trait]
impl TradeStrategy for Buyer {
    async fn attempt(&mut self, core: &mut TraderCore) -> Result<()> {
        if core.bid == 0 {
            core.set_state(TraderState::Paused, "nothing in market");
            return Ok(());
        }

        core.set_state(TraderState::Active, "");
        core.attempts += 1;
        let ctx = core.ctx.clone();
        let Some(won) = ctx.market.buy_now(core.resource_id(), core.bid).await? else {
            return Ok(());
        };

        let item_id = won.item_id;
        let unassigned = ctx.session.unassigned().await?;
        let paid = unassigned
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.last_sale_price)
            .filter(|p| *p > 0)
            .unwrap_or(won.buy_now_price);
        self.last_paid = Some(paid);
        self.bought += 1;

        let duplicates = ctx.session.duplicates().await?;
        if duplicates.contains(&item_id) {
            if ctx.session.send_to_resale_queue(item_id).await? {
                ctx.resale.invalidate().await;
            } else {
                warn!(trader = %core.name, item_id, "Could not move duplicate to resale queue");
            }
        } else if !ctx.session.send_to_club(item_id).await? {
            warn!(trader = %core.name, item_id, "Could not move item to club");
        }
        info!(
            trader = %core.name,
            item_id,
            paid,
            bought = self.bought,
            duplicate = duplicates.contains(&item_id),
            "Bought"
        );

        match self.quantity {
            None => core.set_state(TraderState::Done, "bought"),
            Some(target) if self.bought >= target => {
                core.set_state(TraderState::Complete, &format!("bought {target}"))
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn status(&self, core: &TraderCore) -> String {
        let target = self
            .quantity
            .map_or_else(|| "1".to_string(), |q| q.to_string());
        let paid = self
            .last_paid
            .map_or_else(|| "na".to_string(), |p| p.to_string());
        format!(
            "bid={} mp={} atps={} bought={}/{} paid={}",
            core.bid, core.market_price, core.attempts, self.bought, target, paid
        )
    }

    fn tag(&self) -> char {
        'B'
    }
}
