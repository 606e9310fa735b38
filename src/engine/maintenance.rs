//! Account housekeeping: the resale queue, pack openings and price reports.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CardAction, PacksConfig};
use crate::context::TradingContext;
use crate::pricing::ladder;
use crate::types::{Item, MarketEstimate, Price, PriceTarget, TradeState};

/// What to do with an unassigned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triage {
    Keep,
    Discard,
    Redeem,
    Sell(Price),
    /// Leave it for the operator.
    Review,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriageReport {
    pub kept: usize,
    pub discarded: usize,
    pub redeemed: usize,
    pub sold: usize,
    pub review: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacksReport {
    pub opened: usize,
    pub balance_before: u64,
    pub balance_after: u64,
}

pub struct Maintenance {
    ctx: Arc<TradingContext>,
    packs: PacksConfig,
}

impl Maintenance {
    pub fn new(ctx: Arc<TradingContext>, packs: PacksConfig) -> Self {
        Self { ctx, packs }
    }

    /// Collect sold listings and relist expired ones.
    pub async fn refresh_resale_queue(&self) -> Result<()> {
        let queue = self.ctx.resale.refresh().await?;
        let sold: Vec<&Item> = queue
            .iter()
            .filter(|i| i.trade_state == Some(TradeState::Closed))
            .collect();
        if !sold.is_empty() {
            let total: Price = sold.iter().map(|i| i.current_bid).sum();
            let cleared = self.ctx.session.clear_sold().await?;
            info!(count = sold.len(), total, cleared, "Sold listings collected");
        }

        let expired = queue
            .iter()
            .filter(|i| i.trade_state == Some(TradeState::Expired))
            .count();
        if expired > 0 {
            let relisted = self.ctx.session.relist_expired().await?;
            info!(expired, relisted = relisted.len(), "Expired listings relisted");
        }
        self.ctx.resale.invalidate().await;
        Ok(())
    }

    /// Open packs while the resale queue has room, triaging the contents of
    /// each before opening the next.
    pub async fn packs(&self) -> Result<PacksReport> {
        let session = &self.ctx.session;
        let mut report = PacksReport {
            balance_before: session.balance().await?,
            ..PacksReport::default()
        };

        while report.opened < self.packs.max_per_run {
            self.refresh_resale_queue().await?;

            let vacancy = self.ctx.resale.vacancy().await?;
            info!(vacancy, "Open spots on the resale queue");
            if vacancy < self.packs.min_vacancy {
                warn!(vacancy, "Resale queue nearly full, not buying packs");
                break;
            }
            let bronze = self.bronze_listed().await?;
            if bronze >= self.packs.max_bronze_listed {
                warn!(bronze, "Too many bronze cards on the resale queue, not buying packs");
                break;
            }

            if session.unassigned().await?.is_empty() {
                info!(pack_id = self.packs.pack_id, "Buying a pack");
                session.buy_pack(self.packs.pack_id).await?;
                report.opened += 1;
            }
            let triage = self.triage_unassigned().await?;
            info!(?triage, "Pack triaged");

            if !session.unassigned().await?.is_empty() {
                warn!("Unassigned items need attention, no more packs until they are cleared");
                break;
            }
        }

        report.balance_after = session.balance().await?;
        info!(
            before = report.balance_before,
            after = report.balance_after,
            profit = report.balance_after as i64 - report.balance_before as i64,
            opened = report.opened,
            "Packs done"
        );
        Ok(report)
    }

    /// Bronze players on the resale queue, listed or not.
    async fn bronze_listed(&self) -> Result<usize> {
        Ok(self
            .ctx
            .resale
            .all()
            .await?
            .iter()
            .filter(|i| i.is_player() && i.rating <= self.packs.bronze_max_rating)
            .count())
    }

    /// Decide on and act on every unassigned item.
    pub async fn triage_unassigned(&self) -> Result<TriageReport> {
        let session = &self.ctx.session;
        let mut items = session.unassigned().await?;
        items.sort_by(|a, b| a.item_type.cmp(&b.item_type));
        let duplicates = session.duplicates().await?;
        info!(count = items.len(), "Processing unassigned items");

        let mut report = TriageReport::default();
        for item in &items {
            let duplicate = duplicates.contains(&item.id);
            let (action, estimate) = self.decide(item, duplicate).await?;
            info!(
                item_id = item.id,
                rid = item.resource_id,
                item_type = %item.item_type,
                rating = item.rating,
                ?action,
                mp = estimate.price().unwrap_or(0),
                seen = %estimate.samples_str(),
                "Triage"
            );
            match action {
                Triage::Keep => {
                    if session.send_to_club(item.id).await? {
                        report.kept += 1;
                    } else {
                        report.review += 1;
                    }
                }
                Triage::Discard => {
                    if session.discard(item.id).await? {
                        report.discarded += 1;
                    } else {
                        report.review += 1;
                    }
                }
                Triage::Redeem => {
                    if session.redeem(item.id).await? {
                        report.redeemed += 1;
                    } else {
                        report.review += 1;
                    }
                }
                Triage::Sell(price) => match self.ctx.market.sell(item.id, price).await? {
                    Some(_) => report.sold += 1,
                    None => report.review += 1,
                },
                Triage::Review => report.review += 1,
            }
        }
        self.ctx.resale.invalidate().await;
        Ok(report)
    }

    async fn decide(&self, item: &Item, duplicate: bool) -> Result<(Triage, MarketEstimate)> {
        if let Some(action) = self.decide_by_type(item, duplicate) {
            return Ok((action, MarketEstimate::default()));
        }

        let estimate = self.ctx.market.discover_price(PriceTarget::from(item)).await?;
        let action = match (estimate.price(), duplicate) {
            // nobody is selling it: a duplicate is only worth its discard value
            (None, true) => Triage::Discard,
            (None, false) => Triage::Keep,
            (Some(price), true) => Triage::Sell(price),
            (Some(price), false) => {
                let asking = if item.rare_flag == 0 {
                    self.packs.common_threshold
                } else {
                    self.packs.rare_threshold
                };
                if price > asking && !self.in_sbc_league(item) {
                    Triage::Sell(price)
                } else {
                    Triage::Keep
                }
            }
        };
        Ok((action, estimate))
    }

    /// Non-player rules. `None` means the item is a player to be priced.
    fn decide_by_type(&self, item: &Item, duplicate: bool) -> Option<Triage> {
        let packs = &self.packs;
        if packs.keep_types.contains(&item.item_type) {
            return Some(Triage::Keep);
        }
        if packs.discard_types.contains(&item.item_type) {
            return Some(Triage::Discard);
        }
        if let Some(rule) = packs
            .card_rules
            .iter()
            .find(|r| r.matches(&item.item_type, item.card_type))
        {
            return Some(match (rule.action, rule.price) {
                (CardAction::Keep, _) => Triage::Keep,
                (CardAction::Discard, _) => Triage::Discard,
                (CardAction::Redeem, _) => Triage::Redeem,
                (CardAction::Sell, Some(price)) => Triage::Sell(price),
                (CardAction::Sell, None) => Triage::Review,
            });
        }
        if packs.keep_unless_duplicate_types.contains(&item.item_type) {
            return Some(if duplicate { Triage::Discard } else { Triage::Keep });
        }
        if item.is_player() {
            None
        } else {
            Some(Triage::Review)
        }
    }

    fn in_sbc_league(&self, item: &Item) -> bool {
        item.league_id
            .and_then(|id| self.ctx.catalog.league_abbr(id))
            .is_some_and(|abbr| self.packs.sbc_leagues.contains(&abbr))
    }

    /// Discover the market price of every unlisted player on the resale
    /// queue, most valuable first, and optionally list them at it.
    pub async fn price_listed(&self, sell: bool) -> Result<Vec<(Item, MarketEstimate)>> {
        let mut targets: Vec<Item> = self
            .ctx
            .resale
            .refresh()
            .await?
            .into_iter()
            .filter(|i| i.is_player() && i.trade_state.is_none())
            .collect();
        targets.sort_by(|a, b| b.discard_value.cmp(&a.discard_value));

        let mut priced = Vec::with_capacity(targets.len());
        for item in targets {
            let estimate = self.ctx.market.discover_price(PriceTarget::from(&item)).await?;
            info!(
                item_id = item.id,
                rid = item.resource_id,
                rating = item.rating,
                mp = estimate.price().unwrap_or(0),
                seen = %estimate.samples_str(),
                "Priced"
            );
            if sell {
                if let Some(price) = estimate.price() {
                    self.list(&item, price).await?;
                }
            }
            priced.push((item, estimate));
        }
        self.ctx.resale.invalidate().await;
        Ok(priced)
    }

    /// Clear unlisted items off the resale queue: players are listed at
    /// market price, everything else goes back to the club.
    pub async fn cleanup(&self) -> Result<usize> {
        let inactive = self.ctx.resale.refresh().await?;
        let mut handled = 0;
        for item in inactive.iter().filter(|i| i.trade_state.is_none()) {
            if !item.is_player() {
                if self.ctx.session.send_to_club(item.id).await? {
                    handled += 1;
                }
                continue;
            }
            let estimate = self.ctx.market.discover_price(PriceTarget::from(item)).await?;
            match estimate.price() {
                Some(price) => {
                    self.list(item, price).await?;
                    handled += 1;
                }
                None => warn!(item_id = item.id, rid = item.resource_id, "No market price, left unlisted"),
            }
        }
        self.ctx.resale.invalidate().await;
        info!(handled, "Resale queue cleaned up");
        Ok(handled)
    }

    /// List an item that is already on the resale queue.
    async fn list(&self, item: &Item, buy_now: Price) -> Result<u64> {
        let trade_id = self
            .ctx
            .session
            .sell(item.id, ladder::step(buy_now, -1), buy_now)
            .await?;
        info!(item_id = item.id, buy_now, trade_id, "Listed");
        Ok(trade_id)
    }
}
