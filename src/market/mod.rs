//! Transfer market operations.
//!
//! - Price discovery: a bounded narrowing search over the paginated search
//!   endpoint, returning the lowest credible buy-now price.
//! - Bounded purchase: buy the cheapest listing at or below a ceiling,
//!   retrying a few times when other buyers win the race.
//! - Relisting: move an item to the resale queue and put it up for sale.

pub mod resale;

use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::pricing::ladder::{self, MAX_PRICE, MIN_PRICE};
use crate::session::MarketSession;
use crate::types::{Listing, MarketEstimate, Price, PriceSample, PriceTarget, SearchKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Hard cap on discovery rounds. Normal searches converge well within it;
/// the cap only matters if the remote feeds us inconsistent pages.
pub const MAX_DISCOVERY_ROUNDS: usize = 8;

/// How many observed listings a discovery run reports back.
pub const SAMPLE_COUNT: usize = 3;

/// Query rounds a purchase makes when every bid loses.
pub const MAX_PURCHASE_ROUNDS: usize = 3;

/// Listings with more than this many seconds left count as established.
const ESTABLISHED_AFTER_SECS: i64 = 3600;

/// Listings with at most this many seconds left are near expiry.
const NEAR_EXPIRY_SECS: i64 = 3540;

// ---------------------------------------------------------------------------
// Sticky minimum
// ---------------------------------------------------------------------------

/// Pick the page minimum, discounting near-expiry underbids.
///
/// Listings with more than an hour left set the floor: the cheapest of
/// them is the page minimum. A listing with 59 minutes or less can tie that
/// floor but never undercut it, so a lone seller dumping a card right
/// before expiry does not drag our price down. When nothing established is
/// on the page, the cheapest near-expiry listing stands in, since one-hour
/// listings (our own relists included) would otherwise never price.
/// Listings in between (freshly posted) are ignored.
pub fn sticky_min(page: &[Listing]) -> Option<&Listing> {
    let established = |l: &Listing| l.expires > ESTABLISHED_AFTER_SECS;
    let near_expiry = |l: &Listing| l.expires <= NEAR_EXPIRY_SECS;

    let floor = page
        .iter()
        .filter(|l| established(l))
        .map(|l| l.buy_now_price)
        .min();
    match floor {
        Some(floor) => page
            .iter()
            .filter(|l| l.buy_now_price == floor && (established(l) || near_expiry(l)))
            .last(),
        None => page
            .iter()
            .filter(|l| near_expiry(l))
            .min_by_key(|l| l.buy_now_price),
    }
}

fn midpoint(failed: Price, current: Price) -> Price {
    ladder::round(Decimal::from(failed + current) / Decimal::TWO)
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Market operations on top of a session.
#[derive(Clone)]
pub struct Market {
    session: Arc<dyn MarketSession>,
}

impl Market {
    pub fn new(session: Arc<dyn MarketSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<dyn MarketSession> {
        &self.session
    }

    /// Find the lowest credible buy-now price for a good.
    ///
    /// Starts with the ceiling at the top of the good's price range and
    /// narrows toward the cheapest listing: a full page may hide cheaper
    /// listings, so the next query goes halfway between the last ceiling
    /// that found nothing and the best price seen; a short page is
    /// conclusive.
    pub async fn discover_price(&self, target: PriceTarget) -> Result<MarketEstimate> {
        let low = target.floor.unwrap_or(MIN_PRICE);
        let high = target.ceiling.unwrap_or(MAX_PRICE);
        let page_size = self.session.page_size();

        let mut attempt = high;
        let mut failed = low;
        let mut current = high;
        let mut best: Option<Listing> = None;
        let mut seen: HashMap<u64, PriceSample> = HashMap::new();

        for round in 0..MAX_DISCOVERY_ROUNDS {
            debug!(
                rid = target.resource_id,
                round,
                current,
                attempt,
                failed,
                "Discovery round"
            );
            if attempt == ladder::round(low) || attempt <= ladder::round(failed) {
                debug!(rid = target.resource_id, "Stop: ceiling reached the floor");
                break;
            }
            if best.is_some() && attempt >= current {
                debug!(rid = target.resource_id, "Stop: nothing left between floor and best");
                break;
            }

            let page = self
                .session
                .search(SearchKind::Player, target.resource_id, attempt)
                .await?;
            for l in &page {
                seen.insert(
                    l.trade_id,
                    PriceSample {
                        price: l.buy_now_price,
                        expires: l.expires,
                    },
                );
            }
            debug!(
                rid = target.resource_id,
                count = page.len(),
                "Search returned listings"
            );

            if page.is_empty() && attempt == high {
                debug!(rid = target.resource_id, "Stop: nothing on the market");
                break;
            }

            match sticky_min(&page) {
                Some(found) => {
                    current = found.buy_now_price;
                    best = Some(found.clone());
                    if page.len() < page_size {
                        debug!(rid = target.resource_id, price = current, "Stop: short page");
                        break;
                    }
                    // full page: cheaper listings may be hidden below
                    attempt = midpoint(failed, current);
                }
                None => {
                    // empty, or only unreliable listings: ceiling too low
                    failed = attempt;
                    attempt = midpoint(failed, current);
                }
            }
        }

        let mut samples: Vec<PriceSample> = seen.into_values().collect();
        samples.sort_by_key(|s| (s.price, s.expires));
        samples.truncate(SAMPLE_COUNT);

        Ok(MarketEstimate {
            listing: best,
            samples,
        })
    }

    /// Buy the cheapest listing of a good priced at or below `max_buy`.
    ///
    /// Bids on candidates cheapest first. When candidates existed but every
    /// bid lost, the search is repeated, up to `MAX_PURCHASE_ROUNDS` times.
    /// An empty search ends the attempt at once. Returns the won listing.
    pub async fn buy_now(&self, resource_id: u64, max_buy: Price) -> Result<Option<Listing>> {
        for round in 0..MAX_PURCHASE_ROUNDS {
            let mut for_sale = self
                .session
                .search(SearchKind::Player, resource_id, max_buy)
                .await?;
            if for_sale.is_empty() {
                debug!(rid = resource_id, max_buy, "Nothing for sale at or below ceiling");
                return Ok(None);
            }
            for_sale.sort_by_key(|l| l.buy_now_price);
            info!(
                rid = resource_id,
                count = for_sale.len(),
                max_buy,
                round,
                "Listings for sale at or below ceiling"
            );

            for listing in &for_sale {
                let won = self
                    .session
                    .bid(listing.trade_id, listing.buy_now_price, true)
                    .await?;
                info!(
                    rid = resource_id,
                    trade_id = listing.trade_id,
                    bid = listing.buy_now_price,
                    won,
                    "Bid placed"
                );
                if won {
                    return Ok(Some(listing.clone()));
                }
            }
        }
        Ok(None)
    }

    /// Move an item to the resale queue and list it, starting one ladder
    /// step below `buy_now`. Returns the trade id, or `None` when the item
    /// could not be moved.
    pub async fn sell(&self, item_id: u64, buy_now: Price) -> Result<Option<u64>> {
        if !self.session.send_to_resale_queue(item_id).await? {
            debug!(item_id, "Could not move item to resale queue");
            return Ok(None);
        }
        let starting_bid = ladder::step(buy_now, -1);
        let trade_id = self.session.sell(item_id, starting_bid, buy_now).await?;
        info!(item_id, starting_bid, buy_now, trade_id, "Item listed");
        Ok(Some(trade_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
