//! Remote marketplace session.
//!
//! Defines the `MarketSession` trait the rest of the agent talks to, and
//! provides an HTTP implementation for a marketplace gateway.
//!
//! The session owns authentication, transport retries and rate limiting;
//! callers only see listings, items and booleans.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Item, Listing, Price, SearchKind};

/// Abstraction over a logged-in marketplace account.
///
/// Every call is awaited to completion before the next one is issued; the
/// agent never has two requests in flight.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSession: Send + Sync {
    /// Maximum number of listings a single search returns.
    fn page_size(&self) -> usize;

    /// Number of slots on the resale queue.
    fn resale_capacity(&self) -> usize;

    /// Listings of `resource_id` with a buy-now price at or below `max_buy`,
    /// capped at one page.
    async fn search(&self, kind: SearchKind, resource_id: u64, max_buy: Price)
        -> Result<Vec<Listing>>;

    /// Bid `amount` on a listing. `fast` skips the pre-bid trade status
    /// refresh. Returns whether the bid won the item.
    async fn bid(&self, trade_id: u64, amount: Price, fast: bool) -> Result<bool>;

    /// List an item already on the resale queue. Returns the new trade id.
    async fn sell(&self, item_id: u64, starting_bid: Price, buy_now: Price) -> Result<u64>;

    /// Move an item onto the resale queue.
    async fn send_to_resale_queue(&self, item_id: u64) -> Result<bool>;

    /// Move an item into the club (squad roster).
    async fn send_to_club(&self, item_id: u64) -> Result<bool>;

    /// Quick-sell an item to the marketplace for its discard value.
    async fn discard(&self, item_id: u64) -> Result<bool>;

    /// Apply an item to the account (coin cards, pack vouchers).
    async fn redeem(&self, item_id: u64) -> Result<bool>;

    /// Buy a pack with coins; its contents land in the unassigned pile.
    async fn buy_pack(&self, pack_id: u64) -> Result<()>;

    /// Current coin balance.
    async fn balance(&self) -> Result<u64>;

    /// Items waiting to be assigned (pack contents, purchases).
    async fn unassigned(&self) -> Result<Vec<Item>>;

    /// Everything on the resale queue, listed or not.
    async fn resale_queue(&self) -> Result<Vec<Item>>;

    /// Ids of unassigned items that duplicate something already owned.
    async fn duplicates(&self) -> Result<Vec<u64>>;

    /// Collect coins for sold listings and drop them from the queue.
    async fn clear_sold(&self) -> Result<bool>;

    /// Relist every expired listing at its previous prices. Returns the
    /// relisted trade ids.
    async fn relist_expired(&self) -> Result<Vec<u64>>;

    /// End the session.
    async fn logout(&self) -> Result<()>;
}
