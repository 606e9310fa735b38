//! In-memory marketplace for integration testing.
//!
//! Implements `MarketSession` over plain collections: an order book of
//! listings, the unassigned pile, the resale queue and a coin balance.
//! Every state change is controllable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tradepilot::catalog::JsonCatalog;
use tradepilot::clock::ManualClock;
use tradepilot::context::TradingContext;
use tradepilot::session::MarketSession;
use tradepilot::types::{GoodDefinition, Item, Listing, Price, SearchKind, TradeState};

#[derive(Default)]
struct Book {
    listings: Vec<Listing>,
    unassigned: Vec<Item>,
    resale: Vec<Item>,
    club: Vec<u64>,
    redeemed: Vec<u64>,
    duplicates: HashSet<u64>,
    balance: u64,
    pack_contents: Vec<Item>,
    packs_bought: usize,
    next_trade_id: u64,
}

pub struct FakeMarket {
    page_size: usize,
    capacity: usize,
    book: Mutex<Book>,
    /// If set, every call fails with this message.
    force_error: Mutex<Option<String>>,
}

impl FakeMarket {
    pub fn new(balance: u64) -> Self {
        Self {
            page_size: 20,
            capacity: 100,
            book: Mutex::new(Book {
                balance,
                next_trade_id: 90_000,
                ..Book::default()
            }),
            force_error: Mutex::new(None),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Put a good up for sale. Trade id and item id are assigned here.
    pub fn list(&self, resource_id: u64, price: Price, expires: i64) -> u64 {
        let mut book = self.book.lock().unwrap();
        book.next_trade_id += 1;
        let trade_id = book.next_trade_id;
        book.listings.push(Listing {
            trade_id,
            item_id: trade_id + 1_000_000,
            resource_id,
            buy_now_price: price,
            expires,
            discard_value: 100,
        });
        trade_id
    }

    /// Items every `buy_pack` drops into the unassigned pile. Each later
    /// pack shifts the item ids up by 100.
    pub fn set_pack_contents(&self, items: Vec<Item>) {
        self.book.lock().unwrap().pack_contents = items;
    }

    pub fn mark_duplicate(&self, item_id: u64) {
        self.book.lock().unwrap().duplicates.insert(item_id);
    }

    /// Put an item straight onto the resale queue.
    pub fn put_on_resale(&self, item: Item) {
        self.book.lock().unwrap().resale.push(item);
    }

    /// Change the trade state of a resale queue item.
    pub fn set_trade_state(&self, item_id: u64, state: Option<TradeState>) {
        let mut book = self.book.lock().unwrap();
        if let Some(item) = book.resale.iter_mut().find(|i| i.id == item_id) {
            item.trade_state = state;
        }
    }

    pub fn set_balance(&self, balance: u64) {
        self.book.lock().unwrap().balance = balance;
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn resale_items(&self) -> Vec<Item> {
        self.book.lock().unwrap().resale.clone()
    }

    pub fn club(&self) -> Vec<u64> {
        self.book.lock().unwrap().club.clone()
    }

    pub fn redeemed(&self) -> Vec<u64> {
        self.book.lock().unwrap().redeemed.clone()
    }

    pub fn packs_bought(&self) -> usize {
        self.book.lock().unwrap().packs_bought
    }

    pub fn listings_of(&self, resource_id: u64) -> usize {
        self.book
            .lock()
            .unwrap()
            .listings
            .iter()
            .filter(|l| l.resource_id == resource_id)
            .count()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

/// A player item for resale queue and pack fixtures.
pub fn player(id: u64, resource_id: u64, trade_state: Option<TradeState>) -> Item {
    Item {
        id,
        resource_id,
        item_type: "player".into(),
        rating: 75,
        rare_flag: 0,
        card_type: 0,
        league_id: None,
        trade_state,
        current_bid: 0,
        last_sale_price: 0,
        discard_value: 100,
        market_min_price: None,
        market_max_price: None,
    }
}

/// A non-player item of the given type.
pub fn consumable(id: u64, item_type: &str) -> Item {
    Item {
        item_type: item_type.into(),
        resource_id: 0,
        ..player(id, 0, None)
    }
}

/// A non-player item of the given type and card type.
pub fn card(id: u64, item_type: &str, card_type: u32) -> Item {
    Item {
        card_type,
        ..consumable(id, item_type)
    }
}

#[async_trait]
impl MarketSession for FakeMarket {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn resale_capacity(&self) -> usize {
        self.capacity
    }

    async fn search(&self, _kind: SearchKind, resource_id: u64, max_buy: Price) -> Result<Vec<Listing>> {
        self.check_error()?;
        let book = self.book.lock().unwrap();
        let mut found: Vec<Listing> = book
            .listings
            .iter()
            .filter(|l| l.resource_id == resource_id && l.buy_now_price <= max_buy)
            .cloned()
            .collect();
        found.sort_by_key(|l| l.buy_now_price);
        found.truncate(self.page_size);
        Ok(found)
    }

    async fn bid(&self, trade_id: u64, amount: Price, _fast: bool) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let Some(pos) = book.listings.iter().position(|l| l.trade_id == trade_id) else {
            return Ok(false);
        };
        if amount < book.listings[pos].buy_now_price || amount > book.balance {
            return Ok(false);
        }
        let listing = book.listings.remove(pos);
        book.balance -= amount;
        book.unassigned.push(Item {
            last_sale_price: amount,
            ..player(listing.item_id, listing.resource_id, None)
        });
        Ok(true)
    }

    async fn sell(&self, item_id: u64, starting_bid: Price, _buy_now: Price) -> Result<u64> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        book.next_trade_id += 1;
        let trade_id = book.next_trade_id;
        let item = book
            .resale
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| anyhow!("item {item_id} is not on the resale queue"))?;
        item.trade_state = Some(TradeState::Active);
        item.current_bid = starting_bid;
        Ok(trade_id)
    }

    async fn send_to_resale_queue(&self, item_id: u64) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        if book.resale.len() >= self.capacity {
            return Ok(false);
        }
        let Some(pos) = book.unassigned.iter().position(|i| i.id == item_id) else {
            return Ok(false);
        };
        let item = book.unassigned.remove(pos);
        book.resale.push(item);
        Ok(true)
    }

    async fn send_to_club(&self, item_id: u64) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let before = book.unassigned.len() + book.resale.len();
        book.unassigned.retain(|i| i.id != item_id);
        book.resale.retain(|i| i.id != item_id);
        if book.unassigned.len() + book.resale.len() == before {
            return Ok(false);
        }
        book.club.push(item_id);
        Ok(true)
    }

    async fn discard(&self, item_id: u64) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let Some(pos) = book.unassigned.iter().position(|i| i.id == item_id) else {
            return Ok(false);
        };
        let item = book.unassigned.remove(pos);
        book.balance += item.discard_value;
        Ok(true)
    }

    async fn redeem(&self, item_id: u64) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let Some(pos) = book.unassigned.iter().position(|i| i.id == item_id) else {
            return Ok(false);
        };
        book.unassigned.remove(pos);
        book.redeemed.push(item_id);
        Ok(true)
    }

    async fn buy_pack(&self, _pack_id: u64) -> Result<()> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let shift = 100 * book.packs_bought as u64;
        let contents: Vec<Item> = book
            .pack_contents
            .iter()
            .map(|i| Item {
                id: i.id + shift,
                ..i.clone()
            })
            .collect();
        book.unassigned.extend(contents);
        book.packs_bought += 1;
        Ok(())
    }

    async fn balance(&self) -> Result<u64> {
        self.check_error()?;
        Ok(self.book.lock().unwrap().balance)
    }

    async fn unassigned(&self) -> Result<Vec<Item>> {
        self.check_error()?;
        Ok(self.book.lock().unwrap().unassigned.clone())
    }

    async fn resale_queue(&self) -> Result<Vec<Item>> {
        self.check_error()?;
        Ok(self.book.lock().unwrap().resale.clone())
    }

    async fn duplicates(&self) -> Result<Vec<u64>> {
        self.check_error()?;
        let book = self.book.lock().unwrap();
        Ok(book
            .unassigned
            .iter()
            .map(|i| i.id)
            .filter(|id| book.duplicates.contains(id))
            .collect())
    }

    async fn clear_sold(&self) -> Result<bool> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let earned: u64 = book
            .resale
            .iter()
            .filter(|i| i.trade_state == Some(TradeState::Closed))
            .map(|i| i.current_bid)
            .sum();
        book.resale.retain(|i| i.trade_state != Some(TradeState::Closed));
        book.balance += earned;
        Ok(true)
    }

    async fn relist_expired(&self) -> Result<Vec<u64>> {
        self.check_error()?;
        let mut book = self.book.lock().unwrap();
        let mut relisted = Vec::new();
        for item in book.resale.iter_mut() {
            if item.trade_state == Some(TradeState::Expired) {
                item.trade_state = Some(TradeState::Active);
                relisted.push(item.id);
            }
        }
        Ok(relisted)
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

/// A trading context over `market` with a manual clock and the given goods.
pub fn context(
    market: &Arc<FakeMarket>,
    clock: &Arc<ManualClock>,
    goods: Vec<GoodDefinition>,
) -> Arc<TradingContext> {
    TradingContext::new(
        market.clone(),
        Arc::new(JsonCatalog::with_goods(goods)),
        clock.clone(),
    )
}
