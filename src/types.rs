//! Shared types for the TRADEPILOT agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that session, market, strategy,
//! and engine modules can depend on them without circular references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A marketplace price in coins. Only values on the price ladder are
/// accepted by the marketplace (see [`crate::pricing::ladder`]).
pub type Price = u64;

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// One sell order returned by a market search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub trade_id: u64,
    /// The item instance being sold.
    pub item_id: u64,
    /// The good this item is an instance of.
    pub resource_id: u64,
    pub buy_now_price: Price,
    /// Seconds until the listing expires.
    pub expires: i64,
    /// Lowest price the marketplace lets this item be sold for.
    #[serde(default)]
    pub discard_value: Price,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trade {} (rid={} bn={} exp={}s)",
            self.trade_id, self.resource_id, self.buy_now_price, self.expires
        )
    }
}

/// A `(price, expiry)` observation kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: Price,
    pub expires: i64,
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}m", self.price, self.expires / 60)
    }
}

/// Result of a market price discovery run.
#[derive(Debug, Clone, Default)]
pub struct MarketEstimate {
    /// The cheapest credible listing, if the market has one.
    pub listing: Option<Listing>,
    /// Most recently observed listings, cheapest first (at most 3).
    pub samples: Vec<PriceSample>,
}

impl MarketEstimate {
    /// Buy-now price of the cheapest credible listing.
    pub fn price(&self) -> Option<Price> {
        self.listing.as_ref().map(|l| l.buy_now_price)
    }

    /// Samples rendered as a compact space-separated list.
    pub fn samples_str(&self) -> String {
        self.samples
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a market search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Player,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKind::Player => write!(f, "player"),
        }
    }
}

// ---------------------------------------------------------------------------
// Owned items
// ---------------------------------------------------------------------------

/// State of an item on the resale queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeState {
    /// Listed and still running.
    Active,
    /// Listing ran out without a sale.
    Expired,
    /// Sold; coins are waiting to be collected.
    Closed,
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeState::Active => write!(f, "active"),
            TradeState::Expired => write!(f, "expired"),
            TradeState::Closed => write!(f, "closed"),
        }
    }
}

/// An item instance owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    pub resource_id: u64,
    /// "player", "health", "training", "kit", ...
    pub item_type: String,
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub rare_flag: u32,
    /// Subtype within `item_type`, e.g. which kind of health item.
    #[serde(default)]
    pub card_type: u32,
    #[serde(default)]
    pub league_id: Option<u32>,
    /// `None` while the item sits on the resale queue unlisted.
    #[serde(default)]
    pub trade_state: Option<TradeState>,
    #[serde(default)]
    pub current_bid: Price,
    #[serde(default)]
    pub last_sale_price: Price,
    #[serde(default)]
    pub discard_value: Price,
    #[serde(default)]
    pub market_min_price: Option<Price>,
    #[serde(default)]
    pub market_max_price: Option<Price>,
}

impl Item {
    pub fn is_player(&self) -> bool {
        self.item_type == "player"
    }
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Reference record describing a tradable good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodDefinition {
    pub resource_id: u64,
    pub name: String,
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub rare_flag: u32,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub nation: Option<u32>,
    #[serde(default)]
    pub league: Option<u32>,
    #[serde(default)]
    pub club: Option<u32>,
    #[serde(default)]
    pub market_min_price: Option<Price>,
    #[serde(default)]
    pub market_max_price: Option<Price>,
}

impl GoodDefinition {
    /// Minimal definition for a bare resource id.
    pub fn bare(resource_id: u64, name: &str) -> Self {
        Self {
            resource_id,
            name: name.to_string(),
            rating: 0,
            rare_flag: 0,
            position: None,
            nation: None,
            league: None,
            club: None,
            market_min_price: None,
            market_max_price: None,
        }
    }

    /// Name truncated to `max_len` characters for tabular log lines.
    pub fn short_name(&self, max_len: usize) -> String {
        if self.name.chars().count() <= max_len {
            self.name.clone()
        } else {
            let head: String = self.name.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

/// Rarity flag as a short label.
pub fn rarity_label(rare_flag: u32) -> String {
    match rare_flag {
        0 => "Comm".to_string(),
        1 => "Rare".to_string(),
        3 => "TOTW".to_string(),
        other => format!("rf{other}"),
    }
}

// ---------------------------------------------------------------------------
// Price targets
// ---------------------------------------------------------------------------

/// What price discovery should look for: a good plus optional
/// good-specific bounds on its market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTarget {
    pub resource_id: u64,
    pub floor: Option<Price>,
    pub ceiling: Option<Price>,
}

impl PriceTarget {
    pub fn new(resource_id: u64) -> Self {
        Self {
            resource_id,
            floor: None,
            ceiling: None,
        }
    }
}

impl From<&GoodDefinition> for PriceTarget {
    fn from(good: &GoodDefinition) -> Self {
        Self {
            resource_id: good.resource_id,
            floor: good.market_min_price,
            ceiling: good.market_max_price,
        }
    }
}

impl From<&Item> for PriceTarget {
    fn from(item: &Item) -> Self {
        Self {
            resource_id: item.resource_id,
            floor: item.market_min_price,
            ceiling: item.market_max_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
