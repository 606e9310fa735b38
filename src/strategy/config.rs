//! Trader pool files and per-trader configuration.
//!
//! A pool file groups entries by strategy family. Each family has a
//! `default` block merged into every entry (entry keys win):
//!
//! ```json
//! {
//!   "buy":  {"default": {"interval": 60, "discount": 0.9, "flexbid": true},
//!            "targets": [{"rid": 20801, "quantity": 3}, null]},
//!   "flip": {"default": {"interval": 30, "maxflips": 2},
//!            "targets": [{"rid": 190871, "bid": 5000, "sellfor": 6500}]}
//! }
//! ```
//!
//! `null` or empty entries are ignored, which makes it easy to comment a
//! target out by blanking it.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::TraderConfigError;
use crate::types::Price;

/// Strategy family a pool entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Buy,
    Flip,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Buy => write!(f, "buy"),
            Family::Flip => write!(f, "flip"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PoolFile {
    #[serde(default)]
    pub buy: Option<FamilySection>,
    #[serde(default)]
    pub flip: Option<FamilySection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FamilySection {
    #[serde(default)]
    pub default: Map<String, Value>,
    #[serde(default)]
    pub targets: Vec<Value>,
}

impl PoolFile {
    /// Every non-blank entry with its family and defaults, in file order,
    /// buyers first.
    pub fn entries(&self) -> Vec<(Family, &Map<String, Value>, &Value)> {
        let mut out = Vec::new();
        for (family, section) in [(Family::Buy, &self.buy), (Family::Flip, &self.flip)] {
            let Some(section) = section else { continue };
            for entry in &section.targets {
                let blank = match entry {
                    Value::Null => true,
                    Value::Object(map) => map.is_empty(),
                    _ => false,
                };
                if !blank {
                    out.push((family, &section.default, entry));
                }
            }
        }
        out
    }
}

/// A pool entry after defaults are merged, before validation.
#[derive(Debug, Deserialize)]
struct RawEntry {
    rid: u64,
    #[serde(default)]
    bid: Price,
    #[serde(default)]
    flexbid: bool,
    #[serde(default = "default_discount")]
    discount: Decimal,
    interval: u64,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default = "default_maxflips")]
    maxflips: usize,
    #[serde(default)]
    sellfor: Price,
}

fn default_discount() -> Decimal {
    Decimal::ONE
}

fn default_maxflips() -> usize {
    2
}

/// How a trader arrives at its bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidPolicy {
    /// Always bid this much.
    Fixed(Price),
    /// Derive the bid from the market price, never above `ceiling`.
    Flexible { ceiling: Option<Price> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyConfig {
    /// Buy until `quantity` items are bought, or once when unset.
    Buyer { quantity: Option<u32> },
    /// Buy and relist, with at most `max_flips` listings of the good on the
    /// resale queue, never relisting below `sell_for`.
    Flipper {
        max_flips: usize,
        sell_for: Option<Price>,
    },
}

/// Validated configuration of one trader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraderConfig {
    pub resource_id: u64,
    pub bid: BidPolicy,
    pub discount: Decimal,
    /// Seconds between purchase attempts.
    pub interval: u64,
    pub strategy: StrategyConfig,
}

impl TraderConfig {
    /// Merge `defaults` into `entry` and validate the result.
    pub fn from_entry(
        family: Family,
        defaults: &Map<String, Value>,
        entry: &Value,
    ) -> Result<Self, TraderConfigError> {
        let Value::Object(fields) = entry else {
            return Err(TraderConfigError::Malformed(format!(
                "{family} entry is not an object: {entry}"
            )));
        };
        let mut merged = defaults.clone();
        for (k, v) in fields {
            merged.insert(k.clone(), v.clone());
        }
        let raw: RawEntry = serde_json::from_value(Value::Object(merged))
            .map_err(|e| TraderConfigError::Malformed(format!("{family} entry {entry}: {e}")))?;
        Self::validate(family, raw)
    }

    fn validate(family: Family, raw: RawEntry) -> Result<Self, TraderConfigError> {
        let rid = raw.rid;
        if !raw.flexbid && raw.bid == 0 {
            return Err(TraderConfigError::ZeroFixedBid { rid });
        }
        if raw.interval == 0 {
            return Err(TraderConfigError::ZeroInterval { rid });
        }
        let bid = if raw.flexbid {
            BidPolicy::Flexible {
                ceiling: (raw.bid > 0).then_some(raw.bid),
            }
        } else {
            BidPolicy::Fixed(raw.bid)
        };
        let strategy = match family {
            Family::Buy => StrategyConfig::Buyer {
                quantity: raw.quantity.filter(|q| *q > 0),
            },
            Family::Flip => StrategyConfig::Flipper {
                max_flips: raw.maxflips,
                sell_for: (raw.sellfor > 0).then_some(raw.sellfor),
            },
        };
        Ok(Self {
            resource_id: rid,
            bid,
            discount: raw.discount,
            interval: raw.interval,
            strategy,
        })
    }
}

impl fmt::Display for TraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (bid, flexbid) = match self.bid {
            BidPolicy::Fixed(bid) => (bid, false),
            BidPolicy::Flexible { ceiling } => (ceiling.unwrap_or(0), true),
        };
        write!(
            f,
            "interval={}, discount={}, bid={}, flexbid={}",
            self.interval, self.discount, bid, flexbid
        )?;
        match self.strategy {
            StrategyConfig::Buyer { quantity } => match quantity {
                Some(q) => write!(f, ", quantity={q}"),
                None => Ok(()),
            },
            StrategyConfig::Flipper {
                max_flips,
                sell_for,
            } => write!(
                f,
                ", maxflips={}, sellfor={}",
                max_flips,
                sell_for.unwrap_or(0)
            ),
        }
    }
}
