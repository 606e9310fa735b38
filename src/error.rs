//! Typed failures that callers match on. Everything else travels as
//! `anyhow::Error`.

use thiserror::Error;

use crate::types::Price;

/// A trader pool entry that cannot become a trader.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraderConfigError {
    #[error("rid {rid}: flexbid is off but bid is 0")]
    ZeroFixedBid { rid: u64 },

    #[error("rid {rid}: unknown good")]
    UnknownGood { rid: u64 },

    #[error("rid {rid}: interval must be positive")]
    ZeroInterval { rid: u64 },

    #[error("invalid entry: {0}")]
    Malformed(String),
}

/// Application configuration that parses but cannot be run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("autopilot.tick_secs must be positive")]
    ZeroTick,

    #[error("{item_type} card rule sells without a price")]
    SellRuleWithoutPrice { item_type: String },
}

/// Conditions that stop the autopilot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PilotError {
    #[error("only {balance} coins left, below the floor of {floor}")]
    BalanceBelowFloor { balance: Price, floor: Price },
}
