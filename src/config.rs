//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the session token, the alert webhook) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.
//!
//! Trader pools are configured separately, in JSON files that are watched
//! for changes (see [`crate::strategy::pool`]).

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub autopilot: AutoPilotConfig,
    #[serde(default)]
    pub pools: PoolsConfig,
    #[serde(default)]
    pub packs: PacksConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    /// Env var holding the session token.
    pub token_env: String,
    /// Listings per search page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Slots on the resale queue.
    #[serde(default = "default_resale_capacity")]
    pub resale_capacity: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutoPilotConfig {
    /// Shut down when the balance drops below this.
    #[serde(default)]
    pub min_balance: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Active buyers at which flippers are paused.
    #[serde(default = "default_flipper_pause_threshold")]
    pub flipper_pause_threshold: usize,
    #[serde(default)]
    pub tasks: PilotTasksConfig,
}

impl Default for AutoPilotConfig {
    fn default() -> Self {
        Self {
            min_balance: 0,
            tick_secs: default_tick_secs(),
            flipper_pause_threshold: default_flipper_pause_threshold(),
            tasks: PilotTasksConfig::default(),
        }
    }
}

/// Maintenance tasks; a task without an entry is not scheduled.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PilotTasksConfig {
    pub status: Option<TaskTiming>,
    pub refresh_resale_queue: Option<TaskTiming>,
    pub packs: Option<TaskTiming>,
    pub check_traders: Option<TaskTiming>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub interval: u64,
    #[serde(default)]
    pub delay: u64,
}

/// Trader pool files. A missing entry means an empty pool.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PoolsConfig {
    pub buyers: Option<String>,
    pub flippers: Option<String>,
}

/// Pack opening and triage of their contents.
#[derive(Debug, Deserialize, Clone)]
pub struct PacksConfig {
    #[serde(default = "default_pack_id")]
    pub pack_id: u64,
    /// Packs opened per run at most.
    #[serde(default = "default_max_per_run")]
    pub max_per_run: usize,
    /// Stop buying packs below this many free resale slots.
    #[serde(default = "default_min_vacancy")]
    pub min_vacancy: usize,
    /// Stop buying packs once this many bronze cards sit on the resale queue.
    #[serde(default = "default_max_bronze_listed")]
    pub max_bronze_listed: usize,
    #[serde(default = "default_bronze_max_rating")]
    pub bronze_max_rating: u32,
    /// Item types sent straight to the club.
    #[serde(default = "default_keep_types")]
    pub keep_types: Vec<String>,
    /// Item types kept unless the account already owns one.
    #[serde(default = "default_keep_unless_duplicate_types")]
    pub keep_unless_duplicate_types: Vec<String>,
    /// Item types discarded for their discard value.
    #[serde(default = "default_discard_types")]
    pub discard_types: Vec<String>,
    /// Per card type handling of non-player items.
    #[serde(default = "default_card_rules")]
    pub card_rules: Vec<CardRule>,
    /// Players are sold only above these market prices.
    #[serde(default = "default_common_threshold")]
    pub common_threshold: u64,
    #[serde(default = "default_rare_threshold")]
    pub rare_threshold: u64,
    /// Players from these leagues (by abbreviation) are never sold.
    #[serde(default = "default_sbc_leagues")]
    pub sbc_leagues: Vec<String>,
}

/// Triage of one item type narrowed to some card types.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CardRule {
    pub item_type: String,
    pub card_types: Vec<u32>,
    pub action: CardAction,
    /// Buy-now price, required for `sell`.
    #[serde(default)]
    pub price: Option<u64>,
}

impl CardRule {
    pub fn matches(&self, item_type: &str, card_type: u32) -> bool {
        self.item_type == item_type && self.card_types.contains(&card_type)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardAction {
    Keep,
    Discard,
    Redeem,
    Sell,
}

impl Default for PacksConfig {
    fn default() -> Self {
        Self {
            pack_id: default_pack_id(),
            max_per_run: default_max_per_run(),
            min_vacancy: default_min_vacancy(),
            max_bronze_listed: default_max_bronze_listed(),
            bronze_max_rating: default_bronze_max_rating(),
            keep_types: default_keep_types(),
            keep_unless_duplicate_types: default_keep_unless_duplicate_types(),
            discard_types: default_discard_types(),
            card_rules: default_card_rules(),
            common_threshold: default_common_threshold(),
            rare_threshold: default_rare_threshold(),
            sbc_leagues: default_sbc_leagues(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    pub webhook_url_env: Option<String>,
}

fn default_page_size() -> usize {
    20
}

fn default_resale_capacity() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_tick_secs() -> u64 {
    1
}

fn default_flipper_pause_threshold() -> usize {
    3
}

fn default_pack_id() -> u64 {
    100
}

fn default_max_per_run() -> usize {
    10
}

fn default_min_vacancy() -> usize {
    15
}

fn default_max_bronze_listed() -> usize {
    70
}

fn default_bronze_max_rating() -> u32 {
    64
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_keep_types() -> Vec<String> {
    strings(&["training"])
}

fn default_keep_unless_duplicate_types() -> Vec<String> {
    strings(&["fitnessCoach", "gkCoach", "headCoach", "manager"])
}

fn default_discard_types() -> Vec<String> {
    strings(&["ball", "contract", "kit", "physio", "stadium"])
}

fn default_card_rules() -> Vec<CardRule> {
    let rule = |item_type: &str, card_types: &[u32], action, price| CardRule {
        item_type: item_type.to_string(),
        card_types: card_types.to_vec(),
        action,
        price,
    };
    vec![
        // badges
        rule("custom", &[11], CardAction::Discard, None),
        // coin cards and bronze pack vouchers
        rule("misc", &[231, 233], CardAction::Redeem, None),
        // healing
        rule("health", &[211, 212, 213, 215, 216, 217], CardAction::Keep, None),
        rule("health", &[218, 219], CardAction::Sell, Some(200)),
        rule("health", &[220], CardAction::Sell, Some(1_100)),
    ]
}

fn default_sbc_leagues() -> Vec<String> {
    strings(&["CHN 1", "JPN 1"])
}

fn default_common_threshold() -> u64 {
    400
}

fn default_rare_threshold() -> u64 {
    600
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.autopilot.tick_secs == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if let Some(rule) = self
            .packs
            .card_rules
            .iter()
            .find(|r| r.action == CardAction::Sell && !r.price.is_some_and(|p| p > 0))
        {
            return Err(ConfigError::SellRuleWithoutPrice {
                item_type: rule.item_type.clone(),
            });
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The session token, kept out of logs and debug output.
    pub fn session_token(&self) -> Result<SecretString> {
        Self::resolve_env(&self.session.token_env).map(SecretString::new)
    }
}
