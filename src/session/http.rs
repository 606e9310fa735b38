//! HTTP marketplace gateway client.
//!
//! Talks JSON to a transfer-market gateway that fronts the game's web API.
//! Auth: `X-UT-SID: {session token}` on every request.
//!
//! Endpoints used:
//! - `GET  /transfermarket`        search (page capped at `num`)
//! - `PUT  /trade/{id}/bid`        bid
//! - `POST /auctionhouse`          list an item
//! - `PUT  /auctionhouse/relist`   relist expired listings
//! - `PUT  /item`                  move items between piles
//! - `DELETE /item/{id}`           quick-sell
//! - `POST /purchased/store`       buy a pack
//! - `GET  /purchased/items`       unassigned pile (+ duplicate ids)
//! - `GET  /tradepile`             resale queue
//! - `DELETE /trade/sold`          clear sold listings
//! - `GET  /user/credits`          coin balance

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::MarketSession;
use crate::config::SessionConfig;
use crate::types::{Item, Listing, Price, SearchKind, TradeState};

/// Listing duration used for every sale (one hour).
const LISTING_DURATION_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// API response types (gateway JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemData {
    id: u64,
    resource_id: u64,
    #[serde(default = "default_item_type")]
    item_type: String,
    #[serde(default)]
    rating: u32,
    #[serde(default, rename = "rareflag")]
    rare_flag: u32,
    #[serde(default)]
    card_type: u32,
    #[serde(default)]
    league_id: Option<u32>,
    #[serde(default)]
    discard_value: Price,
    #[serde(default)]
    last_sale_price: Price,
    #[serde(default)]
    market_data_min_price: Option<Price>,
    #[serde(default)]
    market_data_max_price: Option<Price>,
}

fn default_item_type() -> String {
    "player".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuctionInfo {
    trade_id: u64,
    #[serde(default)]
    buy_now_price: Price,
    #[serde(default)]
    current_bid: Price,
    #[serde(default)]
    expires: i64,
    /// "active" | "expired" | "closed" | null
    #[serde(default)]
    trade_state: Option<String>,
    /// "highest" | "outbid" | "none"
    #[serde(default)]
    bid_state: Option<String>,
    item_data: ItemData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuctionResponse {
    #[serde(default)]
    auction_info: Vec<AuctionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateEntry {
    item_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchasedResponse {
    #[serde(default)]
    item_data: Vec<ItemData>,
    #[serde(default)]
    duplicate_item_id_list: Vec<DuplicateEntry>,
}

#[derive(Debug, Deserialize)]
struct PileResult {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PileResponse {
    #[serde(default)]
    item_data: Vec<PileResult>,
}

#[derive(Debug, Deserialize)]
struct SellResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TradeIdEntry {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelistResponse {
    #[serde(default)]
    trade_id_list: Vec<TradeIdEntry>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    credits: u64,
}

fn parse_trade_state(raw: Option<&str>) -> Option<TradeState> {
    match raw {
        Some("active") => Some(TradeState::Active),
        Some("expired") => Some(TradeState::Expired),
        Some("closed") => Some(TradeState::Closed),
        _ => None,
    }
}

impl ItemData {
    fn into_item(self, trade_state: Option<TradeState>, current_bid: Price) -> Item {
        Item {
            id: self.id,
            resource_id: self.resource_id,
            item_type: self.item_type,
            rating: self.rating,
            rare_flag: self.rare_flag,
            card_type: self.card_type,
            league_id: self.league_id,
            trade_state,
            current_bid,
            last_sale_price: self.last_sale_price,
            discard_value: self.discard_value,
            market_min_price: self.market_data_min_price,
            market_max_price: self.market_data_max_price,
        }
    }
}

impl AuctionInfo {
    fn into_listing(self) -> Listing {
        Listing {
            trade_id: self.trade_id,
            item_id: self.item_data.id,
            resource_id: self.item_data.resource_id,
            buy_now_price: self.buy_now_price,
            expires: self.expires,
            discard_value: self.item_data.discard_value,
        }
    }

    fn into_item(self) -> Item {
        let state = parse_trade_state(self.trade_state.as_deref());
        self.item_data.into_item(state, self.current_bid)
    }

    fn is_won(&self) -> bool {
        self.bid_state.as_deref() == Some("highest") || self.trade_state.as_deref() == Some("closed")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Marketplace gateway session.
pub struct HttpSession {
    http: Client,
    base_url: String,
    token: SecretString,
    page_size: usize,
    resale_capacity: usize,
}

impl HttpSession {
    /// Create a new gateway session.
    pub fn new(config: &SessionConfig, token: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("TRADEPILOT/0.1.0 (transfer-market-agent)")
            .build()
            .context("Failed to build HTTP client for market gateway")?;

        info!(base_url = %config.base_url, "Market session ready");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            page_size: config.page_size,
            resale_capacity: config.resale_capacity,
        })
    }

    // -- Internal helpers ------------------------------------------------

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, url = %url, "Gateway request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("X-UT-SID", self.token.expose_secret().as_str())
            .query(query);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Gateway request failed: {method} {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gateway error {status} on {method} {path}: {body}");
        }

        let text = resp.text().await.context("Failed to read gateway response")?;
        // Some endpoints answer with an empty body on success.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text)
            .with_context(|| format!("Failed to parse gateway response for {method} {path}"))
    }

    async fn move_item(&self, item_id: u64, pile: &str) -> Result<bool> {
        let body = json!({ "itemData": [{ "id": item_id, "pile": pile }] });
        let resp: PileResponse = self.call(Method::PUT, "/item", &[], Some(body)).await?;
        Ok(resp.item_data.first().map(|r| r.success).unwrap_or(false))
    }
}

#[async_trait]
impl MarketSession for HttpSession {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn resale_capacity(&self) -> usize {
        self.resale_capacity
    }

    async fn search(
        &self,
        kind: SearchKind,
        resource_id: u64,
        max_buy: Price,
    ) -> Result<Vec<Listing>> {
        let query = [
            ("type", kind.to_string()),
            ("definitionId", resource_id.to_string()),
            ("maxb", max_buy.to_string()),
            ("num", self.page_size.to_string()),
            ("start", "0".to_string()),
        ];
        let resp: AuctionResponse = self
            .call(Method::GET, "/transfermarket", &query, None)
            .await?;
        Ok(resp
            .auction_info
            .into_iter()
            .map(AuctionInfo::into_listing)
            .collect())
    }

    async fn bid(&self, trade_id: u64, amount: Price, fast: bool) -> Result<bool> {
        let path = format!("/trade/{trade_id}/bid");
        let query = [("fast", fast.to_string())];
        let resp: AuctionResponse = self
            .call(Method::PUT, &path, &query, Some(json!({ "bid": amount })))
            .await?;
        Ok(resp.auction_info.first().map(AuctionInfo::is_won).unwrap_or(false))
    }

    async fn sell(&self, item_id: u64, starting_bid: Price, buy_now: Price) -> Result<u64> {
        let body = json!({
            "itemData": { "id": item_id },
            "startingBid": starting_bid,
            "buyNowPrice": buy_now,
            "duration": LISTING_DURATION_SECS,
        });
        let resp: SellResponse = self
            .call(Method::POST, "/auctionhouse", &[], Some(body))
            .await?;
        Ok(resp.id)
    }

    async fn send_to_resale_queue(&self, item_id: u64) -> Result<bool> {
        self.move_item(item_id, "trade").await
    }

    async fn send_to_club(&self, item_id: u64) -> Result<bool> {
        self.move_item(item_id, "club").await
    }

    async fn discard(&self, item_id: u64) -> Result<bool> {
        let path = format!("/item/{item_id}");
        let _: Option<serde_json::Value> = self.call(Method::DELETE, &path, &[], None).await?;
        Ok(true)
    }

    async fn redeem(&self, item_id: u64) -> Result<bool> {
        let path = format!("/item/{item_id}");
        let body = json!({ "apply": [] });
        let _: Option<serde_json::Value> = self.call(Method::POST, &path, &[], Some(body)).await?;
        Ok(true)
    }

    async fn buy_pack(&self, pack_id: u64) -> Result<()> {
        let body = json!({ "packId": pack_id, "currency": "COINS" });
        let _: Option<serde_json::Value> = self
            .call(Method::POST, "/purchased/store", &[], Some(body))
            .await?;
        Ok(())
    }

    async fn balance(&self) -> Result<u64> {
        let resp: CreditsResponse = self.call(Method::GET, "/user/credits", &[], None).await?;
        Ok(resp.credits)
    }

    async fn unassigned(&self) -> Result<Vec<Item>> {
        let resp: PurchasedResponse = self
            .call(Method::GET, "/purchased/items", &[], None)
            .await?;
        Ok(resp
            .item_data
            .into_iter()
            .map(|d| d.into_item(None, 0))
            .collect())
    }

    async fn resale_queue(&self) -> Result<Vec<Item>> {
        let resp: AuctionResponse = self.call(Method::GET, "/tradepile", &[], None).await?;
        Ok(resp.auction_info.into_iter().map(AuctionInfo::into_item).collect())
    }

    async fn duplicates(&self) -> Result<Vec<u64>> {
        let resp: PurchasedResponse = self
            .call(Method::GET, "/purchased/items", &[], None)
            .await?;
        Ok(resp
            .duplicate_item_id_list
            .into_iter()
            .map(|d| d.item_id)
            .collect())
    }

    async fn clear_sold(&self) -> Result<bool> {
        let _: Option<serde_json::Value> = self
            .call(Method::DELETE, "/trade/sold", &[], None)
            .await?;
        Ok(true)
    }

    async fn relist_expired(&self) -> Result<Vec<u64>> {
        let resp: RelistResponse = self
            .call(Method::PUT, "/auctionhouse/relist", &[], None)
            .await?;
        Ok(resp.trade_id_list.into_iter().map(|t| t.id).collect())
    }

    async fn logout(&self) -> Result<()> {
        let _: Option<serde_json::Value> = self.call(Method::DELETE, "/auth", &[], None).await?;
        info!("Logged out of market session");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
