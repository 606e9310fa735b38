//! Cached view of the resale queue.
//!
//! Traders check the queue on every attempt (flip limits) and the status
//! reports read it too, so the listing is fetched at most once per
//! `CACHE_TTL_SECS` unless someone invalidates it after a change.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::session::MarketSession;
use crate::types::{Item, TradeState};

pub const CACHE_TTL_SECS: i64 = 10;

struct Snapshot {
    fetched_at: DateTime<Utc>,
    items: Vec<Item>,
}

pub struct ResaleQueue {
    session: Arc<dyn MarketSession>,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<Snapshot>>,
}

impl ResaleQueue {
    pub fn new(session: Arc<dyn MarketSession>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session,
            clock,
            cache: Mutex::new(None),
        }
    }

    /// Every item on the queue, served from cache while fresh.
    pub async fn all(&self) -> Result<Vec<Item>> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();
        if let Some(snap) = cache.as_ref() {
            if now - snap.fetched_at < Duration::seconds(CACHE_TTL_SECS) {
                return Ok(snap.items.clone());
            }
        }
        let items = self.session.resale_queue().await?;
        debug!(count = items.len(), "Resale queue fetched");
        *cache = Some(Snapshot {
            fetched_at: now,
            items: items.clone(),
        });
        Ok(items)
    }

    /// Drop the cached snapshot and fetch a fresh one.
    pub async fn refresh(&self) -> Result<Vec<Item>> {
        self.invalidate().await;
        self.all().await
    }

    /// Forget the cached snapshot; the next read goes to the session.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn active(&self) -> Result<Vec<Item>> {
        self.in_state(Some(TradeState::Active)).await
    }

    pub async fn expired(&self) -> Result<Vec<Item>> {
        self.in_state(Some(TradeState::Expired)).await
    }

    pub async fn sold(&self) -> Result<Vec<Item>> {
        self.in_state(Some(TradeState::Closed)).await
    }

    /// Items sitting on the queue without a listing.
    pub async fn inactive(&self) -> Result<Vec<Item>> {
        self.in_state(None).await
    }

    /// Listings of `resource_id` that still occupy a slot: running or
    /// expired but not yet relisted.
    pub async fn listed_count(&self, resource_id: u64) -> Result<usize> {
        Ok(self
            .all()
            .await?
            .iter()
            .filter(|i| i.resource_id == resource_id)
            .filter(|i| {
                matches!(
                    i.trade_state,
                    Some(TradeState::Active) | Some(TradeState::Expired)
                )
            })
            .count())
    }

    /// Free slots left on the queue.
    pub async fn vacancy(&self) -> Result<usize> {
        let used = self.all().await?.len();
        Ok(self.session.resale_capacity().saturating_sub(used))
    }

    async fn in_state(&self, state: Option<TradeState>) -> Result<Vec<Item>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|i| i.trade_state == state)
            .collect())
    }
}
