//! Shared handles every trader, pool and maintenance task works through.

use std::sync::Arc;

use crate::catalog::GoodsCatalog;
use crate::clock::Clock;
use crate::market::resale::ResaleQueue;
use crate::market::Market;
use crate::session::MarketSession;

/// One logged-in account and everything built on top of it.
///
/// Created once at startup and passed around as `Arc<TradingContext>`.
pub struct TradingContext {
    pub session: Arc<dyn MarketSession>,
    pub market: Market,
    pub resale: ResaleQueue,
    pub catalog: Arc<dyn GoodsCatalog>,
    pub clock: Arc<dyn Clock>,
}

impl TradingContext {
    pub fn new(
        session: Arc<dyn MarketSession>,
        catalog: Arc<dyn GoodsCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            market: Market::new(session.clone()),
            resale: ResaleQueue::new(session.clone(), clock.clone()),
            session,
            catalog,
            clock,
        })
    }
}
