//! Buyer and flipper lifecycles against the in-memory market.

use rust_decimal::Decimal;
use std::sync::Arc;

use tradepilot::clock::ManualClock;
use tradepilot::strategy::config::{BidPolicy, StrategyConfig, TraderConfig};
use tradepilot::strategy::{Strategy, Trader, TraderState, BID_REFRESH_SECS};
use tradepilot::types::{GoodDefinition, TradeState};

use crate::fake_market::{context, FakeMarket};

const HOUR: i64 = 3600;

fn buyer_config(rid: u64, quantity: Option<u32>) -> TraderConfig {
    TraderConfig {
        resource_id: rid,
        bid: BidPolicy::Flexible { ceiling: None },
        discount: Decimal::ONE,
        interval: 60,
        strategy: StrategyConfig::Buyer { quantity },
    }
}

fn flipper_config(rid: u64, bid: u64, max_flips: usize) -> TraderConfig {
    TraderConfig {
        resource_id: rid,
        bid: BidPolicy::Fixed(bid),
        discount: Decimal::ONE,
        interval: 60,
        strategy: StrategyConfig::Flipper {
            max_flips,
            sell_for: None,
        },
    }
}

fn bought(trader: &Trader) -> u32 {
    match trader.strategy() {
        Strategy::Buyer(b) => b.bought(),
        Strategy::Flipper(_) => panic!("not a buyer"),
    }
}

fn flips(trader: &Trader) -> u32 {
    match trader.strategy() {
        Strategy::Flipper(f) => f.flips(),
        Strategy::Buyer(_) => panic!("not a flipper"),
    }
}

#[tokio::test]
async fn buyer_waits_for_market_then_completes_quantity() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, vec![GoodDefinition::bare(7, "Striker")]);
    let mut trader = Trader::new(ctx, GoodDefinition::bare(7, "Striker"), buyer_config(7, Some(2)));

    // empty market: bid drops to zero and the trader pauses
    trader.run().await.unwrap();
    assert_eq!(trader.bid(), 0);
    assert_eq!(trader.state(), TraderState::Paused);

    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(trader.state(), TraderState::Paused);
    assert_eq!(trader.attempts(), 0);

    market.list(7, 1_000, 2 * HOUR);
    market.list(7, 1_100, 2 * HOUR);

    // next bid refresh picks up the market and the attempt buys
    clock.advance_secs(BID_REFRESH_SECS as i64);
    trader.run().await.unwrap();
    assert_eq!(trader.market_price(), 1_000);
    assert_eq!(trader.bid(), 1_000);
    assert_eq!(bought(&trader), 1);
    assert_eq!(trader.state(), TraderState::Active);
    assert_eq!(market.club().len(), 1);

    // only the 1100 listing is left, above the bid
    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(bought(&trader), 1);
    assert_eq!(trader.state(), TraderState::Active);

    market.list(7, 950, 2 * HOUR);
    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(bought(&trader), 2);
    assert_eq!(trader.state(), TraderState::Complete);
    assert_eq!(market.club().len(), 2);
    assert_eq!(market.listings_of(7), 1);
}

#[tokio::test]
async fn single_purchase_buyer_is_done_and_keeps_duplicates_for_resale() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, vec![GoodDefinition::bare(7, "Striker")]);
    let trade_id = market.list(7, 1_500, 2 * HOUR);
    // the fake hands out item ids one million above the trade id
    market.mark_duplicate(trade_id + 1_000_000);

    let mut trader = Trader::new(ctx, GoodDefinition::bare(7, "Striker"), buyer_config(7, None));
    trader.run().await.unwrap();

    assert_eq!(trader.state(), TraderState::Done);
    assert!(market.club().is_empty());
    let resale = market.resale_items();
    assert_eq!(resale.len(), 1);
    assert_eq!(resale[0].trade_state, None);
}

#[tokio::test]
async fn flipper_pauses_at_listing_limit_and_resumes_after_a_sale() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, vec![GoodDefinition::bare(9, "Keeper")]);
    for _ in 0..3 {
        market.list(9, 1_000, 2 * HOUR);
    }
    market.list(9, 1_500, 2 * HOUR);

    let mut trader = Trader::new(ctx, GoodDefinition::bare(9, "Keeper"), flipper_config(9, 1_000, 2));

    trader.run().await.unwrap();
    assert_eq!(flips(&trader), 1);
    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(flips(&trader), 2);

    let listed = market.resale_items();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|i| i.trade_state == Some(TradeState::Active)));
    // relisted at the market price, starting one step below
    assert!(listed.iter().all(|i| i.current_bid == 950));

    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(trader.state(), TraderState::Paused);
    assert_eq!(flips(&trader), 2);
    assert_eq!(market.listings_of(9), 2);

    market.set_trade_state(listed[0].id, Some(TradeState::Closed));
    clock.advance_secs(61);
    trader.run().await.unwrap();
    assert_eq!(trader.state(), TraderState::Active);
    assert_eq!(flips(&trader), 3);
    assert_eq!(market.listings_of(9), 1);
}

#[tokio::test]
async fn flipper_with_expired_listings_counts_them_against_the_limit() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, vec![GoodDefinition::bare(9, "Keeper")]);
    market.list(9, 1_000, 2 * HOUR);
    market.put_on_resale(crate::fake_market::player(1, 9, Some(TradeState::Expired)));

    let mut trader = Trader::new(ctx, GoodDefinition::bare(9, "Keeper"), flipper_config(9, 1_000, 1));
    trader.run().await.unwrap();

    assert_eq!(trader.state(), TraderState::Paused);
    assert_eq!(flips(&trader), 0);
    assert_eq!(market.listings_of(9), 1);
}

#[tokio::test]
async fn finished_buyers_make_no_further_purchases() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, vec![GoodDefinition::bare(7, "Striker")]);
    market.list(7, 1_000, 2 * HOUR);

    let mut single = Trader::new(ctx.clone(), GoodDefinition::bare(7, "Striker"), buyer_config(7, None));
    single.run().await.unwrap();
    assert_eq!(single.state(), TraderState::Done);
    assert_eq!(bought(&single), 1);

    market.list(7, 1_000, 2 * HOUR);
    clock.advance_secs(61);
    single.run().await.unwrap();
    assert_eq!(single.state(), TraderState::Done);
    assert_eq!(bought(&single), 1);
    assert_eq!(single.attempts(), 1);
    assert_eq!(market.club().len(), 1);
    assert_eq!(market.listings_of(7), 1);

    let mut batch = Trader::new(ctx, GoodDefinition::bare(7, "Striker"), buyer_config(7, Some(1)));
    batch.run().await.unwrap();
    assert_eq!(batch.state(), TraderState::Complete);
    assert_eq!(market.club().len(), 2);

    market.list(7, 1_000, 2 * HOUR);
    clock.advance_secs(BID_REFRESH_SECS as i64 + 1);
    batch.run().await.unwrap();
    assert_eq!(batch.state(), TraderState::Complete);
    assert_eq!(bought(&batch), 1);
    assert_eq!(market.club().len(), 2);
    assert_eq!(market.listings_of(7), 1);
}
