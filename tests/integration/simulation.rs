//! Autopilot runs against the in-memory market.
//!
//! Drives whole ticks (maintenance tasks, buyers, flippers) with a manual
//! clock and checks what ends up on the market.

use std::path::Path;
use std::sync::Arc;

use tradepilot::clock::ManualClock;
use tradepilot::config::{AutoPilotConfig, PacksConfig, PilotTasksConfig, TaskTiming};
use tradepilot::context::TradingContext;
use tradepilot::engine::autopilot::AutoPilot;
use tradepilot::engine::maintenance::Maintenance;
use tradepilot::error::PilotError;
use tradepilot::session::MarketSession;
use tradepilot::strategy::pool::TraderPool;
use tradepilot::strategy::TraderState;
use tradepilot::types::{GoodDefinition, Item, TradeState};

use crate::fake_market::{card, consumable, context, player, FakeMarket};

const HOUR: i64 = 3600;

fn every(interval: u64) -> Option<TaskTiming> {
    Some(TaskTiming { interval, delay: 0 })
}

fn goods() -> Vec<GoodDefinition> {
    vec![GoodDefinition::bare(7, "Striker"), GoodDefinition::bare(9, "Keeper")]
}

fn write_pool(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path
}

fn pilot(
    ctx: Arc<TradingContext>,
    config: AutoPilotConfig,
    buyers: TraderPool,
    flippers: TraderPool,
    packs: PacksConfig,
) -> AutoPilot {
    let maintenance = Maintenance::new(ctx.clone(), packs);
    AutoPilot::new(ctx, config, buyers, flippers, maintenance)
}

#[tokio::test]
async fn flippers_wait_while_buyers_are_busy() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    market.list(7, 2_000, 2 * HOUR);
    market.list(9, 1_000, 2 * HOUR);
    market.list(9, 1_200, 2 * HOUR);

    let dir = tempfile::tempdir().unwrap();
    let buyers_path = write_pool(
        dir.path(),
        "buyers.json",
        r#"{"buy": {"default": {"interval": 60, "flexbid": true}, "targets": [{"rid": 7}]}}"#,
    );
    let flippers_path = write_pool(
        dir.path(),
        "flippers.json",
        r#"{"flip": {"default": {"interval": 60}, "targets": [{"rid": 9, "bid": 1000}]}}"#,
    );
    let buyers = TraderPool::load("buyers", &buyers_path, ctx.clone()).unwrap();
    let flippers = TraderPool::load("flippers", &flippers_path, ctx.clone()).unwrap();

    let config = AutoPilotConfig {
        flipper_pause_threshold: 1,
        tasks: PilotTasksConfig {
            check_traders: every(30),
            ..PilotTasksConfig::default()
        },
        ..AutoPilotConfig::default()
    };
    let mut autopilot = pilot(ctx, config, buyers, flippers, PacksConfig::default());

    // the buyer starts active, so flippers are held back this round
    autopilot.tick().await.unwrap();
    assert!(!autopilot.pilot().flippers.is_enabled());
    assert_eq!(autopilot.pilot().buyers.count_in(TraderState::Done), 1);
    assert_eq!(market.listings_of(9), 2);
    assert!(market.resale_items().is_empty());

    // buyer done: flippers come back and flip the cheap listing
    clock.advance_secs(31);
    autopilot.tick().await.unwrap();
    assert!(autopilot.pilot().flippers.is_enabled());
    assert_eq!(market.listings_of(9), 1);
    let resale = market.resale_items();
    assert_eq!(resale.len(), 1);
    assert_eq!(resale[0].trade_state, Some(TradeState::Active));
    assert_eq!(autopilot.round(), 2);
}

#[tokio::test]
async fn autopilot_stops_when_balance_drops_below_floor() {
    let market = Arc::new(FakeMarket::new(10_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    let config = AutoPilotConfig {
        min_balance: 5_000,
        tasks: PilotTasksConfig {
            status: every(60),
            ..PilotTasksConfig::default()
        },
        ..AutoPilotConfig::default()
    };
    let mut autopilot = pilot(
        ctx.clone(),
        config,
        TraderPool::empty("buyers", ctx.clone()),
        TraderPool::empty("flippers", ctx),
        PacksConfig::default(),
    );

    autopilot.tick().await.unwrap();

    market.set_balance(100);
    clock.advance_secs(61);
    let err = autopilot.tick().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<PilotError>(),
        Some(&PilotError::BalanceBelowFloor {
            balance: 100,
            floor: 5_000
        })
    );
}

#[tokio::test]
async fn session_failure_ends_the_tick_with_an_error() {
    let market = Arc::new(FakeMarket::new(10_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    let config = AutoPilotConfig {
        tasks: PilotTasksConfig {
            refresh_resale_queue: every(60),
            ..PilotTasksConfig::default()
        },
        ..AutoPilotConfig::default()
    };
    let mut autopilot = pilot(
        ctx.clone(),
        config,
        TraderPool::empty("buyers", ctx.clone()),
        TraderPool::empty("flippers", ctx),
        PacksConfig::default(),
    );

    market.set_error("gateway unavailable");
    let err = autopilot.tick().await.unwrap_err();
    assert!(format!("{err:#}").contains("gateway unavailable"));
    assert!(err.downcast_ref::<PilotError>().is_none());
}

#[tokio::test]
async fn resale_queue_refresh_collects_and_relists() {
    let market = Arc::new(FakeMarket::new(1_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    market.put_on_resale(Item {
        current_bid: 800,
        ..player(1, 7, Some(TradeState::Closed))
    });
    market.put_on_resale(player(2, 7, Some(TradeState::Expired)));
    market.put_on_resale(player(3, 9, Some(TradeState::Active)));

    let config = AutoPilotConfig {
        tasks: PilotTasksConfig {
            refresh_resale_queue: every(300),
            ..PilotTasksConfig::default()
        },
        ..AutoPilotConfig::default()
    };
    let mut autopilot = pilot(
        ctx.clone(),
        config,
        TraderPool::empty("buyers", ctx.clone()),
        TraderPool::empty("flippers", ctx.clone()),
        PacksConfig::default(),
    );
    autopilot.tick().await.unwrap();

    let resale = market.resale_items();
    assert_eq!(resale.len(), 2);
    assert!(resale.iter().all(|i| i.trade_state == Some(TradeState::Active)));
    assert_eq!(ctx.session.balance().await.unwrap(), 1_800);
}

#[tokio::test]
async fn packs_are_opened_and_triaged() {
    let market = Arc::new(FakeMarket::new(50_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    market.list(7, 2_000, 2 * HOUR);
    market.set_pack_contents(vec![
        consumable(501, "training"),
        consumable(502, "kit"),
        player(503, 7, None),
    ]);

    let config = AutoPilotConfig {
        tasks: PilotTasksConfig {
            packs: every(3600),
            ..PilotTasksConfig::default()
        },
        ..AutoPilotConfig::default()
    };
    let packs = PacksConfig {
        max_per_run: 1,
        ..PacksConfig::default()
    };
    let mut autopilot = pilot(
        ctx.clone(),
        config,
        TraderPool::empty("buyers", ctx.clone()),
        TraderPool::empty("flippers", ctx.clone()),
        packs,
    );
    autopilot.tick().await.unwrap();

    assert_eq!(market.packs_bought(), 1);
    // training kept, kit discarded for 100, player listed at market price
    assert_eq!(market.club(), vec![501]);
    assert_eq!(ctx.session.balance().await.unwrap(), 50_100);
    let resale = market.resale_items();
    assert_eq!(resale.len(), 1);
    assert_eq!(resale[0].id, 503);
    assert_eq!(resale[0].trade_state, Some(TradeState::Active));
    assert_eq!(resale[0].current_bid, 1_900);
    assert!(ctx.session.unassigned().await.unwrap().is_empty());
}

#[tokio::test]
async fn packs_stop_when_resale_queue_is_nearly_full() {
    let market = Arc::new(FakeMarket::new(50_000).with_capacity(20));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    for id in 0..6 {
        market.put_on_resale(player(id, 9, Some(TradeState::Active)));
    }
    let maintenance = Maintenance::new(ctx, PacksConfig::default());

    let report = maintenance.packs().await.unwrap();
    assert_eq!(report.opened, 0);
    assert_eq!(market.packs_bought(), 0);
    assert_eq!(report.balance_before, report.balance_after);
}

#[tokio::test]
async fn health_and_misc_items_do_not_stall_pack_runs() {
    let market = Arc::new(FakeMarket::new(50_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    market.set_pack_contents(vec![
        card(601, "health", 212),
        card(602, "health", 220),
        card(603, "misc", 233),
    ]);
    let packs = PacksConfig {
        max_per_run: 2,
        ..PacksConfig::default()
    };
    let maintenance = Maintenance::new(ctx.clone(), packs);

    let report = maintenance.packs().await.unwrap();
    assert_eq!(report.opened, 2);
    assert_eq!(market.packs_bought(), 2);
    assert_eq!(market.club(), vec![601, 701]);
    assert_eq!(market.redeemed(), vec![603, 703]);
    let resale = market.resale_items();
    assert_eq!(resale.len(), 2);
    assert!(resale
        .iter()
        .all(|i| i.trade_state == Some(TradeState::Active) && i.current_bid == 1_000));
    assert!(ctx.session.unassigned().await.unwrap().is_empty());
}

#[tokio::test]
async fn packs_stop_while_bronze_cards_pile_up() {
    let market = Arc::new(FakeMarket::new(50_000).with_capacity(200));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    for id in 0..70 {
        market.put_on_resale(Item {
            rating: 64,
            ..player(id, 9, Some(TradeState::Active))
        });
    }
    let maintenance = Maintenance::new(ctx.clone(), PacksConfig::default());

    let report = maintenance.packs().await.unwrap();
    assert_eq!(report.opened, 0);
    assert_eq!(market.packs_bought(), 0);

    // one sells: below the limit again
    market.set_trade_state(0, Some(TradeState::Closed));
    market.set_pack_contents(vec![consumable(900, "training")]);
    let maintenance = Maintenance::new(
        ctx,
        PacksConfig {
            max_per_run: 1,
            ..PacksConfig::default()
        },
    );
    let report = maintenance.packs().await.unwrap();
    assert_eq!(report.opened, 1);
    assert_eq!(market.club(), vec![900]);
}

#[tokio::test]
async fn pool_edits_are_picked_up_while_running() {
    let market = Arc::new(FakeMarket::new(100_000));
    let clock = Arc::new(ManualClock::at_epoch());
    let ctx = context(&market, &clock, goods());
    let dir = tempfile::tempdir().unwrap();
    let path = write_pool(
        dir.path(),
        "buyers.json",
        r#"{"buy": {"default": {"interval": 60, "bid": 500}, "targets": [{"rid": 7}]}}"#,
    );
    let mut buyers = TraderPool::load("buyers", &path, ctx).unwrap();
    assert_eq!(buyers.traders().len(), 1);

    std::fs::write(
        &path,
        r#"{"buy": {"default": {"interval": 60, "bid": 500}, "targets": [{"rid": 7}, {"rid": 9}]}}"#,
    )
    .unwrap();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(modified + std::time::Duration::from_secs(5)).unwrap();

    // the reload task first runs a minute after loading
    buyers.run().await.unwrap();
    assert_eq!(buyers.traders().len(), 1);
    clock.advance_secs(61);
    buyers.run().await.unwrap();
    assert_eq!(buyers.traders().len(), 2);
}
