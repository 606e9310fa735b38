//! TRADEPILOT: automated trading agent for a virtual transfer market.
//!
//! Entry point. Loads configuration, initialises structured logging, logs
//! into the market and either runs the autopilot loop or a one-off command.

use anyhow::Result;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use tradepilot::catalog::{GoodsCatalog, JsonCatalog};
use tradepilot::clock::SystemClock;
use tradepilot::config::{self, AppConfig};
use tradepilot::context::TradingContext;
use tradepilot::engine::autopilot::AutoPilot;
use tradepilot::engine::maintenance::Maintenance;
use tradepilot::error::PilotError;
use tradepilot::notify::{LogNotifier, Notifier, WebhookNotifier};
use tradepilot::session::http::HttpSession;
use tradepilot::storage;
use tradepilot::strategy::pool::TraderPool;
use tradepilot::types::{Price, PriceSample};

const BANNER: &str = r#"
 _____ ____      _    ____  _____ ____ ___ _     ___ _____
|_   _|  _ \    / \  |  _ \| ____|  _ \_ _| |   / _ \_   _|
  | | | |_) |  / _ \ | | | |  _| | |_) | || |  | | | || |
  | | |  _ <  / ___ \| |_| | |___|  __/| || |__| |_| || |
  |_| |_| \_\/_/   \_\____/|_____|_|  |___|_____\___/ |_|

  Price discovery and automated traders
  v0.1.0
"#;

#[derive(Debug, Parser)]
#[command(name = "tradepilot", version, about = "Automated transfer market trader")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the autopilot until Ctrl-C (default).
    Run,
    /// Open packs and triage their contents once.
    Packs,
    /// List unlisted players on the resale queue, send the rest to the club.
    Cleanup,
    /// Discover prices for unlisted players on the resale queue.
    PriceListed {
        /// Also list each priced item.
        #[arg(long)]
        sell: bool,
        /// Write the priced items to this JSON file.
        #[arg(long)]
        out: Option<String>,
    },
    /// Look up goods in the catalog by id, abbreviation or name.
    Lookup { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    init_logging(&cfg);

    println!("{BANNER}");

    let catalog = Arc::new(JsonCatalog::load(&cfg.catalog.path)?);
    info!(goods = catalog.len(), path = %cfg.catalog.path, "Catalog loaded");

    // Lookups never touch the market.
    if let Some(Command::Lookup { query }) = &cli.command {
        let found = catalog.find(query);
        if found.is_empty() {
            warn!(query = %query, "No goods found");
        }
        for good in &found {
            println!("{:>10}  {}", good.resource_id, catalog.describe(good));
        }
        return Ok(());
    }

    let session = Arc::new(HttpSession::new(&cfg.session, cfg.session_token()?)?);
    let ctx = TradingContext::new(session, catalog, Arc::new(SystemClock));
    let notifier = build_notifier(&cfg);

    let outcome = run_command(cli.command.unwrap_or(Command::Run), &cfg, ctx.clone()).await;

    if let Err(e) = &outcome {
        if let Some(pilot_err) = e.downcast_ref::<PilotError>() {
            error!(error = %pilot_err, "Autopilot stopped");
        } else {
            error!(error = format!("{e:#}"), "Fatal error");
            if let Err(alert_err) = notifier.notify(&format!("tradepilot stopped: {e:#}")).await {
                error!(error = %alert_err, "Failed to send alert");
            }
        }
    }

    if let Err(e) = ctx.session.logout().await {
        warn!(error = %e, "Logout failed");
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
    info!("TRADEPILOT shut down cleanly.");
    Ok(())
}

async fn run_command(command: Command, cfg: &AppConfig, ctx: Arc<TradingContext>) -> Result<()> {
    let maintenance = Maintenance::new(ctx.clone(), cfg.packs.clone());
    match command {
        Command::Run => {
            let buyers = load_pool("buyers", cfg.pools.buyers.as_deref(), ctx.clone())?;
            let flippers = load_pool("flippers", cfg.pools.flippers.as_deref(), ctx.clone())?;
            let mut pilot =
                AutoPilot::new(ctx, cfg.autopilot.clone(), buyers, flippers, maintenance);
            pilot.run().await
        }
        Command::Packs => {
            let report = maintenance.packs().await?;
            info!(
                opened = report.opened,
                balance_before = report.balance_before,
                balance_after = report.balance_after,
                "Packs done"
            );
            Ok(())
        }
        Command::Cleanup => maintenance.cleanup().await.map(|_| ()),
        Command::PriceListed { sell, out } => {
            let mut rows = Vec::new();
            for (item, estimate) in maintenance.price_listed(sell).await? {
                let name = ctx
                    .catalog
                    .resolve(item.resource_id)
                    .map(|g| ctx.catalog.describe(&g))
                    .unwrap_or_else(|| item.resource_id.to_string());
                println!(
                    "{:>8}  {}  [{}]",
                    estimate.price().unwrap_or(0),
                    name,
                    estimate.samples_str()
                );
                rows.push(PricedItem {
                    item_id: item.id,
                    resource_id: item.resource_id,
                    name,
                    market_price: estimate.price(),
                    samples: estimate.samples,
                });
            }
            if let Some(path) = out {
                storage::save_json(&rows, &path)?;
                info!(path = %path, count = rows.len(), "Price report written");
            }
            Ok(())
        }
        Command::Lookup { .. } => Ok(()),
    }
}

/// One row of the `price-listed` report file.
#[derive(Debug, Serialize)]
struct PricedItem {
    item_id: u64,
    resource_id: u64,
    name: String,
    market_price: Option<Price>,
    samples: Vec<PriceSample>,
}

fn load_pool(name: &str, path: Option<&str>, ctx: Arc<TradingContext>) -> Result<TraderPool> {
    match path {
        Some(p) => TraderPool::load(name, p, ctx),
        None => {
            info!(pool = name, "No pool file configured");
            Ok(TraderPool::empty(name, ctx))
        }
    }
}

fn build_notifier(cfg: &AppConfig) -> Box<dyn Notifier> {
    let url = cfg
        .alerts
        .webhook_url_env
        .as_deref()
        .and_then(|env| config::AppConfig::resolve_env(env).ok());
    match url.map(|u| WebhookNotifier::new(SecretString::new(u))) {
        Some(Ok(n)) => Box::new(n),
        Some(Err(e)) => {
            warn!(error = %e, "Webhook alerts unavailable, logging alerts only");
            Box::new(LogNotifier)
        }
        None => Box::new(LogNotifier),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tradepilot=info"));

    let json_logging = std::env::var("TRADEPILOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!(
        base_url = %cfg.session.base_url,
        page_size = cfg.session.page_size,
        "Logging initialised"
    );
}
