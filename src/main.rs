//! VOLBOT: binary-options trading bot for synthetic volatility indices.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the trade journal from disk (or starts fresh), and runs the
//! bar loop with graceful shutdown.
//!
//! `volbot --backtest` replays the configured bar file through a fresh
//! trader instead, logs the report and exits without touching the journal.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use volbot::backtest::Backtester;
use volbot::config::AppConfig;
use volbot::dashboard::{self, ApiState, AppState, BotStatus};
use volbot::engine::accountant::PerformanceMetrics;
use volbot::engine::feed::{self, ReplayFeed};
use volbot::engine::runner::process_next_bar;
use volbot::engine::trader::Trader;
use volbot::storage::TradeJournal;

const BANNER: &str = r#"
__     _____  _     ____   ___ _____
\ \   / / _ \| |   | __ ) / _ \_   _|
 \ \ / / | | | |   |  _ \| | | || |
  \ V /| |_| | |___| |_) | |_| || |
   \_/  \___/|_____|____/ \___/ |_|

  Volatility-index binary options bot
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("VOLBOT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        market = %cfg.trading.market,
        strategy = %cfg.trading.strategy,
        tick_interval_ms = cfg.bot.tick_interval_ms,
        initial_balance = cfg.trading.initial_balance,
        "VOLBOT starting up"
    );

    if std::env::args().skip(1).any(|arg| arg == "--backtest") {
        return run_backtest(&cfg);
    }

    // -- Restore or create state -----------------------------------------

    let journal_path = PathBuf::from(&cfg.storage.journal_path);
    let params = cfg.trading.clone();
    let trader = match TradeJournal::load(&journal_path)? {
        Some(journal) if journal.market_id == params.market => Trader::restore(params, journal)?,
        Some(journal) => {
            warn!(
                journal_market = %journal.market_id,
                configured_market = %params.market,
                "Journal belongs to another market, starting fresh"
            );
            Trader::new(params)?
        }
        None => Trader::new(params)?,
    };

    let mut feed = ReplayFeed::from_file(&cfg.trading.market, &cfg.bot.bars_file)?;
    let state: AppState = Arc::new(ApiState::new(trader));

    if cfg.api.enabled {
        dashboard::spawn_api(state.clone(), cfg.api.port);
    }

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.bot.tick_interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        bars = feed.remaining(),
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match process_next_bar(&mut feed, &state, &journal_path).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => error!(error = %e, "Bar processing failed, continuing"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // -- Shutdown --------------------------------------------------------

    {
        let mut status = state.status.write().await;
        if *status != BotStatus::Halted {
            *status = BotStatus::Stopped;
        }
    }

    let trader = state.trader.read().await;
    trader.journal().save(&journal_path)?;
    PerformanceMetrics::from_trades(trader.trades()).log_summary();
    info!(
        balance = format!("${:.2}", trader.risk().balance()),
        trades = trader.trades().len(),
        status = %*state.status.read().await,
        "VOLBOT shut down cleanly."
    );

    Ok(())
}

/// Replay the bar file through a fresh trader and log the report.
fn run_backtest(cfg: &AppConfig) -> Result<()> {
    let bars = feed::load_bars(&cfg.bot.bars_file)?;
    info!(bars = bars.len(), file = %cfg.bot.bars_file, "Running backtest");

    let report = Backtester::new(cfg.trading.clone(), cfg.trading.initial_balance).run(&bars)?;
    report.log_summary();
    if let Some(reason) = &report.halted {
        warn!(reason = %reason, "Backtest stopped early");
    }
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("volbot=info"));

    let json_logging = std::env::var("VOLBOT_LOG_JSON").is_ok();

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
}
