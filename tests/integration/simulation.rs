//! End-to-end simulations: feed → trader → journal → API.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use volbot::backtest::Backtester;
use volbot::config::{AppConfig, TradingParams};
use volbot::dashboard::{build_router, ApiState, BotStatus};
use volbot::engine::feed::ReplayFeed;
use volbot::engine::runner::process_next_bar;
use volbot::engine::trader::Trader;
use volbot::storage::TradeJournal;
use volbot::strategy::risk::StopReason;
use volbot::strategy::StrategyKind;
use volbot::types::{Outcome, PriceBar, TradeType};

use crate::mock_feed::{falling, ScriptedFeed};

// ---- helpers ----

fn all_week() -> Vec<String> {
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"]
        .map(String::from)
        .to_vec()
}

fn mean_reversion_params() -> TradingParams {
    TradingParams {
        strategy: StrategyKind::MeanReversion,
        trade_types: vec![TradeType::Call, TradeType::Put],
        use_trend_filter: false,
        use_volatility_filter: false,
        trading_days: all_week(),
        ..TradingParams::default()
    }
}

fn temp_journal() -> PathBuf {
    std::env::temp_dir().join(format!("volbot_sim_{}.json", uuid::Uuid::new_v4()))
}

async fn run_until_stop(feed: &mut ScriptedFeed, state: &ApiState, path: &PathBuf) -> usize {
    let mut steps = 0;
    while process_next_bar(feed, state, path).await.unwrap() {
        steps += 1;
    }
    steps
}

// ---- tests ----

#[tokio::test]
async fn test_losing_session_halts_and_resumes_from_journal() {
    let path = temp_journal();
    let state = ApiState::new(Trader::new(mean_reversion_params()).unwrap());
    let mut feed = ScriptedFeed::new("R_10", falling(100));

    run_until_stop(&mut feed, &state, &path).await;
    assert_eq!(*state.status.read().await, BotStatus::Halted);
    assert!(feed.remaining() > 0, "halt should stop before the feed runs dry");

    let journal = TradeJournal::load(&path).unwrap().unwrap();
    assert_eq!(journal.market_id, "R_10");
    assert_eq!(journal.trades.len(), 5);
    assert!(journal.trades.iter().all(|t| t.outcome == Outcome::Loss));

    // A restored trader is still halted by the same loss streak.
    let balance = journal.risk.balance;
    let restored = Trader::restore(mean_reversion_params(), journal).unwrap();
    assert_eq!(restored.risk().balance(), balance);
    let today = crate::mock_feed::session_start().date_naive();
    assert_eq!(restored.stop_reason(today), Some(StopReason::LossStreak { streak: 5 }));

    TradeJournal::delete(&path).unwrap();
}

#[tokio::test]
async fn test_feed_error_is_recoverable() {
    let path = temp_journal();
    let state = ApiState::new(Trader::new(mean_reversion_params()).unwrap());
    let mut feed = ScriptedFeed::new("R_10", falling(3));
    let handle = feed.clone();

    handle.set_error("socket closed");
    assert!(process_next_bar(&mut feed, &state, &path).await.is_err());
    assert_eq!(handle.pulled(), 0);

    handle.clear_error();
    assert!(process_next_bar(&mut feed, &state, &path).await.unwrap());
    assert_eq!(handle.pulled(), 1);
    assert_eq!(state.trader.read().await.history_len(), 1);
}

#[tokio::test]
async fn test_feed_exhaustion_keeps_status() {
    let path = temp_journal();
    let state = ApiState::new(Trader::new(mean_reversion_params()).unwrap());
    let mut feed = ScriptedFeed::new("R_10", falling(10));

    let steps = run_until_stop(&mut feed, &state, &path).await;
    assert_eq!(steps, 10);
    assert_eq!(*state.status.read().await, BotStatus::Running);

    // More bars arrive later; the loop picks them up.
    feed.push(falling(11)[10]);
    assert!(process_next_bar(&mut feed, &state, &path).await.unwrap());
}

#[tokio::test]
async fn test_pause_via_api_blocks_new_contracts() {
    let path = temp_journal();
    let state = Arc::new(ApiState::new(Trader::new(mean_reversion_params()).unwrap()));
    let bars = falling(60);
    let mut feed = ScriptedFeed::new("R_10", bars[..30].to_vec());

    // Warm up; the 30th bar opens a contract.
    run_until_stop(&mut feed, &state, &path).await;
    assert!(state.trader.read().await.open_contract().is_some());

    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/pause")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    for bar in &bars[30..] {
        feed.push(*bar);
    }
    run_until_stop(&mut feed, &state, &path).await;

    let trader = state.trader.read().await;
    assert_eq!(trader.trades().len(), 1, "only the contract opened before the pause settles");
    assert!(trader.open_contract().is_none());
    assert_eq!(*state.status.read().await, BotStatus::Paused);

    TradeJournal::delete(&path).unwrap();
}

#[tokio::test]
async fn test_trades_endpoint_reflects_settlements() {
    let path = temp_journal();
    let state = Arc::new(ApiState::new(Trader::new(mean_reversion_params()).unwrap()));
    let mut feed = ScriptedFeed::new("R_10", falling(32));
    run_until_stop(&mut feed, &state, &path).await;

    let resp = build_router(state.clone())
        .oneshot(Request::builder().uri("/api/trades").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let trades: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0]["trade_type"], "CALL");
    assert_eq!(trades[0]["outcome"], "loss");

    TradeJournal::delete(&path).unwrap();
}

#[test]
fn test_backtest_sample_data_invariants() {
    let cfg = AppConfig::load("config.toml").unwrap();
    let feed = ReplayFeed::from_file("R_10", &cfg.bot.bars_file).unwrap();
    assert_eq!(feed.remaining(), 600);

    let bars: Vec<PriceBar> = serde_json::from_str(&std::fs::read_to_string(&cfg.bot.bars_file).unwrap())
        .unwrap();

    for strategy in StrategyKind::ALL {
        let params = TradingParams { strategy, ..cfg.trading.clone() };
        let report = Backtester::new(params, 1000.0).run(&bars).unwrap();

        assert_eq!(report.balance_history.len(), report.trades.len() + 1, "{strategy}");
        assert!((report.final_balance - (1000.0 + report.total_pnl)).abs() < 1e-6, "{strategy}");
        assert!(report.metrics.total_trades <= cfg.trading.max_trades_per_day as usize);
        assert!(report.max_drawdown.pct >= 0.0 && report.max_drawdown.pct <= 1.0);

        for (trade, balance_before) in report.trades.iter().zip(&report.balance_history) {
            assert!(trade.stake >= 1.0, "{strategy}: stake {}", trade.stake);
            assert!(trade.stake <= 0.05 * balance_before + 0.005, "{strategy}: stake {}", trade.stake);
            assert!(trade.probability >= cfg.trading.probability_threshold);
            assert!(trade.confidence >= cfg.trading.confidence_threshold);
            assert!(cfg.trading.trade_types.contains(&trade.trade_type));
        }
    }
}
