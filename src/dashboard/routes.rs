//! Control API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::engine::accountant::PerformanceMetrics;
use crate::engine::trader::Trader;
use crate::indicators::market::MarketSnapshot;
use crate::strategy::risk;
use crate::strategy::StrategyKind;
use crate::types::{BotError, Trade, TradeType};

// ---------------------------------------------------------------------------
// Bot status
// ---------------------------------------------------------------------------

/// Lifecycle of the trading loop. `Halted` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Running,
    Paused,
    /// A stop rule fired.
    Halted,
    /// Shut down by the operator or the feed ran dry.
    Stopped,
}

impl BotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BotStatus::Halted | BotStatus::Stopped)
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStatus::Running => write!(f, "RUNNING"),
            BotStatus::Paused => write!(f, "PAUSED"),
            BotStatus::Halted => write!(f, "HALTED"),
            BotStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers and the trading loop.
pub struct ApiState {
    pub status: RwLock<BotStatus>,
    pub trader: RwLock<Trader>,
}

impl ApiState {
    pub fn new(trader: Trader) -> Self {
        Self {
            status: RwLock::new(BotStatus::Running),
            trader: RwLock::new(trader),
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: BotStatus,
    pub market: String,
    pub strategy: StrategyKind,
    pub balance: f64,
    pub initial_balance: f64,
    pub peak_balance: f64,
    pub drawdown: f64,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub trades: usize,
    pub contract_open: bool,
    pub today_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pnl: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyResponse {
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub status: BotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    pub trade_type: TradeType,
    pub probability: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StakeRequest {
    pub balance: f64,
    pub risk_tolerance: f64,
    pub volatility: f64,
    pub probability: f64,
    #[serde(default)]
    pub win_streak: u32,
    #[serde(default)]
    pub loss_streak: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradesQuery {
    /// Return only the newest `limit` trades.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskToleranceBody {
    pub risk_tolerance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakeResponse {
    pub stake: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (code, Json(ErrorResponse { error: message.into() }))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = *state.status.read().await;
    let trader = state.trader.read().await;
    let risk = trader.risk().state();
    let today = trader.trading_day();

    Json(StatusResponse {
        status,
        market: trader.params().market.clone(),
        strategy: trader.strategy(),
        balance: risk.balance,
        initial_balance: risk.initial_balance,
        peak_balance: risk.peak_balance,
        drawdown: risk.drawdown(),
        win_streak: risk.win_streak,
        loss_streak: risk.loss_streak,
        trades: trader.trades().len(),
        contract_open: trader.open_contract().is_some(),
        today_pnl: trader.risk().daily_pnl(today),
    })
}

/// GET /api/trades?limit=N
///
/// The whole trade log, oldest first. With `limit`, only the newest N.
pub async fn get_trades(
    State(state): State<AppState>,
    Query(query): Query<TradesQuery>,
) -> Json<Vec<Trade>> {
    let trader = state.trader.read().await;
    let trades = trader.trades();
    let start = query
        .limit
        .map_or(0, |limit| trades.len().saturating_sub(limit));
    Json(trades[start..].to_vec())
}

/// GET /api/metrics
pub async fn get_metrics(State(state): State<AppState>) -> Json<PerformanceMetrics> {
    let trader = state.trader.read().await;
    Json(PerformanceMetrics::from_trades(trader.trades()))
}

/// GET /api/daily
pub async fn get_daily(State(state): State<AppState>) -> Json<Vec<DailyEntry>> {
    let trader = state.trader.read().await;
    let entries = trader
        .risk()
        .state()
        .daily_totals
        .iter()
        .map(|(date, d)| DailyEntry {
            date: *date,
            trades: d.trades,
            wins: d.wins,
            losses: d.losses,
            pnl: d.pnl,
        })
        .collect();
    Json(entries)
}

/// GET /api/market
pub async fn get_market(State(state): State<AppState>) -> Json<Option<MarketSnapshot>> {
    Json(state.trader.read().await.market_snapshot())
}

/// GET /api/probability/:trade_type
pub async fn get_probability(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<EstimateResponse> {
    let trade_type: TradeType = raw
        .parse()
        .map_err(|e: BotError| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let (probability, confidence) = state.trader.read().await.estimate(trade_type);
    Ok(Json(EstimateResponse { trade_type, probability, confidence }))
}

/// POST /api/strategy
pub async fn set_strategy(
    State(state): State<AppState>,
    Json(req): Json<StrategyRequest>,
) -> ApiResult<StrategyResponse> {
    let kind: StrategyKind = req
        .strategy
        .parse()
        .map_err(|e: BotError| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    state.trader.write().await.set_strategy(kind);
    Ok(Json(StrategyResponse { strategy: kind }))
}

/// POST /api/risk
pub async fn set_risk_tolerance(
    State(state): State<AppState>,
    Json(req): Json<RiskToleranceBody>,
) -> ApiResult<RiskToleranceBody> {
    if !req.risk_tolerance.is_finite() {
        return Err(api_error(StatusCode::BAD_REQUEST, "risk_tolerance must be a finite number"));
    }
    let risk_tolerance = state.trader.write().await.set_risk_tolerance(req.risk_tolerance);
    Ok(Json(RiskToleranceBody { risk_tolerance }))
}

/// POST /api/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult<StatusChange> {
    transition(&state, BotStatus::Paused).await
}

/// POST /api/resume
pub async fn resume(State(state): State<AppState>) -> ApiResult<StatusChange> {
    transition(&state, BotStatus::Running).await
}

async fn transition(state: &ApiState, to: BotStatus) -> ApiResult<StatusChange> {
    let mut status = state.status.write().await;
    if status.is_terminal() {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("bot is {} and cannot become {to}", *status),
        ));
    }
    if *status != to {
        info!(from = %*status, to = %to, "Bot status changed");
        *status = to;
    }
    Ok(Json(StatusChange { status: to }))
}

/// POST /api/stake
pub async fn compute_stake(Json(req): Json<StakeRequest>) -> Json<StakeResponse> {
    Json(StakeResponse {
        stake: risk::optimal_stake(
            req.balance,
            req.risk_tolerance,
            req.volatility,
            req.probability,
            req.win_streak,
            req.loss_streak,
        ),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradingParams;
    use chrono::TimeZone;

    fn make_state() -> AppState {
        Arc::new(ApiState::new(Trader::new(TradingParams::default()).unwrap()))
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BotStatus::Halted.is_terminal());
        assert!(BotStatus::Stopped.is_terminal());
        assert!(!BotStatus::Paused.is_terminal());
        assert_eq!(serde_json::to_string(&BotStatus::Running).unwrap(), "\"running\"");
    }

    #[tokio::test]
    async fn test_get_status_handler() {
        let Json(resp) = get_status(State(make_state())).await;
        assert_eq!(resp.status, BotStatus::Running);
        assert_eq!(resp.market, "R_10");
        assert!((resp.balance - 1000.0).abs() < 1e-10);
        assert_eq!(resp.trades, 0);
        assert!(!resp.contract_open);
    }

    #[tokio::test]
    async fn test_pause_then_resume() {
        let state = make_state();
        let Json(paused) = pause(State(state.clone())).await.unwrap();
        assert_eq!(paused.status, BotStatus::Paused);
        assert_eq!(*state.status.read().await, BotStatus::Paused);

        let Json(running) = resume(State(state.clone())).await.unwrap();
        assert_eq!(running.status, BotStatus::Running);
    }

    #[tokio::test]
    async fn test_resume_from_halted_conflicts() {
        let state = make_state();
        *state.status.write().await = BotStatus::Halted;
        let (code, _) = resume(State(state.clone())).await.unwrap_err();
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(*state.status.read().await, BotStatus::Halted);
    }

    #[tokio::test]
    async fn test_set_strategy_handler() {
        let state = make_state();
        let req = StrategyRequest { strategy: "trend-following".into() };
        let Json(resp) = set_strategy(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(resp.strategy, StrategyKind::TrendFollowing);
        assert_eq!(state.trader.read().await.strategy(), StrategyKind::TrendFollowing);
    }

    #[tokio::test]
    async fn test_compute_stake_handler() {
        let req = StakeRequest {
            balance: 1000.0,
            risk_tolerance: 0.5,
            volatility: 0.5,
            probability: 0.5,
            win_streak: 0,
            loss_streak: 0,
        };
        let Json(resp) = compute_stake(Json(req)).await;
        assert_eq!(resp.stake, 7.5);
    }

    #[tokio::test]
    async fn test_market_cold_start() {
        let Json(snapshot) = get_market(State(make_state())).await;
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_probability_handler() {
        let Json(resp) = get_probability(State(make_state()), Path("digit3".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.trade_type, TradeType::DigitMatch(3));
        assert!((0.0..=1.0).contains(&resp.probability));

        let (code, _) = get_probability(State(make_state()), Path("straddle".to_string()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_set_risk_tolerance_handler() {
        let state = make_state();
        let req = RiskToleranceBody { risk_tolerance: 0.05 };
        let Json(resp) = set_risk_tolerance(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(resp.risk_tolerance, 0.1);
        assert_eq!(state.trader.read().await.risk().config().risk_tolerance, 0.1);

        let req = RiskToleranceBody { risk_tolerance: f64::NAN };
        let (code, _) = set_risk_tolerance(State(state), Json(req)).await.unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_today_pnl_uses_bar_dates() {
        let params = TradingParams {
            strategy: StrategyKind::MeanReversion,
            trade_types: vec![TradeType::Call, TradeType::Put],
            use_trend_filter: false,
            use_volatility_filter: false,
            ..TradingParams::default()
        };
        let state = Arc::new(ApiState::new(Trader::new(params).unwrap()));
        {
            let mut trader = state.trader.write().await;
            let start = chrono::Utc.with_ymd_and_hms(2020, 3, 3, 0, 0, 0).unwrap();
            for i in 0..60 {
                let close = 6000.0 - i as f64;
                trader.on_bar(crate::types::PriceBar::new(
                    start + chrono::Duration::minutes(i),
                    close,
                    close + 0.5,
                    close - 0.5,
                    close,
                ));
            }
        }
        let trader = state.trader.read().await;
        let day = trader.trading_day();
        assert_eq!(day, NaiveDate::from_ymd_opt(2020, 3, 3).unwrap());
        let expected = trader.risk().daily_pnl(day);
        assert!(expected < 0.0);
        drop(trader);

        let Json(resp) = get_status(State(state)).await;
        assert_eq!(resp.today_pnl, expected);
    }

    #[tokio::test]
    async fn test_get_metrics_no_trades() {
        let Json(metrics) = get_metrics(State(make_state())).await;
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
    }
}
