// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All read-only query endpoints live under `/api/`. No authentication; CORS
// is configured permissively so the dashboard and external consumers can call
// from any origin.
//
// Fetch-layer failures surface as structured JSON error payloads with a
// meaningful status code, never a bare 500. The signal endpoint is the one
// exception: it always answers with a full signal payload, degrading to
// `wait` with the failure description when the pipeline cannot run.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::exchange::client::normalize_symbol;
use crate::indicators::{self, IndicatorKind};
use crate::market_data::{candle, MarketError};
use crate::signals;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Dashboard ───────────────────────────────────────────────
        .route("/", get(crate::api::dashboard::dashboard))
        // ── Read-only query endpoints ───────────────────────────────
        .route("/api/health", get(health))
        .route("/api/ohlcv", get(get_ohlcv))
        .route("/api/indicators", get(get_indicators))
        .route("/api/funding", get(get_funding))
        .route("/api/signals", get(get_signals))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Query parameters
// =============================================================================

fn default_timeframe() -> String {
    "1h".to_string()
}

fn default_limit() -> u32 {
    300
}

#[derive(Debug, Deserialize)]
struct MarketQuery {
    symbol: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndicatorQuery {
    symbol: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    exchange: Option<String>,
    /// Comma-separated selection, e.g. "RSI,MACD". Absent selects all.
    #[serde(default)]
    indicators: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FundingQuery {
    symbol: String,
    #[serde(default)]
    exchange: Option<String>,
}

fn resolve_exchange(state: &AppState, requested: &Option<String>) -> String {
    requested
        .clone()
        .unwrap_or_else(|| state.config.default_exchange.clone())
}

// =============================================================================
// Error payloads
// =============================================================================

fn error_response(err: &MarketError, symbol: &str, exchange: &str) -> Response {
    let status = match err {
        MarketError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
        MarketError::UnsupportedExchange(_) => StatusCode::BAD_REQUEST,
        MarketError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        MarketError::Computation(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    warn!(symbol, exchange, error = %err, "request failed");
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "symbol": symbol,
            "exchange": exchange,
        })),
    )
        .into_response()
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Candles
// =============================================================================

async fn get_ohlcv(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MarketQuery>,
) -> Response {
    let exchange = resolve_exchange(&state, &q.exchange);
    match state
        .market
        .fetch_candles(&q.symbol, &q.timeframe, q.limit, &exchange)
        .await
    {
        Ok(series) => Json(json!({
            "symbol": q.symbol,
            "timeframe": q.timeframe,
            "exchange": exchange,
            "data": series.as_slice(),
        }))
        .into_response(),
        Err(e) => error_response(&e, &q.symbol, &exchange),
    }
}

// =============================================================================
// Indicators
// =============================================================================

async fn get_indicators(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IndicatorQuery>,
) -> Response {
    let exchange = resolve_exchange(&state, &q.exchange);

    let kinds = match IndicatorKind::parse_selection(q.indicators.as_deref()) {
        Ok(kinds) => kinds,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": msg, "symbol": q.symbol, "exchange": exchange })),
            )
                .into_response();
        }
    };

    let series = match state
        .market
        .fetch_candles(&q.symbol, &q.timeframe, q.limit, &exchange)
        .await
    {
        Ok(series) => series,
        Err(e) => return error_response(&e, &q.symbol, &exchange),
    };

    let closes = candle::closes(&series);
    let mut out = json!({
        "symbol": q.symbol,
        "timeframe": q.timeframe,
        "exchange": exchange,
    });
    let obj = out.as_object_mut().expect("out is a JSON object");

    for kind in kinds {
        match kind {
            IndicatorKind::Rsi => {
                let rsi = indicators::rsi(&closes, signals::RSI_PERIOD);
                obj.insert("RSI".to_string(), json!(rsi));
            }
            IndicatorKind::Macd => {
                let macd = indicators::macd(
                    &closes,
                    signals::MACD_FAST,
                    signals::MACD_SLOW,
                    signals::MACD_SIGNAL,
                );
                obj.insert(
                    "MACD".to_string(),
                    json!({
                        "dif": macd.dif,
                        "dea": macd.dea,
                        "hist": macd.hist,
                    }),
                );
            }
        }
    }

    Json(out).into_response()
}

// =============================================================================
// Funding
// =============================================================================

async fn get_funding(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FundingQuery>,
) -> Response {
    let exchange = resolve_exchange(&state, &q.exchange);
    let compact = normalize_symbol(&q.symbol);

    match state.market.fetch_funding_rate(&compact, &exchange).await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("Funding rate not available for {} on {}", q.symbol, exchange),
                "symbol": q.symbol,
                "exchange": exchange,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e, &q.symbol, &exchange),
    }
}

// =============================================================================
// Signals
// =============================================================================

async fn get_signals(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MarketQuery>,
) -> Response {
    let exchange = resolve_exchange(&state, &q.exchange);

    let outcome = match state
        .market
        .fetch_candles(&q.symbol, &q.timeframe, q.limit, &exchange)
        .await
    {
        Ok(series) => {
            signals::calculate_signal(&state.market, &series, &q.symbol, &exchange).await
        }
        Err(e) => Err(e),
    };

    let response = match outcome {
        Ok(verdict) => {
            signals::to_response(verdict, &q.symbol, &q.timeframe, q.limit, &exchange)
        }
        Err(e) => {
            warn!(symbol = %q.symbol, exchange = %exchange, error = %e, "signal pipeline degraded to wait");
            signals::degraded_response(&q.symbol, &q.timeframe, q.limit, &exchange, &e)
        }
    };

    Json(response).into_response()
}
