// =============================================================================
// Shared types used across the Helios signal service
// =============================================================================

use serde::{Deserialize, Serialize};

/// Discrete trading action derived by the signal synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Wait,
}

impl Default for Action {
    fn default() -> Self {
        Self::Wait
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

/// Latest scalar value of each input feeding the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalScores {
    pub rsi: f64,
    pub funding: f64,
    pub macd_hist: f64,
    pub dif: f64,
    pub dea: f64,
}

/// Support/resistance extremes over the trailing level window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceLevels {
    pub support: f64,
    pub resistance: f64,
}

/// Point-in-time funding snapshot from the perpetual futures market.
///
/// Field names are camelCase on the wire — this is the stable payload shape
/// consumers already parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSnapshot {
    pub symbol: String,
    pub mark_price: f64,
    pub last_funding_rate: f64,
    /// Timestamp (ms) of the next funding event.
    pub next_funding_time: i64,
    /// Exchange server time (ms) at the moment of the snapshot.
    pub time: i64,
}

/// The full signal payload returned to consumers.
///
/// `action`, `scores`, `reasons`, `levels`, and `meta` are the stable
/// contract; the chart dashboard and any external consumer rely on these
/// exact names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResponse {
    pub symbol: String,
    pub timeframe: String,
    pub action: Action,
    pub scores: SignalScores,
    pub reasons: Vec<String>,
    pub levels: PriceLevels,
    pub meta: serde_json::Value,
}
