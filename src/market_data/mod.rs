pub mod cache;
pub mod candle;
pub mod error;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use cache::{MarketDataCache, MarketSource};
pub use candle::Candle;
pub use error::MarketError;
