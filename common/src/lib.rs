// Shared Market Data Types
// Input/output value types exchanged between the decision-engine crates

pub mod history;
pub mod types;

pub use history::BoundedHistory;
pub use types::{
    BookLevel, Candle, FactorCategory, MarketSnapshot, NewsEvent, NewsImpact, OpenPosition,
    OrderBook, PortfolioSnapshot, SnapshotError, TradeDirection, TradePrint, TradeSide,
};

pub use uuid::Uuid;
