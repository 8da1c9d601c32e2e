// Market data input types
// Produced by the external ingestion layer, consumed read-only by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single OHLCV price bar
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trade direction for signals and open positions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn opposite(&self) -> Self {
        match self {
            TradeDirection::Buy => TradeDirection::Sell,
            TradeDirection::Sell => TradeDirection::Buy,
        }
    }
}

/// Category of evidence a technical factor belongs to. Shared between
/// the regime's per-category adjustment factors, the factor analyzers,
/// and the per-regime learning weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FactorCategory {
    Technical,
    Pattern,
    Volume,
    Momentum,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 4] = [
        FactorCategory::Technical,
        FactorCategory::Pattern,
        FactorCategory::Volume,
        FactorCategory::Momentum,
    ];
}

/// Aggressor side of a trade print
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Single price level in the order book
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Order book snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub spread: f64,
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Mid price from best bid/ask; falls back to either side alone
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            (Some(bid), None) => Some(bid.price),
            (None, Some(ask)) => Some(ask.price),
            (None, None) => None,
        }
    }

    pub fn bid_depth(&self) -> f64 {
        self.bids.iter().map(|l| l.size).sum()
    }

    pub fn ask_depth(&self) -> f64 {
        self.asks.iter().map(|l| l.size).sum()
    }

    pub fn total_depth(&self) -> f64 {
        self.bid_depth() + self.ask_depth()
    }
}

/// Executed trade print
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradePrint {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

/// Impact tier of a scheduled news/economic event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum NewsImpact {
    Low,
    Medium,
    High,
}

/// Scheduled or recent news/economic event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub time: DateTime<Utc>,
    pub currency: String,
    pub impact: NewsImpact,
}

/// Open position as reported by the external portfolio layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub pair: String,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub size: f64,
    pub risk_amount: f64,
}

/// Account/portfolio state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub open_positions: Vec<OpenPosition>,
    pub total_risk: f64,
    pub allocated_capital: f64,
    pub total_capital: f64,
    pub sharpe_ratio: f64,
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        Self {
            balance: 10_000.0,
            equity: 10_000.0,
            open_positions: Vec::new(),
            total_risk: 0.0,
            allocated_capital: 0.0,
            total_capital: 10_000.0,
            sharpe_ratio: 0.0,
        }
    }
}

/// Full per-cycle input snapshot assembled by the ingestion layer
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub pair: String,
    pub candles: Vec<Candle>,
    pub current_price: f64,
    pub volumes: Vec<f64>,
    pub order_book: Option<OrderBook>,
    pub recent_trades: Vec<TradePrint>,
    pub news_events: Vec<NewsEvent>,
    pub portfolio: PortfolioSnapshot,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Validate the snapshot before a decision cycle starts.
    ///
    /// Missing market data degrades downstream (neutral regime, no
    /// candidates) and is not an error here; a malformed portfolio
    /// state is, since every gate depends on it.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.pair.is_empty() {
            return Err(SnapshotError::EmptyPair);
        }
        if !self.current_price.is_finite() || self.current_price <= 0.0 {
            return Err(SnapshotError::InvalidPrice {
                price: self.current_price,
            });
        }
        let p = &self.portfolio;
        if !p.balance.is_finite()
            || !p.equity.is_finite()
            || !p.total_risk.is_finite()
            || !p.total_capital.is_finite()
        {
            return Err(SnapshotError::NonFinitePortfolioField);
        }
        if p.equity < 0.0 || p.total_capital <= 0.0 {
            return Err(SnapshotError::InvalidPortfolioState {
                equity: p.equity,
                total_capital: p.total_capital,
            });
        }
        for candle in &self.candles {
            if candle.high < candle.low {
                return Err(SnapshotError::InvalidCandle {
                    timestamp: candle.timestamp,
                });
            }
        }
        Ok(())
    }
}

/// Typed validation failure for a market snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    EmptyPair,
    InvalidPrice { price: f64 },
    NonFinitePortfolioField,
    InvalidPortfolioState { equity: f64, total_capital: f64 },
    InvalidCandle { timestamp: DateTime<Utc> },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::EmptyPair => write!(f, "snapshot has an empty trading pair"),
            SnapshotError::InvalidPrice { price } => {
                write!(f, "current price {} is not a valid positive number", price)
            }
            SnapshotError::NonFinitePortfolioField => {
                write!(f, "portfolio snapshot contains a non-finite field")
            }
            SnapshotError::InvalidPortfolioState {
                equity,
                total_capital,
            } => write!(
                f,
                "portfolio state invalid: equity={}, total_capital={}",
                equity, total_capital
            ),
            SnapshotError::InvalidCandle { timestamp } => {
                write!(f, "candle at {} has high < low", timestamp)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}
