// Signal types
// Factors, candidates, meta predictions and enhanced signals

use chrono::{DateTime, Utc};
use common::{FactorCategory, TradeDirection};
use regime::{BarrierLevels, RegimeType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction a factor votes for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FactorDirection {
    Buy,
    Sell,
    Neutral,
}

impl FactorDirection {
    pub fn as_trade_direction(&self) -> Option<TradeDirection> {
        match self {
            FactorDirection::Buy => Some(TradeDirection::Buy),
            FactorDirection::Sell => Some(TradeDirection::Sell),
            FactorDirection::Neutral => None,
        }
    }
}

/// Atomic unit of evidence emitted by a factor analyzer. Never mutated
/// after creation; regime filtering produces scaled copies instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalFactor {
    pub category: FactorCategory,
    pub name: String,
    pub direction: FactorDirection,
    /// Unbounded in principle, practically 0-10
    pub strength: f64,
    pub confidence: f64,
}

impl TechnicalFactor {
    pub fn new(
        category: FactorCategory,
        name: impl Into<String>,
        direction: FactorDirection,
        strength: f64,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            direction,
            strength,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Copy with strength scaled by a regime/learning multiplier.
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self {
            strength: self.strength * multiplier,
            ..self.clone()
        }
    }
}

/// Provisional trade direction produced by factor confluence.
/// Immutable once created; multiple candidates may coexist per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSignal {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub direction: TradeDirection,
    pub entry_price: Decimal,
    pub confidence: f64,
    pub factors: Vec<TechnicalFactor>,
    pub raw_strength: f64,
}

impl CandidateSignal {
    pub fn avg_factor_strength(&self) -> f64 {
        if self.factors.is_empty() {
            return 0.0;
        }
        self.factors.iter().map(|f| f.strength).sum::<f64>() / self.factors.len() as f64
    }
}

/// Expected trade outcome under the meta model
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    /// Probability-weighted return, fraction of entry price
    pub expected_return: f64,
    pub expected_holding_minutes: f64,
    /// Expected return per unit of combined risk, in R multiples
    pub risk_adjusted_return: f64,
    pub max_drawdown_risk: f64,
}

/// Layer-2 output for one candidate signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPrediction {
    pub signal_id: Uuid,
    /// Probability take-profit is hit before stop-loss, in [0.05, 0.95]
    pub probability_tp_first: f64,
    pub volatility_risk: f64,
    pub liquidity_risk: f64,
    pub event_risk: f64,
    pub combined_risk: f64,
    pub expected_outcome: ExpectedOutcome,
    /// 5th/95th percentile band around probability_tp_first
    pub confidence_interval: (f64, f64),
    pub regime_type: RegimeType,
    pub market_conditions: String,
}

/// Seven-point recommendation scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    WeakBuy,
    Hold,
    WeakSell,
    Sell,
    StrongSell,
}

impl Recommendation {
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Recommendation::Hold)
    }
}

/// Risk posture the signal is suitable for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

/// Candidate plus meta prediction, barriers and final scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedSignal {
    pub candidate: CandidateSignal,
    pub prediction: MetaPrediction,
    pub barriers: BarrierLevels,
    pub final_score: f64,
    pub recommendation: Recommendation,
    pub risk_profile: RiskProfile,
}

impl EnhancedSignal {
    pub fn id(&self) -> Uuid {
        self.candidate.id
    }
}
