// Decision types
// Structured, explainable outputs of a decision cycle

use chrono::{DateTime, Utc};
use microstructure::{MicroRegime, MicrostructureState};
use regime::MarketRegime;
use serde::{Deserialize, Serialize};
use signal_generation::EnhancedSignal;
use uuid::Uuid;

use crate::kpis::SystemKpis;

/// Terminal action of a decision cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DecisionAction {
    Accept,
    Reject,
    Wait,
}

/// Machine-checkable category of a reasoning entry. Tests assert on
/// codes; messages are for humans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReasonCode {
    NoCandidates,
    InsufficientData,
    EdgeAccepted,
    EdgeBelowThreshold,
    NegativeEdge,
    PortfolioVeto,
    MicrostructureReject,
    TimingWait,
    RegimeContext,
}

/// One tagged reasoning entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reason {
    pub code: ReasonCode,
    pub message: String,
}

impl Reason {
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Compact microstructure context attached to a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroSummary {
    pub regime: MicroRegime,
    pub execution_score: f64,
    pub sweep_risk: f64,
}

impl From<&MicrostructureState> for MicroSummary {
    fn from(state: &MicrostructureState) -> Self {
        Self {
            regime: state.regime,
            execution_score: state.execution.score,
            sweep_risk: state.execution.sweep_risk,
        }
    }
}

/// Canonical audit record of one decision cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDecision {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub action: DecisionAction,
    pub confidence: f64,
    pub expected_edge: f64,
    pub net_edge: f64,
    pub risk_adjusted_edge: f64,
    /// Regime acceptance threshold the net edge was compared against
    pub threshold: f64,
    pub signal: Option<EnhancedSignal>,
    pub reasons: Vec<Reason>,
    pub regime: MarketRegime,
    pub microstructure: Option<MicroSummary>,
    pub kpis: SystemKpis,
}

impl SystemDecision {
    pub fn has_reason(&self, code: ReasonCode) -> bool {
        self.reasons.iter().any(|r| r.code == code)
    }
}

/// What-if branch attached to a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScenarioKind {
    BullContinuation,
    BearReversal,
    RegimeShift,
    LiquidityDeterioration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeScenario {
    pub kind: ScenarioKind,
    pub probability: f64,
    /// Multiplier on the expected outcome if this branch plays out
    pub outcome_multiplier: f64,
    pub description: String,
}

/// Rule-based risk warning categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WarningCode {
    HighCombinedRisk,
    CrisisRegime,
    EventProximity,
    ToxicMicrostructure,
    SweepRisk,
    ThinMarketDepth,
    LowSignalConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWarning {
    pub code: WarningCode,
    pub message: String,
}

/// Optimization suggestion categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SuggestionKind {
    PositionSizing,
    EntryTiming,
    BarrierWidening,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    pub message: String,
    /// Numeric payload where one applies (e.g. Kelly fraction)
    pub value: Option<f64>,
}

/// Full output of a decision cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingRecommendation {
    pub decision: SystemDecision,
    pub alternative_scenarios: Vec<AlternativeScenario>,
    pub risk_warnings: Vec<RiskWarning>,
    pub optimization_suggestions: Vec<OptimizationSuggestion>,
}

/// Realized outcome fed back by the consuming layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActualOutcome {
    /// Realized return in R multiples
    pub pnl_r: f64,
    pub hit_take_profit: bool,
    pub resolved_at: DateTime<Utc>,
}
