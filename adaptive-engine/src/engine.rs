//! Regime-adaptive gate
//!
//! Combines edge calculation, the per-regime adaptive threshold and the
//! portfolio gate into one accept/wait/reject decision, logging every
//! reject into the feedback loop.

use chrono::{DateTime, Utc};
use common::{FactorCategory, PortfolioSnapshot};
use regime::{MarketRegime, RegimeType};
use serde::{Deserialize, Serialize};
use signal_generation::EnhancedSignal;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::edge::{EdgeCalculator, EdgeMetrics};
use crate::learning::LearningManager;
use crate::portfolio_gate::{PortfolioGate, PortfolioVeto};
use crate::rejections::{RejectionLog, RejectionRecord};
use crate::thresholds::ThresholdManager;

/// Terminal action of the regime-adaptive gate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GateAction {
    Accept,
    Wait,
    Reject,
}

/// Gate outcome with the full edge decomposition behind it
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub action: GateAction,
    pub edge: EdgeMetrics,
    pub threshold: f64,
    pub veto: Option<PortfolioVeto>,
    pub summary: String,
}

/// Owns all long-lived adaptive state: thresholds, learning states and
/// the rejection log. Injected into the orchestrator; tests construct
/// isolated instances freely.
#[derive(Debug)]
pub struct RegimeAdaptiveEngine {
    edge_calculator: EdgeCalculator,
    thresholds: ThresholdManager,
    portfolio_gate: PortfolioGate,
    rejections: RejectionLog,
    learning: LearningManager,
}

impl RegimeAdaptiveEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            edge_calculator: EdgeCalculator::new(config.costs.clone()),
            thresholds: ThresholdManager::new(config.thresholds.clone()),
            portfolio_gate: PortfolioGate::new(config.portfolio.clone()),
            rejections: RejectionLog::new(),
            learning: LearningManager::new(config.learning),
        }
    }

    /// Feature weights the base model should apply for this regime.
    pub fn feature_weights(&self, regime_type: RegimeType) -> HashMap<FactorCategory, f64> {
        self.learning.weights(regime_type)
    }

    pub fn threshold_for(&mut self, regime_type: RegimeType) -> f64 {
        self.thresholds.current(regime_type)
    }

    /// Observable counters for behavioral tests.
    pub fn rejection_count(&self) -> usize {
        self.rejections.len()
    }

    pub fn rejection_analyses_run(&self) -> u64 {
        self.rejections.analyses_run()
    }

    /// Evaluate one enhanced signal. Accept requires net edge at or
    /// above the regime threshold AND a passing portfolio gate; a
    /// positive-but-short edge waits; everything else rejects.
    pub fn evaluate(
        &mut self,
        signal: &EnhancedSignal,
        regime: &MarketRegime,
        portfolio: &PortfolioSnapshot,
        now: DateTime<Utc>,
    ) -> GateDecision {
        let edge = self.edge_calculator.calculate(signal, regime, portfolio);
        let threshold = self.thresholds.current(regime.regime_type);
        let veto = self.portfolio_gate.check(signal, portfolio).err();

        let (action, summary) = if let Some(veto) = &veto {
            (GateAction::Reject, format!("portfolio veto: {}", veto))
        } else if edge.net_edge >= threshold {
            (
                GateAction::Accept,
                format!(
                    "net edge {:.4} clears the {} threshold {:.4}",
                    edge.net_edge,
                    regime.regime_type.key(),
                    threshold
                ),
            )
        } else if edge.net_edge > 0.0 {
            (
                GateAction::Wait,
                format!(
                    "net edge {:.4} is positive but below the {:.4} threshold",
                    edge.net_edge, threshold
                ),
            )
        } else {
            (
                GateAction::Reject,
                format!("net edge {:.4} is not positive after costs", edge.net_edge),
            )
        };

        if action == GateAction::Reject {
            let analysis = self.rejections.record(RejectionRecord {
                timestamp: now,
                reason: summary.clone(),
                regime_type: regime.regime_type,
                signal_id: signal.id(),
                pair: signal.candidate.pair.clone(),
                net_edge: edge.net_edge,
            });
            if let Some(analysis) = analysis {
                for regime_type in analysis.over_rejected {
                    info!(
                        regime = regime_type.key(),
                        "Auto-relaxing threshold after rejection pattern"
                    );
                    self.thresholds.relax(regime_type);
                }
            }
        }

        debug!(
            signal_id = %signal.id(),
            action = ?action,
            net_edge = format!("{:.5}", edge.net_edge),
            threshold = format!("{:.5}", threshold),
            "Gate decision"
        );

        GateDecision {
            action,
            edge,
            threshold,
            veto,
            summary,
        }
    }

    /// Feed a realized outcome back into threshold tuning and feature
    /// learning. `categories` are the factor categories that voted for
    /// the original signal.
    pub fn record_outcome(
        &mut self,
        regime_type: RegimeType,
        categories: &[FactorCategory],
        pnl_r: f64,
        now: DateTime<Utc>,
    ) {
        self.thresholds.record_trade(regime_type, pnl_r, now);
        self.learning.record_trade(regime_type, categories, pnl_r, now);
    }
}

impl Default for RegimeAdaptiveEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::TradeDirection;
    use regime::BarrierLevels;
    use rust_decimal::Decimal;
    use signal_generation::{
        CandidateSignal, ExpectedOutcome, MetaPrediction, Recommendation, RiskProfile,
    };
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn signal(probability: f64, tp: i64, sl: i64) -> EnhancedSignal {
        let id = Uuid::new_v4();
        EnhancedSignal {
            candidate: CandidateSignal {
                id,
                timestamp: now(),
                pair: "EURUSD".to_string(),
                direction: TradeDirection::Buy,
                entry_price: Decimal::from(100),
                confidence: 0.7,
                factors: Vec::new(),
                raw_strength: 25.0,
            },
            prediction: MetaPrediction {
                signal_id: id,
                probability_tp_first: probability,
                volatility_risk: 0.3,
                liquidity_risk: 0.3,
                event_risk: 0.0,
                combined_risk: 0.21,
                expected_outcome: ExpectedOutcome {
                    expected_return: 0.01,
                    expected_holding_minutes: 240.0,
                    risk_adjusted_return: 1.5,
                    max_drawdown_risk: 0.3,
                },
                confidence_interval: (probability - 0.05, probability + 0.05),
                regime_type: RegimeType::TrendingBullish,
                market_conditions: String::new(),
            },
            barriers: BarrierLevels {
                stop_loss: Decimal::from(sl),
                take_profit: Decimal::from(tp),
            },
            final_score: 0.65,
            recommendation: Recommendation::Buy,
            risk_profile: RiskProfile::Moderate,
        }
    }

    fn trending() -> MarketRegime {
        let mut regime = MarketRegime::neutral();
        regime.regime_type = RegimeType::TrendingBullish;
        regime.volatility = 0.4;
        regime.market_depth = 0.7;
        regime
    }

    #[test]
    fn test_accept_requires_edge_and_gate() {
        let mut engine = RegimeAdaptiveEngine::default();
        // Wide target, high probability: strong positive edge.
        let decision = engine.evaluate(
            &signal(0.75, 105, 99),
            &trending(),
            &PortfolioSnapshot::default(),
            now(),
        );
        assert_eq!(decision.action, GateAction::Accept);
        assert!(decision.edge.net_edge >= decision.threshold);
        assert!(decision.veto.is_none());
    }

    #[test]
    fn test_thin_positive_edge_waits() {
        let mut engine = RegimeAdaptiveEngine::default();
        // Tight target keeps the net edge positive but small.
        let decision = engine.evaluate(
            &signal(0.60, 101, 99),
            &trending(),
            &PortfolioSnapshot::default(),
            now(),
        );
        assert_eq!(decision.action, GateAction::Wait);
        assert!(decision.edge.net_edge > 0.0);
        assert!(decision.edge.net_edge < decision.threshold);
    }

    #[test]
    fn test_negative_edge_rejects_and_logs() {
        let mut engine = RegimeAdaptiveEngine::default();
        let decision = engine.evaluate(
            &signal(0.30, 101, 98),
            &trending(),
            &PortfolioSnapshot::default(),
            now(),
        );
        assert_eq!(decision.action, GateAction::Reject);
        assert_eq!(engine.rejection_count(), 1);
    }

    #[test]
    fn test_portfolio_veto_rejects_even_with_edge() {
        let mut engine = RegimeAdaptiveEngine::default();
        let portfolio = PortfolioSnapshot {
            open_positions: vec![common::OpenPosition {
                pair: "EURUSD".to_string(),
                direction: TradeDirection::Buy,
                entry_price: 100.0,
                size: 10.0,
                risk_amount: 100.0,
            }],
            total_risk: 1_000.0,
            sharpe_ratio: 1.0,
            ..PortfolioSnapshot::default()
        };
        let decision = engine.evaluate(&signal(0.75, 105, 99), &trending(), &portfolio, now());
        assert_eq!(decision.action, GateAction::Reject);
        assert!(decision.veto.is_some());
    }

    #[test]
    fn test_rejection_pattern_relaxes_threshold() {
        let mut engine = RegimeAdaptiveEngine::default();
        let before = engine.threshold_for(RegimeType::TrendingBullish);
        // 50 rejections in one regime: the 50th append runs the pattern
        // analysis, finds >20 in the window, and relaxes by 5%.
        for _ in 0..50 {
            engine.evaluate(
                &signal(0.30, 101, 98),
                &trending(),
                &PortfolioSnapshot::default(),
                now(),
            );
        }
        assert_eq!(engine.rejection_analyses_run(), 1);
        let after = engine.threshold_for(RegimeType::TrendingBullish);
        assert!((after - before * 0.95).abs() < 1e-12, "after={}, before={}", after, before);
    }

    #[test]
    fn test_outcomes_feed_learning_and_thresholds() {
        let mut engine = RegimeAdaptiveEngine::default();
        for _ in 0..20 {
            engine.record_outcome(
                RegimeType::TrendingBullish,
                &[FactorCategory::Momentum],
                1.5,
                now(),
            );
        }
        let weights = engine.feature_weights(RegimeType::TrendingBullish);
        assert!(weights[&FactorCategory::Momentum] > 1.0);
    }
}
