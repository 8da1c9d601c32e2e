// Signal Archive
// Bounded record of enhanced signals and their resolved outcomes, used for
// the meta model's historical-performance adjustment

use chrono::{DateTime, Utc};
use common::{BoundedHistory, TradeDirection};
use regime::RegimeType;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::signals::EnhancedSignal;

/// Realized result of a signal, fed back by the consuming layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolvedOutcome {
    /// Realized return in R multiples (1.0 = one stop-distance gained)
    pub pnl_r: f64,
    pub hit_take_profit: bool,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchivedSignal {
    signal_id: Uuid,
    pair: String,
    direction: TradeDirection,
    regime_type: RegimeType,
    probability_tp_first: f64,
    final_score: f64,
    recorded_at: DateTime<Utc>,
    outcome: Option<ResolvedOutcome>,
}

/// Aggregate performance for prior signals in one regime
#[derive(Debug, Clone, Copy)]
pub struct RegimeStats {
    pub resolved: usize,
    pub win_rate: f64,
    pub avg_pnl_r: f64,
}

/// Bounded archive of produced signals. Owned by the prediction system;
/// the orchestrator is the only writer.
#[derive(Debug)]
pub struct SignalArchive {
    records: BoundedHistory<ArchivedSignal>,
}

impl SignalArchive {
    pub fn new() -> Self {
        Self {
            records: BoundedHistory::new(1000),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record a freshly enhanced signal.
    pub fn record(&mut self, signal: &EnhancedSignal) {
        self.records.push(ArchivedSignal {
            signal_id: signal.id(),
            pair: signal.candidate.pair.clone(),
            direction: signal.candidate.direction,
            regime_type: signal.prediction.regime_type,
            probability_tp_first: signal.prediction.probability_tp_first,
            final_score: signal.final_score,
            recorded_at: signal.candidate.timestamp,
            outcome: None,
        });
    }

    /// Attach a realized outcome. Returns false when the signal has
    /// already been evicted from the bounded archive.
    pub fn resolve(&mut self, signal_id: Uuid, outcome: ResolvedOutcome) -> bool {
        for record in self.records.iter_mut() {
            if record.signal_id == signal_id && record.outcome.is_none() {
                record.outcome = Some(outcome);
                debug!(signal_id = %signal_id, pnl_r = outcome.pnl_r, "Signal outcome resolved");
                return true;
            }
        }
        false
    }

    /// Performance of resolved signals in the given regime and direction.
    pub fn regime_stats(&self, regime_type: RegimeType, direction: TradeDirection) -> RegimeStats {
        let resolved: Vec<&ArchivedSignal> = self
            .records
            .iter()
            .filter(|r| {
                r.regime_type == regime_type && r.direction == direction && r.outcome.is_some()
            })
            .collect();

        if resolved.is_empty() {
            return RegimeStats {
                resolved: 0,
                win_rate: 0.0,
                avg_pnl_r: 0.0,
            };
        }

        let wins = resolved
            .iter()
            .filter(|r| r.outcome.map(|o| o.pnl_r > 0.0).unwrap_or(false))
            .count();
        let avg_pnl_r = resolved
            .iter()
            .filter_map(|r| r.outcome.map(|o| o.pnl_r))
            .sum::<f64>()
            / resolved.len() as f64;

        RegimeStats {
            resolved: resolved.len(),
            win_rate: wins as f64 / resolved.len() as f64,
            avg_pnl_r,
        }
    }
}

impl Default for SignalArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{
        CandidateSignal, EnhancedSignal, ExpectedOutcome, MetaPrediction, Recommendation,
        RiskProfile,
    };
    use regime::BarrierLevels;
    use rust_decimal::Decimal;

    fn enhanced(regime_type: RegimeType, direction: TradeDirection) -> EnhancedSignal {
        let id = Uuid::new_v4();
        EnhancedSignal {
            candidate: CandidateSignal {
                id,
                timestamp: Utc::now(),
                pair: "EURUSD".to_string(),
                direction,
                entry_price: Decimal::from(100),
                confidence: 0.7,
                factors: Vec::new(),
                raw_strength: 20.0,
            },
            prediction: MetaPrediction {
                signal_id: id,
                probability_tp_first: 0.6,
                volatility_risk: 0.3,
                liquidity_risk: 0.3,
                event_risk: 0.0,
                combined_risk: 0.21,
                expected_outcome: ExpectedOutcome {
                    expected_return: 0.01,
                    expected_holding_minutes: 240.0,
                    risk_adjusted_return: 1.2,
                    max_drawdown_risk: 0.3,
                },
                confidence_interval: (0.5, 0.7),
                regime_type,
                market_conditions: String::new(),
            },
            barriers: BarrierLevels {
                stop_loss: Decimal::from(99),
                take_profit: Decimal::from(102),
            },
            final_score: 0.64,
            recommendation: Recommendation::Buy,
            risk_profile: RiskProfile::Moderate,
        }
    }

    fn outcome(pnl_r: f64) -> ResolvedOutcome {
        ResolvedOutcome {
            pnl_r,
            hit_take_profit: pnl_r > 0.0,
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_and_stats() {
        let mut archive = SignalArchive::new();
        let mut ids = Vec::new();
        for _ in 0..6 {
            let signal = enhanced(RegimeType::TrendingBullish, TradeDirection::Buy);
            ids.push(signal.id());
            archive.record(&signal);
        }
        for (i, id) in ids.iter().enumerate() {
            let pnl = if i < 4 { 1.5 } else { -1.0 };
            assert!(archive.resolve(*id, outcome(pnl)));
        }

        let stats = archive.regime_stats(RegimeType::TrendingBullish, TradeDirection::Buy);
        assert_eq!(stats.resolved, 6);
        assert!((stats.win_rate - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_signal_not_resolved() {
        let mut archive = SignalArchive::new();
        assert!(!archive.resolve(Uuid::new_v4(), outcome(1.0)));
    }

    #[test]
    fn test_stats_filtered_by_regime_and_direction() {
        let mut archive = SignalArchive::new();
        let signal = enhanced(RegimeType::RangingTight, TradeDirection::Sell);
        let id = signal.id();
        archive.record(&signal);
        archive.resolve(id, outcome(2.0));

        let stats = archive.regime_stats(RegimeType::TrendingBullish, TradeDirection::Sell);
        assert_eq!(stats.resolved, 0);
        let stats = archive.regime_stats(RegimeType::RangingTight, TradeDirection::Sell);
        assert_eq!(stats.resolved, 1);
    }

    #[test]
    fn test_archive_bounded() {
        let mut archive = SignalArchive::new();
        for _ in 0..1200 {
            archive.record(&enhanced(RegimeType::Neutral, TradeDirection::Buy));
        }
        assert_eq!(archive.len(), 1000);
    }
}
