// Scenario, warning and suggestion synthesis
// Rule-based context attached to every terminal recommendation

use microstructure::{EntryTiming, MicroRegime, MicrostructureState};
use regime::MarketRegime;
use signal_generation::EnhancedSignal;

use crate::decision::{
    AlternativeScenario, OptimizationSuggestion, RiskWarning, ScenarioKind, SuggestionKind,
    WarningCode,
};

/// Alternative what-if branches for the decided signal.
pub fn alternative_scenarios(
    signal: Option<&EnhancedSignal>,
    regime: &MarketRegime,
    micro: Option<&MicrostructureState>,
) -> Vec<AlternativeScenario> {
    let bias = regime.regime_type.directional_bias();
    let probability_up = 0.30 + 0.10 * bias;
    let probability_down = 0.30 - 0.10 * bias;

    let liquidity_probability = micro
        .map(|m| match m.regime {
            MicroRegime::Illiquid | MicroRegime::Toxic => 0.25,
            MicroRegime::Stressed | MicroRegime::SweepZone => 0.18,
            MicroRegime::Normal => 0.08,
        })
        .unwrap_or(0.10);

    let shift_probability = (1.0 - regime.confidence) * 0.3;

    let held = signal.map(|s| s.candidate.direction);
    let favorable_multiplier = 1.4;
    let adverse_multiplier = 0.5;
    let (bull_multiplier, bear_multiplier) = match held {
        Some(common::TradeDirection::Buy) | None => (favorable_multiplier, adverse_multiplier),
        Some(common::TradeDirection::Sell) => (adverse_multiplier, favorable_multiplier),
    };

    vec![
        AlternativeScenario {
            kind: ScenarioKind::BullContinuation,
            probability: probability_up,
            outcome_multiplier: bull_multiplier,
            description: "buyers extend the move; targets reached faster".to_string(),
        },
        AlternativeScenario {
            kind: ScenarioKind::BearReversal,
            probability: probability_down,
            outcome_multiplier: bear_multiplier,
            description: "sellers reverse the move; stops come into play".to_string(),
        },
        AlternativeScenario {
            kind: ScenarioKind::RegimeShift,
            probability: shift_probability,
            outcome_multiplier: 0.7,
            description: format!(
                "the {} regime breaks down before the trade resolves",
                regime.regime_type.key()
            ),
        },
        AlternativeScenario {
            kind: ScenarioKind::LiquidityDeterioration,
            probability: liquidity_probability,
            outcome_multiplier: 0.6,
            description: "book depth thins out, widening costs and slippage".to_string(),
        },
    ]
}

/// Rule-based warnings from regime, signal and microstructure state.
pub fn risk_warnings(
    signal: Option<&EnhancedSignal>,
    regime: &MarketRegime,
    micro: Option<&MicrostructureState>,
) -> Vec<RiskWarning> {
    let mut warnings = Vec::new();

    if regime.regime_type.is_crisis() {
        warnings.push(RiskWarning {
            code: WarningCode::CrisisRegime,
            message: format!(
                "market is in a {} regime; risk multiplier {:.1}x",
                regime.regime_type.key(),
                regime.risk_multiplier
            ),
        });
    }
    if regime.market_depth < 0.3 {
        warnings.push(RiskWarning {
            code: WarningCode::ThinMarketDepth,
            message: format!("market depth {:.2} is thin for normal sizing", regime.market_depth),
        });
    }

    if let Some(signal) = signal {
        if signal.prediction.combined_risk > 0.6 {
            warnings.push(RiskWarning {
                code: WarningCode::HighCombinedRisk,
                message: format!(
                    "combined risk {:.2} (vol {:.2} / liq {:.2} / event {:.2})",
                    signal.prediction.combined_risk,
                    signal.prediction.volatility_risk,
                    signal.prediction.liquidity_risk,
                    signal.prediction.event_risk
                ),
            });
        }
        if signal.prediction.event_risk > 0.5 {
            warnings.push(RiskWarning {
                code: WarningCode::EventProximity,
                message: "high-impact news event inside the risk window".to_string(),
            });
        }
        if signal.candidate.confidence < 0.4 {
            warnings.push(RiskWarning {
                code: WarningCode::LowSignalConfidence,
                message: format!(
                    "candidate confidence {:.2} is near the admission floor",
                    signal.candidate.confidence
                ),
            });
        }
    }

    if let Some(micro) = micro {
        if micro.regime == MicroRegime::Toxic {
            warnings.push(RiskWarning {
                code: WarningCode::ToxicMicrostructure,
                message: format!("order book toxicity {:.2}", micro.liquidity.toxicity),
            });
        }
        if micro.execution.sweep_risk > 0.5 {
            warnings.push(RiskWarning {
                code: WarningCode::SweepRisk,
                message: format!(
                    "liquidity sweep risk {:.2} near tracked levels",
                    micro.execution.sweep_risk
                ),
            });
        }
    }

    warnings
}

/// Position-sizing, timing and barrier suggestions.
pub fn optimization_suggestions(
    signal: Option<&EnhancedSignal>,
    regime: &MarketRegime,
    timing: Option<&EntryTiming>,
) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();

    if let Some(signal) = signal {
        let kelly = kelly_fraction(
            signal.prediction.probability_tp_first,
            signal.barriers.risk_reward(signal.candidate.entry_price),
        );
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::PositionSizing,
            message: format!(
                "half-Kelly sizing suggests {:.1}% of capital (capped at 25%)",
                kelly * 100.0
            ),
            value: Some(kelly),
        });

        if regime.volatility > 0.7 {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::BarrierWidening,
                message: format!(
                    "volatility {:.2} argues for wider stops than the base ATR multiple",
                    regime.volatility
                ),
                value: Some(1.0 + regime.volatility - 0.5),
            });
        }
    }

    match timing {
        Some(EntryTiming::Wait { minutes, reasoning }) => {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::EntryTiming,
                message: format!("delay entry ~{:.0}m: {}", minutes, reasoning),
                value: Some(*minutes),
            });
        }
        Some(EntryTiming::PostSweep { reasoning }) => {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::EntryTiming,
                message: format!("enter after the sweep resolves: {}", reasoning),
                value: None,
            });
        }
        _ => {}
    }

    suggestions
}

/// Half-Kelly fraction capped at 25% of capital.
/// f* = (b*p - q) / b, with b the reward-to-risk ratio.
fn kelly_fraction(probability: f64, risk_reward: f64) -> f64 {
    if risk_reward <= 0.0 {
        return 0.0;
    }
    let q = 1.0 - probability;
    let kelly = (risk_reward * probability - q) / risk_reward;
    (kelly * 0.5).clamp(0.0, 0.25)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::TradeDirection;
    use regime::{BarrierLevels, RegimeType};
    use rust_decimal::Decimal;
    use signal_generation::{
        CandidateSignal, ExpectedOutcome, MetaPrediction, Recommendation, RiskProfile,
    };
    use uuid::Uuid;

    fn signal(probability: f64, combined_risk: f64) -> EnhancedSignal {
        let id = Uuid::new_v4();
        EnhancedSignal {
            candidate: CandidateSignal {
                id,
                timestamp: Utc::now(),
                pair: "EURUSD".to_string(),
                direction: TradeDirection::Buy,
                entry_price: Decimal::from(100),
                confidence: 0.7,
                factors: Vec::new(),
                raw_strength: 20.0,
            },
            prediction: MetaPrediction {
                signal_id: id,
                probability_tp_first: probability,
                volatility_risk: combined_risk,
                liquidity_risk: combined_risk,
                event_risk: 0.0,
                combined_risk,
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
                stop_loss: Decimal::from(99),
                take_profit: Decimal::new(1025, 1),
            },
            final_score: 0.65,
            recommendation: Recommendation::Buy,
            risk_profile: RiskProfile::Moderate,
        }
    }

    #[test]
    fn test_four_scenarios_always_present() {
        let scenarios = alternative_scenarios(None, &MarketRegime::neutral(), None);
        assert_eq!(scenarios.len(), 4);
        assert!(scenarios.iter().all(|s| (0.0..=1.0).contains(&s.probability)));
    }

    #[test]
    fn test_kelly_capped_at_quarter() {
        // Overwhelming edge still caps at 25%.
        assert_eq!(kelly_fraction(0.95, 5.0), 0.25);
        // Negative-edge setups size to zero.
        assert_eq!(kelly_fraction(0.2, 1.0), 0.0);
    }

    #[test]
    fn test_sizing_suggestion_attached_for_signal() {
        let s = signal(0.68, 0.2);
        let suggestions =
            optimization_suggestions(Some(&s), &MarketRegime::neutral(), None);
        assert!(suggestions
            .iter()
            .any(|x| x.kind == SuggestionKind::PositionSizing && x.value.unwrap() <= 0.25));
    }

    #[test]
    fn test_high_risk_signal_warns() {
        let s = signal(0.6, 0.7);
        let warnings = risk_warnings(Some(&s), &MarketRegime::neutral(), None);
        assert!(warnings.iter().any(|w| w.code == WarningCode::HighCombinedRisk));
    }

    #[test]
    fn test_crisis_regime_warns() {
        let mut regime = MarketRegime::neutral();
        regime.regime_type = RegimeType::LiquidityCrisis;
        let warnings = risk_warnings(None, &regime, None);
        assert!(warnings.iter().any(|w| w.code == WarningCode::CrisisRegime));
    }

    #[test]
    fn test_wait_timing_becomes_suggestion() {
        let timing = EntryTiming::Wait {
            minutes: 15.0,
            reasoning: "stressed book".to_string(),
        };
        let suggestions =
            optimization_suggestions(None, &MarketRegime::neutral(), Some(&timing));
        assert!(suggestions.iter().any(|x| x.kind == SuggestionKind::EntryTiming));
    }
}
