// Signal Enhancement
// Final scoring, recommendation tier and risk profile for a candidate

use common::TradeDirection;
use regime::BarrierLevels;
use tracing::debug;

use crate::signals::{
    CandidateSignal, EnhancedSignal, MetaPrediction, Recommendation, RiskProfile,
};

/// Combine a candidate and its meta prediction into an enhanced signal.
pub fn enhance(
    candidate: CandidateSignal,
    prediction: MetaPrediction,
    barriers: BarrierLevels,
) -> EnhancedSignal {
    let final_score =
        0.4 * candidate.confidence + 0.6 * prediction.probability_tp_first;
    let risk_adjusted_score = final_score * (1.0 - 0.5 * prediction.combined_risk);
    let rar = prediction.expected_outcome.risk_adjusted_return;

    let recommendation = recommendation_tier(candidate.direction, risk_adjusted_score, rar);
    let risk_profile = risk_profile(prediction.combined_risk, prediction.probability_tp_first);

    debug!(
        signal_id = %candidate.id,
        final_score = format!("{:.3}", final_score),
        recommendation = ?recommendation,
        "Signal enhanced"
    );

    EnhancedSignal {
        candidate,
        prediction,
        barriers,
        final_score: final_score.clamp(0.0, 1.0),
        recommendation,
        risk_profile,
    }
}

/// Fixed cut points keyed on (risk-adjusted score, risk-adjusted return).
/// The strong/full/weak levels map onto the candidate's own direction.
fn recommendation_tier(
    direction: TradeDirection,
    risk_adjusted_score: f64,
    risk_adjusted_return: f64,
) -> Recommendation {
    let tier = if risk_adjusted_score >= 0.8 && risk_adjusted_return > 2.0 {
        3
    } else if risk_adjusted_score >= 0.65 && risk_adjusted_return > 1.0 {
        2
    } else if risk_adjusted_score >= 0.55 && risk_adjusted_return > 0.0 {
        1
    } else {
        0
    };

    match (direction, tier) {
        (_, 0) => Recommendation::Hold,
        (TradeDirection::Buy, 3) => Recommendation::StrongBuy,
        (TradeDirection::Buy, 2) => Recommendation::Buy,
        (TradeDirection::Buy, _) => Recommendation::WeakBuy,
        (TradeDirection::Sell, 3) => Recommendation::StrongSell,
        (TradeDirection::Sell, 2) => Recommendation::Sell,
        (TradeDirection::Sell, _) => Recommendation::WeakSell,
    }
}

fn risk_profile(combined_risk: f64, probability: f64) -> RiskProfile {
    if combined_risk < 0.3 && probability > 0.65 {
        RiskProfile::Aggressive
    } else if combined_risk < 0.55 {
        RiskProfile::Moderate
    } else {
        RiskProfile::Conservative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regime::RegimeType;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::signals::ExpectedOutcome;

    fn candidate(direction: TradeDirection, confidence: f64) -> CandidateSignal {
        CandidateSignal {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            pair: "EURUSD".to_string(),
            direction,
            entry_price: Decimal::from(100),
            confidence,
            factors: Vec::new(),
            raw_strength: 20.0,
        }
    }

    fn prediction(id: Uuid, probability: f64, combined_risk: f64, rar: f64) -> MetaPrediction {
        MetaPrediction {
            signal_id: id,
            probability_tp_first: probability,
            volatility_risk: combined_risk,
            liquidity_risk: combined_risk,
            event_risk: 0.0,
            combined_risk,
            expected_outcome: ExpectedOutcome {
                expected_return: 0.01,
                expected_holding_minutes: 240.0,
                risk_adjusted_return: rar,
                max_drawdown_risk: 0.3,
            },
            confidence_interval: (probability - 0.05, probability + 0.05),
            regime_type: RegimeType::TrendingBullish,
            market_conditions: String::new(),
        }
    }

    fn levels() -> BarrierLevels {
        BarrierLevels {
            stop_loss: Decimal::from(99),
            take_profit: Decimal::from(102),
        }
    }

    #[test]
    fn test_strong_buy_requires_high_score_and_return() {
        let c = candidate(TradeDirection::Buy, 0.9);
        let p = prediction(c.id, 0.9, 0.1, 3.0);
        let enhanced = enhance(c, p, levels());
        assert_eq!(enhanced.recommendation, Recommendation::StrongBuy);
        assert_eq!(enhanced.risk_profile, RiskProfile::Aggressive);
    }

    #[test]
    fn test_weak_setup_holds() {
        let c = candidate(TradeDirection::Buy, 0.4);
        let p = prediction(c.id, 0.4, 0.6, -0.5);
        let enhanced = enhance(c, p, levels());
        assert_eq!(enhanced.recommendation, Recommendation::Hold);
        assert_eq!(enhanced.risk_profile, RiskProfile::Conservative);
    }

    #[test]
    fn test_sell_direction_maps_to_sell_tiers() {
        let c = candidate(TradeDirection::Sell, 0.85);
        let p = prediction(c.id, 0.85, 0.15, 2.5);
        let enhanced = enhance(c, p, levels());
        assert_eq!(enhanced.recommendation, Recommendation::StrongSell);
    }

    #[test]
    fn test_final_score_blend() {
        let c = candidate(TradeDirection::Buy, 0.5);
        let p = prediction(c.id, 0.8, 0.2, 1.5);
        let enhanced = enhance(c, p, levels());
        assert!((enhanced.final_score - (0.4 * 0.5 + 0.6 * 0.8)).abs() < 1e-9);
    }

    #[test]
    fn test_high_risk_demotes_tier() {
        let c = candidate(TradeDirection::Buy, 0.9);
        let low_risk = prediction(c.id, 0.9, 0.05, 3.0);
        let high_risk = prediction(c.id, 0.9, 0.9, 3.0);
        let a = enhance(c.clone(), low_risk, levels());
        let b = enhance(c, high_risk, levels());
        assert_eq!(a.recommendation, Recommendation::StrongBuy);
        assert_ne!(b.recommendation, Recommendation::StrongBuy);
    }
}
