// Base Model (Layer 1)
// Runs the factor analyzers and groups regime-filtered confluence into
// candidate signals. Intentionally over-generates; filtering is downstream.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{FactorCategory, MarketSnapshot, TradeDirection};
use regime::MarketRegime;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::factors::{
    FactorAnalyzer, MomentumAnalyzer, PatternAnalyzer, TechnicalAnalyzer, VolumeAnalyzer,
};
use crate::signals::{CandidateSignal, FactorDirection, TechnicalFactor};

/// Configuration for candidate generation
#[derive(Debug, Clone)]
pub struct BaseModelConfig {
    /// Factors that must agree on a direction to form a candidate
    pub min_agreeing_factors: usize,
    /// Minimum mean factor confidence to admit a candidate
    pub min_candidate_confidence: f64,
    /// Scaled factor strength at or below this is dropped
    pub min_factor_strength: f64,
}

impl Default for BaseModelConfig {
    fn default() -> Self {
        Self {
            min_agreeing_factors: 3,
            min_candidate_confidence: 0.3,
            min_factor_strength: 2.0,
        }
    }
}

/// Layer-1 candidate detector
pub struct BaseModel {
    analyzers: Vec<Box<dyn FactorAnalyzer>>,
    config: BaseModelConfig,
}

impl BaseModel {
    pub fn new(config: BaseModelConfig) -> Self {
        Self {
            analyzers: Vec::new(),
            config,
        }
    }

    /// Standard four-analyzer setup: technical, pattern, volume, momentum.
    pub fn with_default_analyzers(config: BaseModelConfig) -> Self {
        Self::new(config)
            .add_analyzer(Box::new(TechnicalAnalyzer))
            .add_analyzer(Box::new(PatternAnalyzer))
            .add_analyzer(Box::new(VolumeAnalyzer::default()))
            .add_analyzer(Box::new(MomentumAnalyzer::default()))
    }

    pub fn add_analyzer(mut self, analyzer: Box<dyn FactorAnalyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    pub fn analyzer_count(&self) -> usize {
        self.analyzers.len()
    }

    /// Generate candidate signals for the snapshot. `feature_weights`
    /// carries the online-learning multipliers for the current regime;
    /// pass an empty map to use raw regime scaling only.
    pub fn generate_candidates(
        &self,
        snapshot: &MarketSnapshot,
        regime: &MarketRegime,
        feature_weights: &HashMap<FactorCategory, f64>,
        now: DateTime<Utc>,
    ) -> Vec<CandidateSignal> {
        let mut scaled: Vec<TechnicalFactor> = Vec::new();
        for analyzer in &self.analyzers {
            let factors = analyzer.analyze(snapshot);
            debug!(
                category = ?analyzer.category(),
                count = factors.len(),
                "Factor analyzer ran"
            );
            for factor in factors {
                let regime_adjust = regime.adjustment_factors.get(factor.category);
                let learned = feature_weights
                    .get(&factor.category)
                    .copied()
                    .unwrap_or(1.0);
                let candidate = factor.scaled(regime_adjust * learned);
                if candidate.strength > self.config.min_factor_strength {
                    scaled.push(candidate);
                } else {
                    debug!(
                        name = %candidate.name,
                        strength = format!("{:.2}", candidate.strength),
                        "Factor dropped after regime scaling"
                    );
                }
            }
        }

        let mut candidates = Vec::new();
        for direction in [TradeDirection::Buy, TradeDirection::Sell] {
            let wanted = match direction {
                TradeDirection::Buy => FactorDirection::Buy,
                TradeDirection::Sell => FactorDirection::Sell,
            };
            let agreeing: Vec<TechnicalFactor> = scaled
                .iter()
                .filter(|f| f.direction == wanted)
                .cloned()
                .collect();
            if agreeing.len() < self.config.min_agreeing_factors {
                continue;
            }

            let confidence =
                agreeing.iter().map(|f| f.confidence).sum::<f64>() / agreeing.len() as f64;
            if confidence < self.config.min_candidate_confidence {
                debug!(
                    direction = ?direction,
                    confidence = format!("{:.2}", confidence),
                    "Confluence found but confidence too low"
                );
                continue;
            }

            let raw_strength = agreeing.iter().map(|f| f.strength).sum::<f64>();
            candidates.push(CandidateSignal {
                id: Uuid::new_v4(),
                timestamp: now,
                pair: snapshot.pair.clone(),
                direction,
                entry_price: Decimal::from_f64(snapshot.current_price)
                    .unwrap_or(Decimal::ZERO),
                confidence,
                factors: agreeing,
                raw_strength,
            });
        }

        info!(
            candidates = candidates.len(),
            pair = %snapshot.pair,
            "Candidate generation complete"
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Candle, PortfolioSnapshot};

    struct FixedAnalyzer {
        category: FactorCategory,
        factors: Vec<TechnicalFactor>,
    }

    impl FactorAnalyzer for FixedAnalyzer {
        fn category(&self) -> FactorCategory {
            self.category
        }

        fn analyze(&self, _snapshot: &MarketSnapshot) -> Vec<TechnicalFactor> {
            self.factors.clone()
        }
    }

    fn factor(category: FactorCategory, direction: FactorDirection, strength: f64) -> TechnicalFactor {
        TechnicalFactor::new(category, "test_factor", direction, strength, 0.7)
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            pair: "EURUSD".to_string(),
            candles: vec![
                Candle {
                    timestamp: Utc::now(),
                    open: 1.1,
                    high: 1.11,
                    low: 1.09,
                    close: 1.1,
                    volume: 1000.0,
                };
                30
            ],
            current_price: 1.1,
            volumes: vec![1000.0; 30],
            order_book: None,
            recent_trades: Vec::new(),
            news_events: Vec::new(),
            portfolio: PortfolioSnapshot::default(),
            timestamp: Utc::now(),
        }
    }

    fn model_with_buy_factors(count: usize, strength: f64) -> BaseModel {
        let factors: Vec<TechnicalFactor> = (0..count)
            .map(|_| factor(FactorCategory::Technical, FactorDirection::Buy, strength))
            .collect();
        BaseModel::new(BaseModelConfig::default()).add_analyzer(Box::new(FixedAnalyzer {
            category: FactorCategory::Technical,
            factors,
        }))
    }

    #[test]
    fn test_three_agreeing_factors_form_candidate() {
        let model = model_with_buy_factors(3, 6.0);
        let candidates = model.generate_candidates(
            &snapshot(),
            &MarketRegime::neutral(),
            &HashMap::new(),
            Utc::now(),
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].direction, TradeDirection::Buy);
        assert!((0.0..=1.0).contains(&candidates[0].confidence));
    }

    #[test]
    fn test_two_factors_are_not_enough() {
        let model = model_with_buy_factors(2, 6.0);
        let candidates = model.generate_candidates(
            &snapshot(),
            &MarketRegime::neutral(),
            &HashMap::new(),
            Utc::now(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_weak_factors_dropped_after_scaling() {
        // Strength 2.5 scaled by a crisis technical factor of 0.5 is 1.25,
        // below the 2.0 floor, so no candidate forms.
        let model = model_with_buy_factors(4, 2.5);
        let mut regime = MarketRegime::neutral();
        regime.adjustment_factors.technical = 0.5;
        let candidates =
            model.generate_candidates(&snapshot(), &regime, &HashMap::new(), Utc::now());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_learned_weights_can_revive_category() {
        let model = model_with_buy_factors(3, 2.5);
        let mut regime = MarketRegime::neutral();
        regime.adjustment_factors.technical = 0.5;
        let mut weights = HashMap::new();
        weights.insert(FactorCategory::Technical, 2.0);
        let candidates = model.generate_candidates(&snapshot(), &regime, &weights, Utc::now());
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_neutral_factors_never_vote() {
        let factors = vec![
            factor(FactorCategory::Pattern, FactorDirection::Neutral, 8.0),
            factor(FactorCategory::Pattern, FactorDirection::Neutral, 8.0),
            factor(FactorCategory::Pattern, FactorDirection::Neutral, 8.0),
        ];
        let model = BaseModel::new(BaseModelConfig::default()).add_analyzer(Box::new(
            FixedAnalyzer {
                category: FactorCategory::Pattern,
                factors,
            },
        ));
        let candidates = model.generate_candidates(
            &snapshot(),
            &MarketRegime::neutral(),
            &HashMap::new(),
            Utc::now(),
        );
        assert!(candidates.is_empty());
    }
}
