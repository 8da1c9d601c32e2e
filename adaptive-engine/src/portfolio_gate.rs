//! Portfolio-level veto gate
//!
//! Sequential checks against the portfolio snapshot; the first violated
//! limit rejects the candidate with a typed veto.

use common::{PortfolioSnapshot, TradeDirection};
use serde::{Deserialize, Serialize};
use signal_generation::EnhancedSignal;
use tracing::debug;

use crate::config::PortfolioGateConfig;

/// Why the portfolio gate vetoed a candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PortfolioVeto {
    ExcessiveCorrelation {
        pair: String,
        correlation: f64,
    },
    SharpeImpact {
        delta: f64,
    },
    RiskConcentration {
        ratio: f64,
    },
}

impl std::fmt::Display for PortfolioVeto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortfolioVeto::ExcessiveCorrelation { pair, correlation } => write!(
                f,
                "correlation {:.2} with open {} position exceeds the limit",
                correlation, pair
            ),
            PortfolioVeto::SharpeImpact { delta } => {
                write!(f, "simulated portfolio Sharpe impact {:.3} is too negative", delta)
            }
            PortfolioVeto::RiskConcentration { ratio } => write!(
                f,
                "candidate risk is {:.0}% of total portfolio risk",
                ratio * 100.0
            ),
        }
    }
}

/// Checks a candidate against the portfolio snapshot
#[derive(Debug, Clone, Default)]
pub struct PortfolioGate {
    config: PortfolioGateConfig,
}

impl PortfolioGate {
    pub fn new(config: PortfolioGateConfig) -> Self {
        Self { config }
    }

    pub fn check(
        &self,
        signal: &EnhancedSignal,
        portfolio: &PortfolioSnapshot,
    ) -> Result<(), PortfolioVeto> {
        self.check_correlation(signal, portfolio)?;
        self.check_sharpe_impact(signal, portfolio)?;
        self.check_risk_concentration(portfolio)?;
        Ok(())
    }

    /// Same-pair overlap: same direction is near-perfect positive
    /// correlation, opposite is near-perfect negative. Both count as
    /// excessive beyond the configured absolute limit.
    fn check_correlation(
        &self,
        signal: &EnhancedSignal,
        portfolio: &PortfolioSnapshot,
    ) -> Result<(), PortfolioVeto> {
        for position in &portfolio.open_positions {
            if position.pair != signal.candidate.pair {
                continue;
            }
            let correlation: f64 = if position.direction == signal.candidate.direction {
                0.85
            } else {
                -0.85
            };
            if correlation.abs() > self.config.correlation_threshold {
                debug!(
                    pair = %position.pair,
                    correlation,
                    "Portfolio gate: correlation veto"
                );
                return Err(PortfolioVeto::ExcessiveCorrelation {
                    pair: position.pair.clone(),
                    correlation,
                });
            }
        }
        Ok(())
    }

    /// Analytic approximation: the new portfolio Sharpe is the
    /// risk-weighted blend of the candidate's risk-adjusted return and
    /// the current Sharpe. Deterministic by design.
    fn check_sharpe_impact(
        &self,
        signal: &EnhancedSignal,
        portfolio: &PortfolioSnapshot,
    ) -> Result<(), PortfolioVeto> {
        if portfolio.total_risk <= 0.0 {
            return Ok(());
        }
        let candidate_risk = portfolio.equity * self.config.risk_per_trade_fraction;
        let weight = candidate_risk / (portfolio.total_risk + candidate_risk);
        let candidate_sharpe = signal
            .prediction
            .expected_outcome
            .risk_adjusted_return
            .clamp(-3.0, 3.0);
        let new_sharpe = weight * candidate_sharpe + (1.0 - weight) * portfolio.sharpe_ratio;
        let delta = new_sharpe - portfolio.sharpe_ratio;

        if delta < self.config.max_sharpe_impact {
            debug!(delta, "Portfolio gate: Sharpe impact veto");
            return Err(PortfolioVeto::SharpeImpact { delta });
        }
        Ok(())
    }

    fn check_risk_concentration(
        &self,
        portfolio: &PortfolioSnapshot,
    ) -> Result<(), PortfolioVeto> {
        if portfolio.total_risk <= 0.0 {
            return Ok(());
        }
        let candidate_risk = portfolio.equity * self.config.risk_per_trade_fraction;
        let ratio = candidate_risk / portfolio.total_risk;
        if ratio > self.config.max_risk_ratio {
            debug!(ratio, "Portfolio gate: risk concentration veto");
            return Err(PortfolioVeto::RiskConcentration { ratio });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::OpenPosition;
    use regime::{BarrierLevels, RegimeType};
    use rust_decimal::Decimal;
    use signal_generation::{
        CandidateSignal, ExpectedOutcome, MetaPrediction, Recommendation, RiskProfile,
    };
    use uuid::Uuid;

    fn signal(direction: TradeDirection, rar: f64) -> EnhancedSignal {
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
                probability_tp_first: 0.62,
                volatility_risk: 0.3,
                liquidity_risk: 0.3,
                event_risk: 0.0,
                combined_risk: 0.2,
                expected_outcome: ExpectedOutcome {
                    expected_return: 0.01,
                    expected_holding_minutes: 240.0,
                    risk_adjusted_return: rar,
                    max_drawdown_risk: 0.3,
                },
                confidence_interval: (0.55, 0.7),
                regime_type: RegimeType::TrendingBullish,
                market_conditions: String::new(),
            },
            barriers: BarrierLevels {
                stop_loss: Decimal::from(99),
                take_profit: Decimal::from(102),
            },
            final_score: 0.65,
            recommendation: Recommendation::Buy,
            risk_profile: RiskProfile::Moderate,
        }
    }

    fn portfolio_with_position(pair: &str, direction: TradeDirection) -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_risk: 1_000.0,
            sharpe_ratio: 1.0,
            open_positions: vec![OpenPosition {
                pair: pair.to_string(),
                direction,
                entry_price: 100.0,
                size: 10.0,
                risk_amount: 100.0,
            }],
            ..PortfolioSnapshot::default()
        }
    }

    #[test]
    fn test_clean_portfolio_passes() {
        let gate = PortfolioGate::default();
        let portfolio = PortfolioSnapshot {
            total_risk: 1_000.0,
            sharpe_ratio: 0.5,
            ..PortfolioSnapshot::default()
        };
        assert!(gate.check(&signal(TradeDirection::Buy, 1.5), &portfolio).is_ok());
    }

    #[test]
    fn test_same_pair_same_direction_vetoed() {
        let gate = PortfolioGate::default();
        let portfolio = portfolio_with_position("EURUSD", TradeDirection::Buy);
        let veto = gate
            .check(&signal(TradeDirection::Buy, 1.5), &portfolio)
            .unwrap_err();
        assert!(matches!(veto, PortfolioVeto::ExcessiveCorrelation { correlation, .. } if correlation > 0.7));
    }

    #[test]
    fn test_same_pair_opposite_direction_also_vetoed() {
        let gate = PortfolioGate::default();
        let portfolio = portfolio_with_position("EURUSD", TradeDirection::Sell);
        let veto = gate
            .check(&signal(TradeDirection::Buy, 1.5), &portfolio)
            .unwrap_err();
        assert!(matches!(veto, PortfolioVeto::ExcessiveCorrelation { correlation, .. } if correlation < -0.7));
    }

    #[test]
    fn test_different_pair_passes_correlation() {
        let gate = PortfolioGate::default();
        let portfolio = portfolio_with_position("GBPJPY", TradeDirection::Buy);
        assert!(gate.check(&signal(TradeDirection::Buy, 1.5), &portfolio).is_ok());
    }

    #[test]
    fn test_sharpe_dilution_vetoed() {
        let gate = PortfolioGate::default();
        // Strong existing portfolio, sharply negative candidate.
        let portfolio = PortfolioSnapshot {
            total_risk: 200.0,
            sharpe_ratio: 2.0,
            ..PortfolioSnapshot::default()
        };
        let veto = gate
            .check(&signal(TradeDirection::Buy, -3.0), &portfolio)
            .unwrap_err();
        assert!(matches!(veto, PortfolioVeto::SharpeImpact { .. }));
    }

    #[test]
    fn test_risk_concentration_vetoed() {
        let gate = PortfolioGate::default();
        // Candidate risk 100 vs total risk 250 = 40% > 30% cap.
        let portfolio = PortfolioSnapshot {
            total_risk: 250.0,
            sharpe_ratio: 1.0,
            ..PortfolioSnapshot::default()
        };
        let veto = gate
            .check(&signal(TradeDirection::Buy, 1.5), &portfolio)
            .unwrap_err();
        assert!(matches!(veto, PortfolioVeto::RiskConcentration { ratio } if ratio > 0.3));
    }

    #[test]
    fn test_empty_portfolio_risk_passes_concentration() {
        let gate = PortfolioGate::default();
        let portfolio = PortfolioSnapshot::default();
        assert!(gate.check(&signal(TradeDirection::Buy, 1.5), &portfolio).is_ok());
    }
}
