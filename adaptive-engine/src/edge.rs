//! Edge calculation
//!
//! Kelly-style expected value net of spread, slippage and market impact,
//! scaled by execution quality and reduced by opportunity cost.

use chrono::Timelike;
use common::PortfolioSnapshot;
use regime::{MarketRegime, RegimeType};
use serde::{Deserialize, Serialize};
use signal_generation::EnhancedSignal;
use tracing::debug;

use crate::config::CostModelConfig;

/// Full cost/quality decomposition of one edge estimate
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeMetrics {
    /// Gross probability-weighted edge, fraction of notional
    pub expected_edge: f64,
    pub spread_cost: f64,
    pub slippage_cost: f64,
    pub market_impact_cost: f64,
    /// Composite execution multiplier in [0.3, 1.5]
    pub execution_quality_factor: f64,
    /// Subtractive opportunity cost in [0, 0.01]
    pub opportunity_cost_factor: f64,
    /// Edge after costs, quality scaling and opportunity cost
    pub net_edge: f64,
    /// Net edge recomputed at the probability interval bounds
    pub confidence_interval: (f64, f64),
}

/// Derives edge metrics per decision; stateless and recomputed each time
#[derive(Debug, Clone, Default)]
pub struct EdgeCalculator {
    config: CostModelConfig,
}

impl EdgeCalculator {
    pub fn new(config: CostModelConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        signal: &EnhancedSignal,
        regime: &MarketRegime,
        portfolio: &PortfolioSnapshot,
    ) -> EdgeMetrics {
        let entry = signal.candidate.entry_price;
        let tp_return = signal.barriers.target_distance_pct(entry);
        let sl_return = signal.barriers.stop_distance_pct(entry);
        let p = signal.prediction.probability_tp_first;

        let expected_edge = p * tp_return - (1.0 - p) * sl_return;

        let hour = signal.candidate.timestamp.hour();
        let off_session = !(6..22).contains(&hour);

        let spread_cost = self.spread_cost(regime.regime_type, off_session);
        let slippage_cost = self.slippage_cost(regime);
        let market_impact_cost = self.market_impact(regime);

        let execution_quality_factor = self.execution_quality(regime, off_session);
        let opportunity_cost_factor = self.opportunity_cost(signal, regime, portfolio);

        let net = |edge: f64| -> f64 {
            (edge - spread_cost - slippage_cost - market_impact_cost) * execution_quality_factor
                - opportunity_cost_factor
        };

        let net_edge = net(expected_edge);

        let (p_lo, p_hi) = signal.prediction.confidence_interval;
        let edge_lo = p_lo * tp_return - (1.0 - p_lo) * sl_return;
        let edge_hi = p_hi * tp_return - (1.0 - p_hi) * sl_return;
        let confidence_interval = (net(edge_lo), net(edge_hi));

        debug!(
            signal_id = %signal.id(),
            expected_edge = format!("{:.5}", expected_edge),
            net_edge = format!("{:.5}", net_edge),
            "Edge calculated"
        );

        EdgeMetrics {
            expected_edge,
            spread_cost,
            slippage_cost,
            market_impact_cost,
            execution_quality_factor,
            opportunity_cost_factor,
            net_edge,
            confidence_interval,
        }
    }

    fn spread_cost(&self, regime_type: RegimeType, off_session: bool) -> f64 {
        let regime_multiplier = match regime_type {
            RegimeType::LiquidityCrisis => 3.0,
            RegimeType::ShockUp | RegimeType::ShockDown => 2.5,
            RegimeType::NewsDriven => 2.0,
            RegimeType::RangingVolatile | RegimeType::Breakout => 1.5,
            _ => 1.0,
        };
        let session_multiplier = if off_session {
            self.config.off_session_multiplier
        } else {
            1.0
        };
        self.config.spread_base * regime_multiplier * session_multiplier
    }

    fn slippage_cost(&self, regime: &MarketRegime) -> f64 {
        // Scarce depth roughly doubles realized slippage.
        let depth_scarcity = 1.0 + (1.0 - regime.market_depth);
        self.config.slippage_base * regime.risk_multiplier * depth_scarcity
    }

    fn market_impact(&self, regime: &MarketRegime) -> f64 {
        let depth = regime.market_depth.max(0.05);
        self.config.impact_lambda
            * (self.config.order_size_fraction / depth).powf(self.config.impact_exponent)
    }

    fn execution_quality(&self, regime: &MarketRegime, off_session: bool) -> f64 {
        let regime_component = match regime.regime_type {
            RegimeType::LiquidityCrisis => 0.5,
            RegimeType::ShockUp | RegimeType::ShockDown => 0.7,
            RegimeType::NewsDriven => 0.8,
            RegimeType::TrendingBullish | RegimeType::TrendingBearish => 1.1,
            RegimeType::RangingTight => 1.05,
            _ => 1.0,
        };
        let volatility_component = 1.2 - 0.4 * regime.volatility;
        let liquidity_component = 0.7 + 0.6 * regime.market_depth;
        let session_component = if off_session { 0.85 } else { 1.0 };

        (regime_component * volatility_component * liquidity_component * session_component)
            .clamp(0.3, 1.5)
    }

    fn opportunity_cost(
        &self,
        signal: &EnhancedSignal,
        regime: &MarketRegime,
        portfolio: &PortfolioSnapshot,
    ) -> f64 {
        let utilization = if portfolio.total_capital > 0.0 {
            (portfolio.allocated_capital / portfolio.total_capital).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let crisis_penalty = if regime.regime_type.is_crisis() {
            0.003
        } else {
            0.0
        };
        let holding_days =
            signal.prediction.expected_outcome.expected_holding_minutes / (60.0 * 24.0);
        let holding_penalty = holding_days * 0.002;

        (utilization * 0.005 + crisis_penalty + holding_penalty).clamp(0.0, 0.01)
    }
}
