// Microstructure Analyzer
// Snapshot classification, sweep detection and the trade-rejection contract

use chrono::{DateTime, Utc};
use common::{BoundedHistory, Candle, OrderBook, TradeDirection, TradePrint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::execution::{ExecutionAnalyzer, ExecutionConfig, ExecutionQuality};
use crate::liquidity::{LiquidityAnalyzer, LiquidityConfig, LiquidityMetrics};
use crate::order_flow::{OrderFlowAnalyzer, OrderFlowConfig, OrderFlowMetrics};

/// Microstructure regime classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MicroRegime {
    Normal,
    Stressed,
    Illiquid,
    Toxic,
    SweepZone,
}

impl MicroRegime {
    pub fn key(&self) -> &'static str {
        match self {
            MicroRegime::Normal => "normal",
            MicroRegime::Stressed => "stressed",
            MicroRegime::Illiquid => "illiquid",
            MicroRegime::Toxic => "toxic",
            MicroRegime::SweepZone => "sweep_zone",
        }
    }

    /// Minutes to stand aside before entering in this regime.
    fn required_wait_minutes(&self) -> f64 {
        match self {
            MicroRegime::Normal => 0.0,
            MicroRegime::Stressed => 15.0,
            MicroRegime::SweepZone => 20.0,
            MicroRegime::Illiquid => 30.0,
            MicroRegime::Toxic => 60.0,
        }
    }
}

/// Support/resistance levels at risk of a liquidity sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAnalysis {
    /// Price levels touched repeatedly by recent candles
    pub levels: Vec<f64>,
    /// Probability-like estimate that resting liquidity gets swept
    pub sweep_probability: f64,
}

/// Full microstructure state for one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrostructureState {
    pub order_flow: OrderFlowMetrics,
    pub liquidity: LiquidityMetrics,
    pub execution: ExecutionQuality,
    pub sweep: SweepAnalysis,
    pub regime: MicroRegime,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Structured verdict from the trade-rejection check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeVerdict {
    pub reject: bool,
    pub reasons: Vec<MicroRejectReason>,
}

/// Reasons the microstructure gate rejects a trade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MicroRejectReason {
    ToxicRegime,
    PoorExecutionQuality { score: f64 },
    SweepRiskTooHigh { risk: f64 },
    OrderTooLarge { size: f64, recommended: f64 },
    WaitExceedsHorizon { wait_minutes: f64, horizon_minutes: f64 },
}

impl std::fmt::Display for MicroRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicroRejectReason::ToxicRegime => write!(f, "microstructure regime is toxic"),
            MicroRejectReason::PoorExecutionQuality { score } => {
                write!(f, "execution quality score {:.0} is below 30", score)
            }
            MicroRejectReason::SweepRiskTooHigh { risk } => {
                write!(f, "liquidity sweep risk {:.2} exceeds 0.8", risk)
            }
            MicroRejectReason::OrderTooLarge { size, recommended } => write!(
                f,
                "order size {:.0} exceeds twice the recommended {:.0}",
                size, recommended
            ),
            MicroRejectReason::WaitExceedsHorizon {
                wait_minutes,
                horizon_minutes,
            } => write!(
                f,
                "required wait of {:.0}m exceeds the {:.0}m horizon",
                wait_minutes, horizon_minutes
            ),
        }
    }
}

/// Entry-timing advice for an accepted direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EntryTiming {
    Immediate { reasoning: String },
    Wait { minutes: f64, reasoning: String },
    PostSweep { reasoning: String },
}

/// Microstructure analyzer tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrostructureConfig {
    #[serde(default)]
    pub order_flow: OrderFlowConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Touches required before a price level counts as support/resistance
    #[serde(default = "default_level_touches")]
    pub level_touches: usize,
    /// Price tolerance when grouping candle extremes into a level
    #[serde(default = "default_level_tolerance")]
    pub level_tolerance: f64,
    /// Fraction of near-mid depth considered a safe order size
    #[serde(default = "default_recommended_depth_fraction")]
    pub recommended_depth_fraction: f64,
}

impl Default for MicrostructureConfig {
    fn default() -> Self {
        Self {
            order_flow: OrderFlowConfig::default(),
            liquidity: LiquidityConfig::default(),
            execution: ExecutionConfig::default(),
            level_touches: default_level_touches(),
            level_tolerance: default_level_tolerance(),
            recommended_depth_fraction: default_recommended_depth_fraction(),
        }
    }
}

fn default_level_touches() -> usize {
    3
}

fn default_level_tolerance() -> f64 {
    0.0015
}

fn default_recommended_depth_fraction() -> f64 {
    0.25
}

/// Owns the rolling microstructure histories and produces per-snapshot
/// state. History mutation happens only inside `analyze`, keeping the
/// single-writer discipline with the orchestrator as the sole caller.
#[derive(Debug)]
pub struct MicrostructureAnalyzer {
    config: MicrostructureConfig,
    order_flow: OrderFlowAnalyzer,
    liquidity: LiquidityAnalyzer,
    execution: ExecutionAnalyzer,
    depth_history: BoundedHistory<f64>,
    spread_history: BoundedHistory<f64>,
    state_history: BoundedHistory<MicrostructureState>,
}

impl MicrostructureAnalyzer {
    pub fn new(config: MicrostructureConfig) -> Self {
        Self {
            order_flow: OrderFlowAnalyzer::new(config.order_flow.clone()),
            liquidity: LiquidityAnalyzer::new(config.liquidity.clone()),
            execution: ExecutionAnalyzer::new(config.execution.clone()),
            config,
            depth_history: BoundedHistory::new(1000),
            spread_history: BoundedHistory::new(1000),
            state_history: BoundedHistory::new(1000),
        }
    }

    pub fn history_len(&self) -> usize {
        self.state_history.len()
    }

    pub fn latest_state(&self) -> Option<&MicrostructureState> {
        self.state_history.latest()
    }

    /// Analyze one book/trade snapshot and append it to the history.
    pub fn analyze(
        &mut self,
        book: &OrderBook,
        trades: &[TradePrint],
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> MicrostructureState {
        let flow = self.order_flow.analyze(trades);

        let depths: Vec<f64> = self.depth_history.iter().copied().collect();
        let prev_spread = self.spread_history.latest().copied();
        let liquidity = self.liquidity.analyze(book, &depths, prev_spread);

        let execution = self.execution.evaluate(book, candles, &flow, &liquidity);
        let sweep = self.detect_sweeps(candles, &flow);
        let (regime, confidence) = self.classify(&flow, &liquidity, &execution, &sweep);

        let state = MicrostructureState {
            order_flow: flow,
            liquidity,
            execution,
            sweep,
            regime,
            confidence,
            timestamp: now,
        };

        self.depth_history.push(liquidity.total_depth());
        self.spread_history.push(liquidity.spread_pct);
        self.state_history.push(state.clone());

        info!(
            regime = regime.key(),
            score = format!("{:.0}", execution.score),
            "Microstructure state updated"
        );

        state
    }

    /// Ordered rule list; the first matching rule wins. Cut points are
    /// part of the public behavior contract and are covered by fixtures.
    fn classify(
        &self,
        flow: &OrderFlowMetrics,
        liquidity: &LiquidityMetrics,
        execution: &ExecutionQuality,
        sweep: &SweepAnalysis,
    ) -> (MicroRegime, f64) {
        if execution.sweep_risk > 0.7 || sweep.sweep_probability > 0.7 {
            return (MicroRegime::SweepZone, 0.75);
        }
        if liquidity.toxicity > 0.7 {
            return (MicroRegime::Toxic, 0.8);
        }
        if liquidity.total_depth() < 10_000.0 || liquidity.near_mid_depth < 1_000.0 {
            return (MicroRegime::Illiquid, 0.8);
        }
        if liquidity.spread_pct > 0.002 || liquidity.resilience < -0.3 {
            return (MicroRegime::Stressed, 0.65);
        }
        let confidence = 0.6 + 0.2 * (1.0 - flow.imbalance.abs());
        (MicroRegime::Normal, confidence.min(0.8))
    }

    /// Find support/resistance levels touched repeatedly, then estimate
    /// how likely resting liquidity at them is to get swept.
    fn detect_sweeps(&self, candles: &[Candle], flow: &OrderFlowMetrics) -> SweepAnalysis {
        let mut levels: Vec<f64> = Vec::new();
        if candles.len() >= 5 {
            let mut extremes: Vec<f64> = Vec::with_capacity(candles.len() * 2);
            for candle in candles {
                extremes.push(candle.high);
                extremes.push(candle.low);
            }

            let tolerance = self.config.level_tolerance;
            let mut used = vec![false; extremes.len()];
            for i in 0..extremes.len() {
                if used[i] {
                    continue;
                }
                let anchor = extremes[i];
                if anchor <= 0.0 {
                    continue;
                }
                let mut touches = 0;
                for (j, &price) in extremes.iter().enumerate() {
                    if ((price - anchor) / anchor).abs() <= tolerance {
                        touches += 1;
                        used[j] = true;
                    }
                }
                if touches >= self.config.level_touches {
                    levels.push(anchor);
                }
            }
        }

        let sweep_probability = if levels.is_empty() {
            0.0
        } else {
            (0.5 * flow.imbalance.abs() + 0.5 * flow.aggressive_ratio).clamp(0.0, 1.0)
        };

        debug!(
            levels = levels.len(),
            probability = format!("{:.2}", sweep_probability),
            "Sweep levels scanned"
        );

        SweepAnalysis {
            levels,
            sweep_probability,
        }
    }

    /// Gate contract: should this trade be blocked on microstructure
    /// grounds? Rejection is a normal outcome, never an error.
    pub fn should_reject_trade(
        &self,
        state: &MicrostructureState,
        order_size: f64,
        horizon_minutes: f64,
    ) -> TradeVerdict {
        let mut reasons = Vec::new();

        if state.regime == MicroRegime::Toxic {
            reasons.push(MicroRejectReason::ToxicRegime);
        }
        if state.execution.score < 30.0 {
            reasons.push(MicroRejectReason::PoorExecutionQuality {
                score: state.execution.score,
            });
        }
        if state.execution.sweep_risk > 0.8 {
            reasons.push(MicroRejectReason::SweepRiskTooHigh {
                risk: state.execution.sweep_risk,
            });
        }

        let recommended =
            state.liquidity.near_mid_depth * self.config.recommended_depth_fraction;
        if recommended > 0.0 && order_size > recommended * 2.0 {
            reasons.push(MicroRejectReason::OrderTooLarge {
                size: order_size,
                recommended,
            });
        }

        let wait = state.regime.required_wait_minutes();
        if wait > horizon_minutes {
            reasons.push(MicroRejectReason::WaitExceedsHorizon {
                wait_minutes: wait,
                horizon_minutes,
            });
        }

        TradeVerdict {
            reject: !reasons.is_empty(),
            reasons,
        }
    }

    /// Entry-timing advice for a direction that already passed the gates.
    pub fn optimal_entry_timing(
        &self,
        state: &MicrostructureState,
        direction: TradeDirection,
    ) -> EntryTiming {
        match state.regime {
            MicroRegime::SweepZone => EntryTiming::PostSweep {
                reasoning: format!(
                    "sweep probability {:.2} near tracked levels; wait for the sweep to complete",
                    state.sweep.sweep_probability.max(state.execution.sweep_risk)
                ),
            },
            MicroRegime::Stressed | MicroRegime::Illiquid | MicroRegime::Toxic => {
                let minutes = state.regime.required_wait_minutes();
                EntryTiming::Wait {
                    minutes,
                    reasoning: format!(
                        "microstructure regime is {}; stand aside {:.0}m for conditions to normalize",
                        state.regime.key(),
                        minutes
                    ),
                }
            }
            MicroRegime::Normal => {
                let against = match direction {
                    TradeDirection::Buy => state.order_flow.imbalance < -0.5,
                    TradeDirection::Sell => state.order_flow.imbalance > 0.5,
                };
                if against {
                    EntryTiming::Wait {
                        minutes: 10.0,
                        reasoning: format!(
                            "order flow imbalance {:.2} runs against the trade direction",
                            state.order_flow.imbalance
                        ),
                    }
                } else {
                    EntryTiming::Immediate {
                        reasoning: "normal microstructure with supportive order flow".to_string(),
                    }
                }
            }
        }
    }
}

impl Default for MicrostructureAnalyzer {
    fn default() -> Self {
        Self::new(MicrostructureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{BookLevel, TradeSide};

    fn book(bid_size: f64, ask_size: f64) -> OrderBook {
        OrderBook {
            bids: (0..4)
                .map(|i| BookLevel {
                    price: 99.99 - i as f64 * 0.01,
                    size: bid_size,
                })
                .collect(),
            asks: (0..4)
                .map(|i| BookLevel {
                    price: 100.01 + i as f64 * 0.01,
                    size: ask_size,
                })
                .collect(),
            spread: 0.02,
            timestamp: Utc::now(),
        }
    }

    fn prints(side: TradeSide, count: usize) -> Vec<TradePrint> {
        (0..count)
            .map(|_| TradePrint {
                price: 100.0,
                size: 50.0,
                side,
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|_| Candle {
                timestamp: Utc::now(),
                open: 100.0,
                high: 100.05,
                low: 99.95,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_deep_book_is_normal() {
        let mut analyzer = MicrostructureAnalyzer::default();
        let state = analyzer.analyze(&book(20_000.0, 20_000.0), &[], &flat_candles(30), Utc::now());
        assert_eq!(state.regime, MicroRegime::Normal);
    }

    #[test]
    fn test_thin_book_is_illiquid_or_toxic_and_rejected() {
        let mut analyzer = MicrostructureAnalyzer::default();
        // Total depth well under 10,000 units.
        let state = analyzer.analyze(&book(800.0, 900.0), &[], &flat_candles(30), Utc::now());
        assert!(
            state.regime == MicroRegime::Illiquid || state.regime == MicroRegime::Toxic,
            "regime was {:?}",
            state.regime
        );
        let verdict = analyzer.should_reject_trade(&state, 500.0, 15.0);
        assert!(verdict.reject);
        assert!(!verdict.reasons.is_empty());
    }

    #[test]
    fn test_order_too_large_rejected() {
        let mut analyzer = MicrostructureAnalyzer::default();
        let state = analyzer.analyze(&book(20_000.0, 20_000.0), &[], &flat_candles(30), Utc::now());
        let recommended = state.liquidity.near_mid_depth * 0.25;
        let verdict = analyzer.should_reject_trade(&state, recommended * 3.0, 15.0);
        assert!(verdict
            .reasons
            .iter()
            .any(|r| matches!(r, MicroRejectReason::OrderTooLarge { .. })));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut analyzer = MicrostructureAnalyzer::default();
        let b = book(20_000.0, 20_000.0);
        let candles = flat_candles(30);
        for _ in 0..1100 {
            analyzer.analyze(&b, &[], &candles, Utc::now());
        }
        assert_eq!(analyzer.history_len(), 1000);
    }

    #[test]
    fn test_timing_waits_when_flow_opposes_buy() {
        let mut analyzer = MicrostructureAnalyzer::default();
        let state = analyzer.analyze(
            &book(20_000.0, 20_000.0),
            &prints(TradeSide::Sell, 20),
            &flat_candles(30),
            Utc::now(),
        );
        if state.regime == MicroRegime::Normal {
            let timing = analyzer.optimal_entry_timing(&state, TradeDirection::Buy);
            assert!(matches!(timing, EntryTiming::Wait { .. }));
        }
    }

    #[test]
    fn test_sweep_levels_require_repeated_touches() {
        let analyzer = MicrostructureAnalyzer::default();
        let candles = flat_candles(10);
        let flow = OrderFlowMetrics::empty();
        let sweep = analyzer.detect_sweeps(&candles, &flow);
        // Every candle shares the same extremes, so both cluster levels appear.
        assert!(!sweep.levels.is_empty());

        let mut varied = Vec::new();
        for i in 0..10 {
            varied.push(Candle {
                timestamp: Utc::now(),
                open: 100.0,
                high: 101.0 + i as f64,
                low: 90.0 - i as f64,
                close: 100.0,
                volume: 1000.0,
            });
        }
        let sweep = analyzer.detect_sweeps(&varied, &flow);
        assert!(sweep.levels.is_empty());
    }
}
