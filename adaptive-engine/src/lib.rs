//! Regime-Adaptive Engine
//!
//! Cost-adjusted edge calculation, per-regime adaptive acceptance
//! thresholds with online learning, portfolio-level vetoes, and the
//! rejection feedback loop.

mod config;
mod edge;
mod engine;
mod learning;
mod portfolio_gate;
mod rejections;
mod thresholds;

pub use config::{
    create_config_template, load_config, save_config, CostModelConfig, EngineConfig,
    LearningConfig, PortfolioGateConfig, ThresholdConfig,
};
pub use edge::{EdgeCalculator, EdgeMetrics};
pub use engine::{GateAction, GateDecision, RegimeAdaptiveEngine};
pub use learning::{LearningManager, OnlineLearningState};
pub use portfolio_gate::{PortfolioGate, PortfolioVeto};
pub use rejections::{RejectionAnalysis, RejectionLog, RejectionRecord};
pub use thresholds::{AdaptiveThreshold, ThresholdManager, ThresholdPerformance};
