// Microstructure Analysis
// Order-flow, liquidity and execution-quality metrics from book and trade data

pub mod analyzer;
pub mod execution;
pub mod liquidity;
pub mod order_flow;

pub use analyzer::{
    EntryTiming, MicroRegime, MicroRejectReason, MicrostructureAnalyzer, MicrostructureConfig,
    MicrostructureState, SweepAnalysis, TradeVerdict,
};
pub use execution::{ExecutionAnalyzer, ExecutionConfig, ExecutionQuality};
pub use liquidity::{LiquidityAnalyzer, LiquidityConfig, LiquidityMetrics};
pub use order_flow::{OrderFlowAnalyzer, OrderFlowConfig, OrderFlowMetrics};
