// Two-Layer Prediction System
// Layer 1 scans factor confluence into candidate signals; Layer 2 estimates
// take-profit probability and decomposed risk, producing enhanced signals

pub mod archive;
pub mod base_model;
pub mod enhancement;
pub mod factors;
pub mod meta_model;
pub mod signals;

pub use archive::{RegimeStats, ResolvedOutcome, SignalArchive};
pub use base_model::{BaseModel, BaseModelConfig};
pub use enhancement::enhance;
pub use factors::{
    FactorAnalyzer, MomentumAnalyzer, PatternAnalyzer, TechnicalAnalyzer, VolumeAnalyzer,
};
pub use meta_model::{MetaModel, MetaModelConfig, MonteCarloConfig};
pub use signals::{
    CandidateSignal, EnhancedSignal, ExpectedOutcome, FactorDirection, MetaPrediction,
    Recommendation, RiskProfile, TechnicalFactor,
};
