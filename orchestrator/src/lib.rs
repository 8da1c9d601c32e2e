// Master Orchestrator
// Sequences the full decision pipeline per market snapshot and tracks
// rolling system KPIs

pub mod decision;
pub mod kpis;
pub mod orchestrator;
pub mod scenarios;
pub mod sink;

pub use decision::{
    ActualOutcome, AlternativeScenario, DecisionAction, MicroSummary, OptimizationSuggestion,
    Reason, ReasonCode, RiskWarning, ScenarioKind, SuggestionKind, SystemDecision,
    TradingRecommendation, WarningCode,
};
pub use kpis::SystemKpis;
pub use orchestrator::{MasterOrchestrator, OrchestratorConfig};
pub use sink::{DecisionSink, InMemorySink};
