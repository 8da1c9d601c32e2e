// Master Orchestrator
// Drives one decision cycle: regime -> microstructure -> candidates ->
// barriers -> meta prediction -> enhancement -> adaptive gate ->
// microstructure gate -> best-candidate selection -> KPIs

use adaptive_engine::{EngineConfig, GateAction, GateDecision, RegimeAdaptiveEngine};
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{BoundedHistory, FactorCategory, MarketSnapshot};
use microstructure::{
    EntryTiming, MicrostructureAnalyzer, MicrostructureConfig, MicrostructureState,
};
use regime::{
    BarrierCalculator, BarrierConfig, MarketRegime, RegimeDetector, RegimeDetectorConfig,
};
use signal_generation::{
    enhance, BaseModel, BaseModelConfig, EnhancedSignal, MetaModel, MetaModelConfig,
    ResolvedOutcome, SignalArchive,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decision::{
    ActualOutcome, DecisionAction, MicroSummary, Reason, ReasonCode, SystemDecision,
    TradingRecommendation,
};
use crate::kpis::{self, DecisionRecord, SystemKpis};
use crate::scenarios;
use crate::sink::DecisionSink;

/// Orchestrator tunables; component configs are aggregated here so a
/// test can construct a fully isolated instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub detector: RegimeDetectorConfig,
    pub barriers: BarrierConfig,
    pub base_model: BaseModelConfig,
    pub meta_model: MetaModelConfig,
    pub microstructure: MicrostructureConfig,
    pub engine: EngineConfig,
    /// How long the system is willing to delay an entry (minutes)
    pub entry_horizon_minutes: f64,
    /// Reference order size for microstructure rejection checks
    pub reference_order_size: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            detector: RegimeDetectorConfig::default(),
            barriers: BarrierConfig::default(),
            base_model: BaseModelConfig::default(),
            meta_model: MetaModelConfig::default(),
            microstructure: MicrostructureConfig::default(),
            engine: EngineConfig::default(),
            entry_horizon_minutes: 15.0,
            reference_order_size: 1_000.0,
        }
    }
}

struct CandidateEvaluation {
    enhanced: EnhancedSignal,
    gate: GateDecision,
    action: DecisionAction,
    reasons: Vec<Reason>,
    timing: Option<EntryTiming>,
}

impl CandidateEvaluation {
    fn risk_adjusted_edge(&self) -> f64 {
        self.gate.edge.net_edge * (1.0 - 0.5 * self.enhanced.prediction.combined_risk)
    }

    fn selection_score(&self) -> f64 {
        self.risk_adjusted_edge() * self.enhanced.final_score
    }
}

/// Owns every pipeline component and all rolling histories. One
/// instance per decision stream; cycles run strictly one at a time.
pub struct MasterOrchestrator {
    config: OrchestratorConfig,
    detector: RegimeDetector,
    barrier_calculator: BarrierCalculator,
    base_model: BaseModel,
    meta_model: MetaModel,
    microstructure: MicrostructureAnalyzer,
    engine: RegimeAdaptiveEngine,
    archive: SignalArchive,
    decision_history: BoundedHistory<DecisionRecord>,
    kpi_history: BoundedHistory<SystemKpis>,
    sink: Option<Box<dyn DecisionSink>>,
}

impl MasterOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            detector: RegimeDetector::new(config.detector.clone()),
            barrier_calculator: BarrierCalculator::new(config.barriers.clone()),
            base_model: BaseModel::with_default_analyzers(config.base_model.clone()),
            meta_model: MetaModel::new(config.meta_model.clone()),
            microstructure: MicrostructureAnalyzer::new(config.microstructure.clone()),
            engine: RegimeAdaptiveEngine::new(config.engine.clone()),
            archive: SignalArchive::new(),
            decision_history: BoundedHistory::new(1000),
            kpi_history: BoundedHistory::new(100),
            sink: None,
            config,
        }
    }

    /// Attach a decision sink owned by the consuming layer.
    pub fn with_sink(mut self, sink: Box<dyn DecisionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn decision_count(&self) -> usize {
        self.decision_history.len()
    }

    pub fn latest_kpis(&self) -> Option<&SystemKpis> {
        self.kpi_history.latest()
    }

    pub fn engine(&self) -> &RegimeAdaptiveEngine {
        &self.engine
    }

    /// Run one full decision cycle over a market snapshot.
    pub async fn process(&mut self, snapshot: &MarketSnapshot) -> Result<TradingRecommendation> {
        snapshot.validate()?;
        let now = snapshot.timestamp;

        let regime = self.detector.detect(
            &snapshot.candles,
            snapshot.order_book.as_ref(),
            &snapshot.news_events,
            now,
        );
        info!(
            pair = %snapshot.pair,
            regime = regime.regime_type.key(),
            confidence = format!("{:.2}", regime.confidence),
            "Decision cycle started"
        );

        // Microstructure is optional input; absence skips that gate.
        let micro_state: Option<MicrostructureState> = snapshot.order_book.as_ref().map(|book| {
            self.microstructure
                .analyze(book, &snapshot.recent_trades, &snapshot.candles, now)
        });

        let weights = self.engine.feature_weights(regime.regime_type);
        let candidates = self
            .base_model
            .generate_candidates(snapshot, &regime, &weights, now);

        if candidates.is_empty() {
            return self
                .finish_no_candidates(snapshot, regime, micro_state.as_ref(), now)
                .await;
        }

        let mut evaluations: Vec<CandidateEvaluation> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let barriers = self.barrier_calculator.calculate(
                candidate.entry_price,
                candidate.direction,
                &regime,
                &snapshot.candles,
            );
            let prediction = self.meta_model.predict(
                &candidate,
                &barriers,
                &regime,
                snapshot,
                &self.archive,
            );
            let enhanced = enhance(candidate, prediction, barriers);
            self.archive.record(&enhanced);

            let gate = self
                .engine
                .evaluate(&enhanced, &regime, &snapshot.portfolio, now);
            let evaluation =
                self.apply_microstructure_gate(enhanced, gate, micro_state.as_ref());
            evaluations.push(evaluation);
        }

        let chosen = Self::select_best(&evaluations);
        let recommendation = self
            .finish_with_candidate(snapshot, regime, micro_state.as_ref(), chosen, now)
            .await?;
        Ok(recommendation)
    }

    /// Convert the adaptive-gate outcome into a per-candidate action,
    /// layering the microstructure verdict and timing on accepted ones.
    fn apply_microstructure_gate(
        &self,
        enhanced: EnhancedSignal,
        gate: GateDecision,
        micro_state: Option<&MicrostructureState>,
    ) -> CandidateEvaluation {
        let mut reasons = Vec::new();
        let mut timing = None;

        let action = match gate.action {
            GateAction::Reject => {
                let code = if gate.veto.is_some() {
                    ReasonCode::PortfolioVeto
                } else {
                    ReasonCode::NegativeEdge
                };
                reasons.push(Reason::new(code, gate.summary.clone()));
                DecisionAction::Reject
            }
            GateAction::Wait => {
                reasons.push(Reason::new(ReasonCode::EdgeBelowThreshold, gate.summary.clone()));
                DecisionAction::Wait
            }
            GateAction::Accept => {
                reasons.push(Reason::new(ReasonCode::EdgeAccepted, gate.summary.clone()));
                match micro_state {
                    Some(state) => {
                        let verdict = self.microstructure.should_reject_trade(
                            state,
                            self.config.reference_order_size,
                            self.config.entry_horizon_minutes,
                        );
                        if verdict.reject {
                            for reason in &verdict.reasons {
                                reasons.push(Reason::new(
                                    ReasonCode::MicrostructureReject,
                                    reason.to_string(),
                                ));
                            }
                            DecisionAction::Reject
                        } else {
                            let entry_timing = self
                                .microstructure
                                .optimal_entry_timing(state, enhanced.candidate.direction);
                            let action = match &entry_timing {
                                EntryTiming::Immediate { .. } => DecisionAction::Accept,
                                EntryTiming::Wait { reasoning, .. }
                                | EntryTiming::PostSweep { reasoning } => {
                                    reasons.push(Reason::new(
                                        ReasonCode::TimingWait,
                                        reasoning.clone(),
                                    ));
                                    DecisionAction::Wait
                                }
                            };
                            timing = Some(entry_timing);
                            action
                        }
                    }
                    None => DecisionAction::Accept,
                }
            }
        };

        debug!(
            signal_id = %enhanced.id(),
            action = ?action,
            "Candidate evaluated"
        );

        CandidateEvaluation {
            enhanced,
            gate,
            action,
            reasons,
            timing,
        }
    }

    /// Among accepts, maximize risk-adjusted edge x confidence; with no
    /// accepts fall back to the highest-confidence wait, then reject.
    fn select_best(evaluations: &[CandidateEvaluation]) -> &CandidateEvaluation {
        let best_of = |action: DecisionAction| -> Option<&CandidateEvaluation> {
            evaluations
                .iter()
                .filter(|e| e.action == action)
                .max_by(|a, b| {
                    let (ka, kb) = if action == DecisionAction::Accept {
                        (a.selection_score(), b.selection_score())
                    } else {
                        (a.enhanced.final_score, b.enhanced.final_score)
                    };
                    ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
                })
        };

        best_of(DecisionAction::Accept)
            .or_else(|| best_of(DecisionAction::Wait))
            .or_else(|| best_of(DecisionAction::Reject))
            .expect("select_best requires at least one evaluation")
    }

    async fn finish_no_candidates(
        &mut self,
        snapshot: &MarketSnapshot,
        regime: MarketRegime,
        micro_state: Option<&MicrostructureState>,
        now: DateTime<Utc>,
    ) -> Result<TradingRecommendation> {
        let reasons = vec![
            Reason::new(
                ReasonCode::NoCandidates,
                "No candidate signals detected in this cycle",
            ),
            Reason::new(
                ReasonCode::RegimeContext,
                format!(
                    "{} regime, confidence {:.2}",
                    regime.regime_type.key(),
                    regime.confidence
                ),
            ),
        ];

        let record = DecisionRecord {
            decision_id: Uuid::new_v4(),
            signal_id: None,
            timestamp: now,
            action: DecisionAction::Reject,
            regime_type: regime.regime_type,
            confidence: regime.confidence,
            gross_edge: 0.0,
            net_edge: 0.0,
            expected_holding_minutes: 0.0,
            factor_categories: Vec::new(),
            realized_pnl_r: None,
        };
        let decision_id = record.decision_id;
        let kpis = self.record_and_compute_kpis(record);

        let decision = SystemDecision {
            id: decision_id,
            timestamp: now,
            pair: snapshot.pair.clone(),
            action: DecisionAction::Reject,
            confidence: regime.confidence,
            expected_edge: 0.0,
            net_edge: 0.0,
            risk_adjusted_edge: 0.0,
            threshold: self.engine.threshold_for(regime.regime_type),
            signal: None,
            reasons,
            microstructure: micro_state.map(MicroSummary::from),
            regime: regime.clone(),
            kpis,
        };

        info!(pair = %snapshot.pair, "Cycle terminal: reject (no candidates)");
        self.publish(&decision).await;

        Ok(TradingRecommendation {
            alternative_scenarios: scenarios::alternative_scenarios(None, &regime, micro_state),
            risk_warnings: scenarios::risk_warnings(None, &regime, micro_state),
            optimization_suggestions: scenarios::optimization_suggestions(None, &regime, None),
            decision,
        })
    }

    async fn finish_with_candidate(
        &mut self,
        snapshot: &MarketSnapshot,
        regime: MarketRegime,
        micro_state: Option<&MicrostructureState>,
        chosen: &CandidateEvaluation,
        now: DateTime<Utc>,
    ) -> Result<TradingRecommendation> {
        let mut reasons = chosen.reasons.clone();
        reasons.push(Reason::new(
            ReasonCode::RegimeContext,
            format!(
                "{} regime, confidence {:.2}, risk multiplier {:.1}",
                regime.regime_type.key(),
                regime.confidence,
                regime.risk_multiplier
            ),
        ));

        let categories: Vec<FactorCategory> = {
            let mut seen = Vec::new();
            for factor in &chosen.enhanced.candidate.factors {
                if !seen.contains(&factor.category) {
                    seen.push(factor.category);
                }
            }
            seen
        };

        let record = DecisionRecord {
            decision_id: Uuid::new_v4(),
            signal_id: Some(chosen.enhanced.id()),
            timestamp: now,
            action: chosen.action,
            regime_type: regime.regime_type,
            confidence: chosen.enhanced.final_score,
            gross_edge: chosen.gate.edge.expected_edge,
            net_edge: chosen.gate.edge.net_edge,
            expected_holding_minutes: chosen
                .enhanced
                .prediction
                .expected_outcome
                .expected_holding_minutes,
            factor_categories: categories,
            realized_pnl_r: None,
        };
        let decision_id = record.decision_id;
        let kpis = self.record_and_compute_kpis(record);

        let decision = SystemDecision {
            id: decision_id,
            timestamp: now,
            pair: snapshot.pair.clone(),
            action: chosen.action,
            confidence: chosen.enhanced.final_score,
            expected_edge: chosen.gate.edge.expected_edge,
            net_edge: chosen.gate.edge.net_edge,
            risk_adjusted_edge: chosen.risk_adjusted_edge(),
            threshold: chosen.gate.threshold,
            signal: Some(chosen.enhanced.clone()),
            reasons,
            microstructure: micro_state.map(MicroSummary::from),
            regime: regime.clone(),
            kpis,
        };

        info!(
            pair = %snapshot.pair,
            action = ?chosen.action,
            net_edge = format!("{:.5}", chosen.gate.edge.net_edge),
            "Cycle terminal"
        );
        self.publish(&decision).await;

        Ok(TradingRecommendation {
            alternative_scenarios: scenarios::alternative_scenarios(
                Some(&chosen.enhanced),
                &regime,
                micro_state,
            ),
            risk_warnings: scenarios::risk_warnings(Some(&chosen.enhanced), &regime, micro_state),
            optimization_suggestions: scenarios::optimization_suggestions(
                Some(&chosen.enhanced),
                &regime,
                chosen.timing.as_ref(),
            ),
            decision,
        })
    }

    fn record_and_compute_kpis(&mut self, record: DecisionRecord) -> SystemKpis {
        self.decision_history.push(record);
        let records: Vec<&DecisionRecord> = self.decision_history.iter().collect();
        let computed = kpis::compute(&records);
        self.kpi_history.push(computed.clone());
        computed
    }

    async fn publish(&self, decision: &SystemDecision) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.publish(decision).await {
                warn!(decision_id = %decision.id, "Failed to publish decision: {}", e);
            }
        }
    }

    /// Feed a realized (or counterfactual) outcome back into the
    /// engine's learning loops. Returns false for unknown signals.
    pub fn update_outcome(&mut self, signal_id: Uuid, outcome: ActualOutcome) -> bool {
        self.archive.resolve(
            signal_id,
            ResolvedOutcome {
                pnl_r: outcome.pnl_r,
                hit_take_profit: outcome.hit_take_profit,
                resolved_at: outcome.resolved_at,
            },
        );

        let mut matched: Option<(DecisionAction, regime::RegimeType, Vec<FactorCategory>)> = None;
        for record in self.decision_history.iter_mut() {
            if record.signal_id == Some(signal_id) && record.realized_pnl_r.is_none() {
                record.realized_pnl_r = Some(outcome.pnl_r);
                matched = Some((
                    record.action,
                    record.regime_type,
                    record.factor_categories.clone(),
                ));
                break;
            }
        }

        match matched {
            Some((action, regime_type, categories)) => {
                // Only executed trades train thresholds and weights;
                // counterfactuals on rejects feed the KPI layer alone.
                if action == DecisionAction::Accept {
                    self.engine.record_outcome(
                        regime_type,
                        &categories,
                        outcome.pnl_r,
                        outcome.resolved_at,
                    );
                }
                info!(signal_id = %signal_id, pnl_r = outcome.pnl_r, "Outcome recorded");
                true
            }
            None => {
                debug!(signal_id = %signal_id, "Outcome for unknown or resolved signal");
                false
            }
        }
    }
}
