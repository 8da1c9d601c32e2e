// System KPIs
// Rolling self-monitoring statistics recomputed after each cycle

use chrono::{DateTime, Utc};
use regime::RegimeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::decision::DecisionAction;

/// Per-decision entry the KPI computation runs over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: Uuid,
    pub signal_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub action: DecisionAction,
    pub regime_type: RegimeType,
    pub confidence: f64,
    pub gross_edge: f64,
    pub net_edge: f64,
    pub expected_holding_minutes: f64,
    pub factor_categories: Vec<common::FactorCategory>,
    /// Realized R-multiple once the consuming layer reports it.
    /// For rejected/waited signals this is the counterfactual outcome.
    pub realized_pnl_r: Option<f64>,
}

/// Rolling system health metrics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemKpis {
    pub cycles: usize,
    pub acceptance_rate: f64,
    pub wait_rate: f64,
    pub rejection_rate: f64,
    /// Mean net edge of recent accepts minus the prior window's mean
    pub edge_decay: f64,
    /// Share of gross edge consumed by costs, averaged over accepts
    pub cost_absorption_ratio: f64,
    /// Median expected holding time of accepted signals
    pub signal_half_life_minutes: f64,
    pub hit_rate_by_regime: HashMap<String, f64>,
    /// Best minus worst regime hit rate (regimes with enough samples)
    pub regime_performance_delta: f64,
    /// Share of resolved rejections that would have lost
    pub rejection_success_rate: f64,
    pub resolved_outcomes: usize,
}

/// Compute KPIs over the rolling decision history (oldest-to-newest).
pub fn compute(records: &[&DecisionRecord]) -> SystemKpis {
    let cycles = records.len();
    if cycles == 0 {
        return SystemKpis::default();
    }

    let accepts: Vec<&&DecisionRecord> = records
        .iter()
        .filter(|r| r.action == DecisionAction::Accept)
        .collect();
    let waits = records
        .iter()
        .filter(|r| r.action == DecisionAction::Wait)
        .count();
    let rejects: Vec<&&DecisionRecord> = records
        .iter()
        .filter(|r| r.action == DecisionAction::Reject)
        .collect();

    let acceptance_rate = accepts.len() as f64 / cycles as f64;
    let wait_rate = waits as f64 / cycles as f64;
    let rejection_rate = rejects.len() as f64 / cycles as f64;

    // Edge decay: are fresh accepts carrying less edge than older ones?
    let edge_decay = if accepts.len() >= 4 {
        let half = accepts.len() / 2;
        let older: f64 =
            accepts[..half].iter().map(|r| r.net_edge).sum::<f64>() / half as f64;
        let recent: f64 = accepts[half..].iter().map(|r| r.net_edge).sum::<f64>()
            / (accepts.len() - half) as f64;
        recent - older
    } else {
        0.0
    };

    let cost_ratios: Vec<f64> = accepts
        .iter()
        .filter(|r| r.gross_edge > 0.0)
        .map(|r| ((r.gross_edge - r.net_edge) / r.gross_edge).clamp(0.0, 1.0))
        .collect();
    let cost_absorption_ratio = if cost_ratios.is_empty() {
        0.0
    } else {
        cost_ratios.iter().sum::<f64>() / cost_ratios.len() as f64
    };

    let signal_half_life_minutes = median(
        accepts
            .iter()
            .map(|r| r.expected_holding_minutes)
            .collect::<Vec<f64>>(),
    );

    // Hit rates from resolved accepted trades.
    let mut regime_totals: HashMap<RegimeType, (usize, usize)> = HashMap::new();
    for record in &accepts {
        if let Some(pnl) = record.realized_pnl_r {
            let entry = regime_totals.entry(record.regime_type).or_insert((0, 0));
            entry.0 += 1;
            if pnl > 0.0 {
                entry.1 += 1;
            }
        }
    }
    let hit_rate_by_regime: HashMap<String, f64> = regime_totals
        .iter()
        .map(|(regime_type, (total, wins))| {
            (
                regime_type.key().to_string(),
                *wins as f64 / (*total).max(1) as f64,
            )
        })
        .collect();

    let qualified: Vec<f64> = regime_totals
        .values()
        .filter(|(total, _)| *total >= 3)
        .map(|(total, wins)| *wins as f64 / *total as f64)
        .collect();
    let regime_performance_delta = match (
        qualified.iter().cloned().fold(f64::NAN, f64::max),
        qualified.iter().cloned().fold(f64::NAN, f64::min),
    ) {
        (max, min) if max.is_finite() && min.is_finite() => max - min,
        _ => 0.0,
    };

    // Counterfactuals: a rejection "succeeded" if the trade would have lost.
    let resolved_rejects: Vec<f64> = rejects
        .iter()
        .filter_map(|r| r.realized_pnl_r)
        .collect();
    let rejection_success_rate = if resolved_rejects.is_empty() {
        0.0
    } else {
        resolved_rejects.iter().filter(|pnl| **pnl <= 0.0).count() as f64
            / resolved_rejects.len() as f64
    };

    let resolved_outcomes = records.iter().filter(|r| r.realized_pnl_r.is_some()).count();

    SystemKpis {
        cycles,
        acceptance_rate,
        wait_rate,
        rejection_rate,
        edge_decay,
        cost_absorption_ratio,
        signal_half_life_minutes,
        hit_rate_by_regime,
        regime_performance_delta,
        rejection_success_rate,
        resolved_outcomes,
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: DecisionAction, net_edge: f64, pnl: Option<f64>) -> DecisionRecord {
        DecisionRecord {
            decision_id: Uuid::new_v4(),
            signal_id: Some(Uuid::new_v4()),
            timestamp: Utc::now(),
            action,
            regime_type: RegimeType::TrendingBullish,
            confidence: 0.7,
            gross_edge: net_edge + 0.002,
            net_edge,
            expected_holding_minutes: 240.0,
            factor_categories: Vec::new(),
            realized_pnl_r: pnl,
        }
    }

    #[test]
    fn test_empty_history() {
        let kpis = compute(&[]);
        assert_eq!(kpis.cycles, 0);
        assert_eq!(kpis.acceptance_rate, 0.0);
    }

    #[test]
    fn test_rates_sum_to_one() {
        let records = vec![
            record(DecisionAction::Accept, 0.02, None),
            record(DecisionAction::Wait, 0.005, None),
            record(DecisionAction::Reject, -0.01, None),
            record(DecisionAction::Reject, -0.02, None),
        ];
        let refs: Vec<&DecisionRecord> = records.iter().collect();
        let kpis = compute(&refs);
        let total = kpis.acceptance_rate + kpis.wait_rate + kpis.rejection_rate;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_edge_decay_negative_when_edges_shrink() {
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(record(DecisionAction::Accept, 0.03, None));
        }
        for _ in 0..5 {
            records.push(record(DecisionAction::Accept, 0.01, None));
        }
        let refs: Vec<&DecisionRecord> = records.iter().collect();
        let kpis = compute(&refs);
        assert!(kpis.edge_decay < 0.0);
    }

    #[test]
    fn test_rejection_success_rate_counts_avoided_losses() {
        let records = vec![
            record(DecisionAction::Reject, -0.01, Some(-1.0)),
            record(DecisionAction::Reject, -0.01, Some(-0.5)),
            record(DecisionAction::Reject, -0.01, Some(2.0)),
            record(DecisionAction::Reject, -0.01, None),
        ];
        let refs: Vec<&DecisionRecord> = records.iter().collect();
        let kpis = compute(&refs);
        assert!((kpis.rejection_success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_by_regime() {
        let records = vec![
            record(DecisionAction::Accept, 0.02, Some(1.5)),
            record(DecisionAction::Accept, 0.02, Some(1.0)),
            record(DecisionAction::Accept, 0.02, Some(-1.0)),
        ];
        let refs: Vec<&DecisionRecord> = records.iter().collect();
        let kpis = compute(&refs);
        let hit_rate = kpis.hit_rate_by_regime.get("trending_bullish").unwrap();
        assert!((hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_absorption_ratio() {
        let records = vec![record(DecisionAction::Accept, 0.018, None)];
        let refs: Vec<&DecisionRecord> = records.iter().collect();
        let kpis = compute(&refs);
        // Gross 0.020, net 0.018: costs absorb 10%.
        assert!((kpis.cost_absorption_ratio - 0.1).abs() < 1e-9);
    }
}
