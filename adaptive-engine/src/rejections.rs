//! Rejection feedback loop
//!
//! Capped log of every rejected signal; every 50th append runs pattern
//! analysis over the last 100 entries. Regimes rejected more than 20
//! times in that window get their threshold auto-relaxed by the engine.

use chrono::{DateTime, Utc};
use common::BoundedHistory;
use regime::RegimeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// One rejected decision, with enough context to learn from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub regime_type: RegimeType,
    pub signal_id: Uuid,
    pub pair: String,
    pub net_edge: f64,
}

/// Result of one pattern-analysis pass over the last 100 rejections
#[derive(Debug, Clone)]
pub struct RejectionAnalysis {
    /// Regimes with more than 20 rejections in the window
    pub over_rejected: Vec<RegimeType>,
    pub window_size: usize,
}

/// Bounded rejection log with periodic pattern analysis
#[derive(Debug)]
pub struct RejectionLog {
    log: BoundedHistory<RejectionRecord>,
    appends: u64,
    analyses_run: u64,
}

impl RejectionLog {
    const ANALYSIS_EVERY: u64 = 50;
    const ANALYSIS_WINDOW: usize = 100;
    const OVER_REJECTION_COUNT: usize = 20;

    pub fn new() -> Self {
        Self {
            log: BoundedHistory::new(1000),
            appends: 0,
            analyses_run: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Total pattern-analysis passes executed; observable for tests.
    pub fn analyses_run(&self) -> u64 {
        self.analyses_run
    }

    /// Append a rejection. Returns the analysis result when this append
    /// is the 50th since the last pass.
    pub fn record(&mut self, record: RejectionRecord) -> Option<RejectionAnalysis> {
        debug!(
            signal_id = %record.signal_id,
            regime = record.regime_type.key(),
            reason = %record.reason,
            "Rejection logged"
        );
        self.log.push(record);
        self.appends += 1;

        if self.appends % Self::ANALYSIS_EVERY != 0 {
            return None;
        }

        self.analyses_run += 1;
        let analysis = self.analyze();
        info!(
            pass = self.analyses_run,
            over_rejected = analysis.over_rejected.len(),
            "Rejection pattern analysis complete"
        );
        Some(analysis)
    }

    fn analyze(&self) -> RejectionAnalysis {
        let mut counts: HashMap<RegimeType, usize> = HashMap::new();
        let window: Vec<&RejectionRecord> = self.log.last_n(Self::ANALYSIS_WINDOW).collect();
        for record in &window {
            *counts.entry(record.regime_type).or_insert(0) += 1;
        }

        let over_rejected = counts
            .into_iter()
            .filter(|(_, count)| *count > Self::OVER_REJECTION_COUNT)
            .map(|(regime_type, _)| regime_type)
            .collect();

        RejectionAnalysis {
            over_rejected,
            window_size: window.len(),
        }
    }
}

impl Default for RejectionLog {
    fn default() -> Self {
        Self::new()
    }
}
