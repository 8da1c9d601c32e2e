// Factor Analyzers
// Four independent evidence scanners feeding the base model

use common::{FactorCategory, MarketSnapshot};

use crate::signals::TechnicalFactor;

mod momentum;
mod patterns;
mod technical;
mod volume;

pub use momentum::MomentumAnalyzer;
pub use patterns::PatternAnalyzer;
pub use technical::TechnicalAnalyzer;
pub use volume::VolumeAnalyzer;

/// One evidence scanner. Analyzers are pure: they read the snapshot and
/// emit zero or more factors, never holding state between cycles.
pub trait FactorAnalyzer: Send + Sync {
    fn category(&self) -> FactorCategory;
    fn analyze(&self, snapshot: &MarketSnapshot) -> Vec<TechnicalFactor>;
}
