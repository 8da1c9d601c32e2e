// Runs one decision cycle over a synthetic trending market and prints
// the resulting recommendation.

use chrono::{Duration, TimeZone, Utc};
use common::{Candle, MarketSnapshot, PortfolioSnapshot};
use orchestrator::{ActualOutcome, MasterOrchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    let start = now - Duration::minutes(5 * 45);
    let candles: Vec<Candle> = (0..45)
        .map(|i| {
            let close = 100.0 * (1.0 + 0.004 * i as f64);
            Candle {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close * 0.996,
                high: close * 1.005,
                low: close * 0.995,
                close,
                volume: 1000.0,
            }
        })
        .collect();

    let snapshot = MarketSnapshot {
        pair: "EURUSD".to_string(),
        current_price: candles.last().unwrap().close,
        volumes: candles.iter().map(|c| c.volume).collect(),
        candles,
        order_book: None,
        recent_trades: Vec::new(),
        news_events: Vec::new(),
        portfolio: PortfolioSnapshot::default(),
        timestamp: now,
    };

    let mut orchestrator = MasterOrchestrator::new(OrchestratorConfig::default());
    let recommendation = orchestrator.process(&snapshot).await?;

    let decision = &recommendation.decision;
    println!("action:     {:?}", decision.action);
    println!("confidence: {:.2}", decision.confidence);
    println!("net edge:   {:.5} (threshold {:.5})", decision.net_edge, decision.threshold);
    for reason in &decision.reasons {
        println!("reason:     [{:?}] {}", reason.code, reason.message);
    }
    for warning in &recommendation.risk_warnings {
        println!("warning:    [{:?}] {}", warning.code, warning.message);
    }
    for suggestion in &recommendation.optimization_suggestions {
        println!("suggest:    [{:?}] {}", suggestion.kind, suggestion.message);
    }

    // Feed a realized outcome back so the adaptive layers learn.
    if let Some(signal) = &decision.signal {
        orchestrator.update_outcome(
            signal.id(),
            ActualOutcome {
                pnl_r: 1.5,
                hit_take_profit: true,
                resolved_at: now + Duration::hours(4),
            },
        );
        println!("kpis:       {:?}", orchestrator.latest_kpis());
    }

    Ok(())
}
