use anyhow::{Context, Result};
use tracing::{info, warn};

use dashboard_node::DashboardSubscriber;

/// Push endpoint used when none is given on the command line
const DEFAULT_STREAM_URL: &str = "http://127.0.0.1:5050/stream";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_node=info".into()),
        )
        .with_target(false)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());

    info!(
        "Starting Dashboard Node v{} - headless prediction dashboard",
        env!("CARGO_PKG_VERSION")
    );

    let subscriber = DashboardSubscriber::new(url);
    let subscription = subscriber.run(|state| {
        if let Some(latest) = state.recent().newest() {
            info!(
                index = latest.index,
                prediction = %latest.prediction,
                total = state.total(),
                benign = state.benign_count(),
                attack = state.attack_count(),
                attack_rate = state.attack_rate(),
                "Dashboard updated"
            );
        }
    });

    tokio::select! {
        report = subscription => {
            let report = report.with_context(|| format!("Subscription to {} failed", subscriber.url()))?;
            let snapshot = serde_json::to_string_pretty(&report.state.snapshot())?;
            info!(skipped = report.skipped, "Final dashboard state:\n{}", snapshot);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, closing subscription");
        }
    }

    Ok(())
}
