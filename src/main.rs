use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use storefront_verify::config::{GatewayConfig, VerifierConfig};
use storefront_verify::gateway::HttpGateway;
use storefront_verify::logging::init_tracing;
use storefront_verify::scheduler::PollScheduler;
use storefront_verify::session::VerificationSnapshot;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Verify a single order or top-up from the command line.
///
/// Exit code: 0 when the payment verified successfully, 1 on a definitive
/// failure, 2 when the attempt budget ran out without a terminal answer.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let subject_id = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .context("usage: verify-checkout <subject-id> [--topup]")?;
    let is_top_up = args.iter().any(|a| a == "--topup");

    let gateway_config = GatewayConfig::from_env()?;
    gateway_config.validate()?;
    let verifier_config = VerifierConfig::from_env();
    verifier_config.validate()?;

    info!(
        subject_id = %subject_id,
        is_top_up,
        base_url = %gateway_config.base_url,
        max_attempts = verifier_config.max_attempts,
        "🚀 starting payment verification"
    );

    let probe = Arc::new(HttpGateway::new(gateway_config)?);
    let mut scheduler = PollScheduler::new(&subject_id, is_top_up, probe, verifier_config);

    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<VerificationSnapshot>();
    scheduler.start(move |snapshot| {
        let _ = update_tx.send(snapshot);
    })?;

    let final_snapshot = loop {
        match update_rx.recv().await {
            Some(snapshot) => {
                if let Some(entry) = snapshot.log.last() {
                    info!(severity = ?entry.severity, "{}", entry.message);
                }
                if snapshot.is_complete {
                    break snapshot;
                }
            }
            // The poll task is gone; whatever the session holds is final.
            None => break scheduler.snapshot(),
        }
    };

    let exit_code = if final_snapshot.is_success {
        info!(
            status = %final_snapshot.status,
            attempts = final_snapshot.attempt_count,
            "✅ payment verified"
        );
        0
    } else if final_snapshot.is_failure {
        error!(
            status = %final_snapshot.status,
            attempts = final_snapshot.attempt_count,
            "❌ payment verification failed"
        );
        1
    } else {
        warn!(
            status = %final_snapshot.status,
            attempts = final_snapshot.attempt_count,
            "⏳ verification inconclusive; check your orders later"
        );
        2
    };

    std::process::exit(exit_code);
}
