use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use meshack_core::domain::{AckMode, AckPolicyOverride, HandlerConfig, NackOutcome, TaskId};
use meshack_core::impls::HandleLedger;
use meshack_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use meshack_core::{Acceptance, Gateway, GatewayBuilder, GatewayConfig};

/// Runs a simulated burst of broker messages through the settlement core
/// and prints the resulting counters.
#[derive(Debug, Parser)]
#[command(name = "meshack", version)]
struct Cli {
    /// Gateway config (JSON). A three-handler demo config is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of inbound messages.
    #[arg(long, default_value_t = 20)]
    messages: usize,

    /// Probability that a task reports failure.
    #[arg(long, default_value_t = 0.2)]
    failure_rate: f64,

    /// Probability that a task never reports back (left to the timeout).
    #[arg(long, default_value_t = 0.1)]
    stall_rate: f64,

    /// Probability that a message matches no handler.
    #[arg(long, default_value_t = 0.05)]
    unroutable_rate: f64,

    /// Upper bound on simulated task duration.
    #[arg(long, default_value_t = 200)]
    max_work_ms: u64,

    /// Settlement deadline; overrides the config value.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How long to let tasks run before shutting down.
    #[arg(long, default_value_t = 1_000)]
    run_ms: u64,
}

fn demo_config() -> GatewayConfig {
    GatewayConfig::default()
        .with_default_policy(AckPolicyOverride::mode(AckMode::OnCompletion))
        .with_handler(HandlerConfig::new("orders"))
        .with_handler(
            HandlerConfig::new("audit")
                .with_policy(AckPolicyOverride::default().with_nack_outcome(NackOutcome::Failed)),
        )
        .with_handler(
            HandlerConfig::new("metrics").with_policy(AckPolicyOverride::mode(AckMode::OnReceive)),
        )
}

/// Stand-in for the task executor: reports back after a random delay,
/// unless the task stalls.
async fn run_task(gateway: Arc<Gateway>, task_id: TaskId, work: Duration, success: bool) {
    sleep(work).await;
    gateway.complete(task_id, success).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    for (name, p) in [
        ("failure-rate", cli.failure_rate),
        ("stall-rate", cli.stall_rate),
        ("unroutable-rate", cli.unroutable_rate),
    ] {
        anyhow::ensure!((0.0..=1.0).contains(&p), "--{name} must be within [0, 1], got {p}");
    }

    let config = match &cli.config {
        Some(path) => GatewayConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => demo_config(),
    };

    let mut builder = GatewayBuilder::new(config);
    if let Some(ms) = cli.timeout_ms {
        builder = builder.settlement_timeout(Duration::from_millis(ms));
    }
    let gateway = Arc::new(builder.build()?);
    let handlers = gateway.handlers().names();

    let ledger = HandleLedger::new();
    let ids = UlidGenerator::new(SystemClock);
    let mut workers = Vec::new();
    let mut rng = rand::thread_rng();

    for _ in 0..cli.messages {
        let message_id = ids.generate_message_id();
        let task_id = ids.generate_task_id();
        let handle = Box::new(ledger.handle(message_id));

        let handler = if handlers.is_empty() || rng.gen_bool(cli.unroutable_rate) {
            "unrouted".to_string()
        } else {
            handlers[rng.gen_range(0..handlers.len())].clone()
        };

        match gateway.accept(task_id, handle, &handler).await {
            Ok(Acceptance::Deferred) => {
                if rng.gen_bool(cli.stall_rate) {
                    tracing::debug!(task_id = %task_id, "task stalls; left to the deadline");
                    continue;
                }
                let work = Duration::from_millis(rng.gen_range(0..=cli.max_work_ms));
                let success = !rng.gen_bool(cli.failure_rate);
                workers.push(tokio::spawn(run_task(gateway.clone(), task_id, work, success)));
            }
            Ok(Acceptance::SettledUpstream) => {}
            Ok(Acceptance::Rejected { reason, outcome }) => {
                tracing::debug!(message_id = %message_id, %reason, ?outcome, "message rejected");
            }
            Err(err) => {
                tracing::error!(task_id = %err.task_id(), error = %err, "submission refused")
            }
        }
    }

    sleep(Duration::from_millis(cli.run_ms)).await;
    let report = gateway.shutdown("simulation finished").await;

    for worker in workers {
        worker.await.context("task executor panicked")?;
    }

    let summary = serde_json::json!({
        "counts": gateway.counts(),
        "drain": report,
        "broker": {
            "acks": ledger.acks(),
            "nacks": ledger.nacks(),
            "failed_calls": ledger.failed_calls(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
