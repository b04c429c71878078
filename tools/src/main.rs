//! ops-runner: headless operations runner for the dispute engine.
//!
//! Usage:
//!   ops-runner --db disputes.db --data-dir ./data --replay webhooks.jsonl
//!   ops-runner --db disputes.db --fire-timeouts
//!   ops-runner --demo
//!
//! A thin caller of the library's public operations: replays a JSONL file
//! of Network webhook payloads through `reconcile`, fires due merchant
//! timeouts once, and prints a summary. No engine logic lives here.

use anyhow::Result;
use chrono::Utc;
use dispute_core::config::EngineConfig;
use dispute_core::dispute::{DisputeStatus, NewDispute, RequestedResolution};
use dispute_core::engine::DisputeEngine;
use dispute_core::error::DisputeError;
use dispute_core::reconcile::WebhookPayload;
use dispute_core::state_machine::Trigger;
use dispute_core::store::DisputeStore;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};

#[derive(Default)]
struct ReplayStats {
    applied: u64,
    unknown: u64,
    rejected: u64,
    parse_errors: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let replay = arg_value(&args, "--replay");
    let fire_timeouts = args.iter().any(|a| a == "--fire-timeouts");
    let demo = args.iter().any(|a| a == "--demo");

    println!("dispute ops-runner");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let store = DisputeStore::open(db)?;
    store.migrate()?;

    let config = match EngineConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("no engine config in {data_dir} ({e}); using defaults");
            EngineConfig::default()
        }
    };
    let engine = DisputeEngine::build(store, config);

    if demo {
        seed_demo_dispute(&engine)?;
    }

    if let Some(path) = replay {
        let stats = replay_webhooks(&engine, path)?;
        println!("=== REPLAY ===");
        println!("  applied:       {}", stats.applied);
        println!("  unknown:       {}", stats.unknown);
        println!("  rejected:      {}", stats.rejected);
        println!("  parse errors:  {}", stats.parse_errors);
        println!();
    }

    if fire_timeouts {
        let fired = fire_due_timeouts(&engine)?;
        println!("=== TIMEOUTS ===");
        println!("  fired:         {fired}");
        println!();
    }

    print_summary(&engine)?;
    Ok(())
}

/// Seed one open dispute so a replay file has something to match.
fn seed_demo_dispute(engine: &DisputeEngine) -> Result<()> {
    let dispute = engine.file_dispute(NewDispute {
        transaction_id: "txn-demo-1".to_string(),
        customer_id: "cust-demo".to_string(),
        merchant_id: "merch-demo".to_string(),
        txn_amount: 120.0,
        currency: "USD".to_string(),
        requested_resolution: RequestedResolution::FullRefund,
        reason: "item_not_received".to_string(),
        description: "Demo dispute".to_string(),
        evidence_refs: vec!["evidence://qr-payload/txn-demo-1".to_string()],
        contact_merchant_first: false,
    })?;
    engine.apply_transition(&dispute.dispute_id, Trigger::Escalate)?;
    println!(
        "seeded demo dispute {} (case {})",
        dispute.dispute_id,
        engine
            .dispute(&dispute.dispute_id)?
            .network_case_id
            .unwrap_or_default()
    );
    Ok(())
}

/// One webhook payload per line. Signature verification is assumed to
/// have happened upstream of the file.
fn replay_webhooks(engine: &DisputeEngine, path: &str) -> Result<ReplayStats> {
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let mut stats = ReplayStats::default();

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let payload: WebhookPayload = match serde_json::from_str(&line) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("line {}: unparseable webhook: {e}", lineno + 1);
                stats.parse_errors += 1;
                continue;
            }
        };
        let event = match payload.into_event() {
            Ok(ev) => ev,
            Err(e) => {
                log::warn!("line {}: {e}", lineno + 1);
                stats.parse_errors += 1;
                continue;
            }
        };
        match engine.reconcile(event) {
            Ok(()) => stats.applied += 1,
            Err(DisputeError::UnknownDispute { .. }) => stats.unknown += 1,
            Err(
                DisputeError::UnmappedNetworkStatus { .. }
                | DisputeError::MalformedNetworkEvent { .. },
            ) => stats.rejected += 1,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(stats)
}

fn fire_due_timeouts(engine: &DisputeEngine) -> Result<u64> {
    let due = engine.due_transitions(Utc::now())?;
    let mut fired = 0;
    for dispute_id in due {
        engine.apply_transition(&dispute_id, Trigger::MerchantTimeout48h)?;
        fired += 1;
    }
    Ok(fired)
}

fn print_summary(engine: &DisputeEngine) -> Result<()> {
    println!("=== SUMMARY ===");
    println!("  disputes:        {}", engine.store.dispute_count()?);
    for status in [
        DisputeStatus::Submitted,
        DisputeStatus::MerchantReview,
        DisputeStatus::UnderReview,
        DisputeStatus::EscalatedToNetwork,
        DisputeStatus::InternalReview,
        DisputeStatus::Resolved,
        DisputeStatus::Closed,
    ] {
        let count = engine.store.count_by_status(status)?;
        if count > 0 {
            println!("    {:22} {count}", status.as_str());
        }
    }

    let conflicts = engine.resolution_conflicts()?;
    println!("  conflicts:       {}", conflicts.len());
    for c in &conflicts {
        println!(
            "    {} internal={} network={}",
            c.dispute_id, c.internal_outcome, c.network_resolution
        );
    }

    let dead = engine.dead_letters()?;
    println!("  dead letters:    {}", dead.len());
    for dl in &dead {
        println!("    {} ({})", dl.event_key, dl.reason);
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
