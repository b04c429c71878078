//! Shared test fixtures: in-memory engine with a pinned clock, a
//! recording notifier, and a static network client.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dispute_core::clock::FixedClock;
use dispute_core::config::EngineConfig;
use dispute_core::dispute::{NewDispute, RequestedResolution};
use dispute_core::engine::DisputeEngine;
use dispute_core::network::{CaseSummary, NetworkClient};
use dispute_core::notifier::Notifier;
use dispute_core::store::DisputeStore;
use dispute_core::types::{CaseId, DisputeId};
use std::sync::{Arc, Mutex};

pub const TEST_CASE_ID: &str = "case-net-1";

/// All engine time in tests starts here and only moves via the clock handle.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Captures every (dispute_id, event) notification for assertions.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, dispute_id: &DisputeId, event: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((dispute_id.clone(), event.to_string()));
        Ok(())
    }
}

/// Always hands out the same case id, so tests can assert linkage.
pub struct StaticNetworkClient;

impl NetworkClient for StaticNetworkClient {
    fn create_case(&self, _summary: &CaseSummary) -> anyhow::Result<CaseId> {
        Ok(TEST_CASE_ID.to_string())
    }

    fn fetch_case_status(&self, _case_id: &CaseId) -> anyhow::Result<String> {
        Ok("SUBMITTED".to_string())
    }
}

pub fn build_engine() -> (DisputeEngine, Arc<FixedClock>, RecordingNotifier) {
    build_engine_with_config(EngineConfig::default_test())
}

pub fn build_engine_with_config(
    config: EngineConfig,
) -> (DisputeEngine, Arc<FixedClock>, RecordingNotifier) {
    let store = DisputeStore::in_memory().expect("in-memory store");
    store.migrate().expect("migrate");
    let clock = Arc::new(FixedClock::new(start()));
    let notifier = RecordingNotifier::default();
    let engine = DisputeEngine::new(
        store,
        config,
        clock.clone(),
        Box::new(notifier.clone()),
        Box::new(StaticNetworkClient),
    );
    (engine, clock, notifier)
}

/// A dispute over a 90.00 USD QR payment asking for a full refund.
pub fn new_dispute(contact_merchant_first: bool) -> NewDispute {
    NewDispute {
        transaction_id: "txn-1001".to_string(),
        customer_id: "cust-77".to_string(),
        merchant_id: "merch-12".to_string(),
        txn_amount: 90.0,
        currency: "USD".to_string(),
        requested_resolution: RequestedResolution::FullRefund,
        reason: "item_not_received".to_string(),
        description: "Paid at the stall, nothing was handed over".to_string(),
        evidence_refs: vec!["evidence://qr-payload/txn-1001".to_string()],
        contact_merchant_first,
    }
}
