//! Outbound Network client seam.
//!
//! Thin RPC wrapper, out of scope to implement beyond the call shapes.
//! The engine calls `create_case` when a dispute is escalated and stores
//! the returned case id; the later CREATED webhook is then an idempotent
//! acknowledgment.

use crate::types::{CaseId, DisputeId, TransactionId};
use serde::{Deserialize, Serialize};

/// What the Network needs to open a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub dispute_id: DisputeId,
    pub transaction_id: TransactionId,
    pub amount: f64,
    pub currency: String,
    pub reason: String,
}

pub trait NetworkClient: Send + Sync {
    fn create_case(&self, summary: &CaseSummary) -> anyhow::Result<CaseId>;
    fn fetch_case_status(&self, case_id: &CaseId) -> anyhow::Result<String>;
}

/// Offline stand-in used by tests and the runner: mints a local case id
/// and reports every case as SUBMITTED.
#[derive(Debug, Default)]
pub struct OfflineNetworkClient;

impl NetworkClient for OfflineNetworkClient {
    fn create_case(&self, summary: &CaseSummary) -> anyhow::Result<CaseId> {
        let case_id = format!("case-{}", uuid::Uuid::new_v4());
        log::debug!(
            "offline network: opened {case_id} for dispute {}",
            summary.dispute_id
        );
        Ok(case_id)
    }

    fn fetch_case_status(&self, _case_id: &CaseId) -> anyhow::Result<String> {
        Ok("SUBMITTED".to_string())
    }
}
