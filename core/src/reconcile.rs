//! Network vocabulary and translation.
//!
//! RULE: This is the ONLY module that understands the Network's raw
//! status/resolution strings and webhook shape. Everything is translated
//! into state-machine triggers before the rest of the engine sees it, and
//! unknown vocabulary fails closed: recorded, never guessed.
//!
//! Inbound events may be duplicated, out of order, or early (a CREATED we
//! have not matched yet). The idempotency key and the dead-letter record
//! defined here make at-least-once delivery safe.

use crate::dispute::{Dispute, Resolution, ResolutionOutcome};
use crate::error::{DisputeError, DisputeResult};
use crate::types::{CaseId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEventKind {
    Created,
    Updated,
    Resolved,
    EvidenceRequested,
    Message,
}

impl NetworkEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Resolved => "resolved",
            Self::EvidenceRequested => "evidence_requested",
            Self::Message => "message",
        }
    }
}

/// One inbound Network notification, already authenticated by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub network_case_id: Option<CaseId>,
    /// The originating payment id; CREATED events are matched by this,
    /// because the case id does not exist on the internal side yet.
    pub network_payment_id: Option<TransactionId>,
    pub kind: NetworkEventKind,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub refund_amount: Option<f64>,
    pub message: Option<String>,
    pub external_timestamp: DateTime<Utc>,
}

impl NetworkEvent {
    /// The id this event is matched on: case id for everything except
    /// CREATED, payment id for CREATED.
    pub fn reference(&self) -> Option<&str> {
        match self.kind {
            NetworkEventKind::Created => self.network_payment_id.as_deref(),
            _ => self.network_case_id.as_deref(),
        }
    }

    /// Processed-event key. Two deliveries with the same key are the same
    /// notification; the second is a no-op.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.reference().unwrap_or("-"),
            self.kind.as_str(),
            self.external_timestamp.to_rfc3339(),
        )
    }
}

// ── Inbound webhook shape ────────────────────────────────────────────

/// The bit-relevant fields of the Network's webhook body. Signature
/// verification happens before this payload is parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    #[serde(rename = "networkCaseId")]
    pub network_case_id: Option<String>,
    #[serde(rename = "networkPaymentId")]
    pub network_payment_id: Option<String>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub refund_amount: Option<f64>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl WebhookPayload {
    pub fn into_event(self) -> DisputeResult<NetworkEvent> {
        let kind = match self.event_type.as_str() {
            "dispute.created" => NetworkEventKind::Created,
            "dispute.updated" => NetworkEventKind::Updated,
            "dispute.resolved" => NetworkEventKind::Resolved,
            "dispute.evidence_requested" => NetworkEventKind::EvidenceRequested,
            "dispute.message" => NetworkEventKind::Message,
            other => {
                return Err(DisputeError::MalformedNetworkEvent {
                    reason: format!("unknown webhook type '{other}'"),
                })
            }
        };

        // Most specific event-side timestamp wins; the envelope timestamp
        // is the fallback.
        let external_timestamp = self
            .data
            .resolved_at
            .or(self.data.updated_at)
            .or(self.data.created_at)
            .unwrap_or(self.timestamp);

        Ok(NetworkEvent {
            network_case_id: self.data.network_case_id,
            network_payment_id: self.data.network_payment_id,
            kind,
            status: self.data.status,
            resolution: self.data.resolution,
            refund_amount: self.data.refund_amount,
            message: self.data.message,
            external_timestamp,
        })
    }
}

// ── Fixed vocabulary mapping ─────────────────────────────────────────

/// Raw Network statuses that all translate to the internal
/// ESCALATED_TO_NETWORK lifecycle phase. Anything else is unmapped.
const KNOWN_CASE_STATUSES: [&str; 5] = [
    "SUBMITTED",
    "UNDER_REVIEW",
    "MERCHANT_RESPONDED",
    "EVIDENCE_REQUIRED",
    "RESOLVED",
];

pub fn is_known_status(raw: &str) -> bool {
    KNOWN_CASE_STATUSES.contains(&raw)
}

/// Translate a Network ruling into an internal resolution.
/// `won` → customer full refund, `lost` → merchant wins, `partial` →
/// customer partial refund with the Network-supplied amount (required).
/// Unknown vocabulary fails closed.
pub fn ruling_to_resolution(
    raw: &str,
    refund_amount: Option<f64>,
    dispute: &Dispute,
    now: DateTime<Utc>,
) -> DisputeResult<Resolution> {
    let (outcome, refund) = match raw {
        "won" => (
            ResolutionOutcome::CustomerWinsFullRefund,
            Some(refund_amount.unwrap_or(dispute.txn_amount)),
        ),
        "lost" => (ResolutionOutcome::MerchantWins, None),
        "partial" => {
            let amount = refund_amount.ok_or_else(|| DisputeError::MalformedNetworkEvent {
                reason: "partial ruling without refund_amount".to_string(),
            })?;
            (ResolutionOutcome::CustomerWinsPartialRefund, Some(amount))
        }
        other => {
            return Err(DisputeError::UnmappedNetworkStatus {
                status: format!("resolution:{other}"),
            })
        }
    };

    // The Network's ruling cannot be refused, so an amount above the
    // transaction is clamped rather than rejected; the raw value stays on
    // the timeline record.
    let refund = refund.map(|r| {
        if r > dispute.txn_amount {
            log::warn!(
                "Network refund {r:.2} exceeds transaction amount {:.2} for dispute {}; clamping",
                dispute.txn_amount,
                dispute.dispute_id
            );
            dispute.txn_amount
        } else {
            r
        }
    });

    Ok(Resolution {
        outcome,
        reason: format!("Network ruling: {raw}"),
        refund_amount: refund,
        compromise_details: None,
        factors: Vec::new(),
        decided_at: now,
    })
}

/// A retained, unmatched or unmappable inbound event. Never silently
/// dropped; reviewers drain this queue manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub event_key: String,
    pub network_case_id: Option<String>,
    pub network_payment_id: Option<String>,
    pub kind: String,
    pub reason: String,
    pub payload: serde_json::Value,
    pub external_timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

/// Internal and Network resolutions disagree. A first-class queryable
/// state requiring human adjudication, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConflict {
    pub id: Option<i64>,
    pub dispute_id: String,
    pub network_case_id: String,
    pub internal_outcome: String,
    pub network_resolution: String,
    pub network_refund_amount: Option<f64>,
    pub detected_at: DateTime<Utc>,
}
