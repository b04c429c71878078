//! The timeline ledger — append-only history of everything that happened
//! to a dispute. The single source of truth for "what happened when".
//!
//! RULE: Timeline events are immutable facts. They are appended, never
//! updated or deleted. Within one dispute the total order is
//! (timestamp, seq) — seq is the store-assigned insertion counter that
//! breaks ties when two sources report the same instant.

use crate::types::DisputeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who caused a timeline entry. Notification and display code switch on
/// this tag; it is derived from the trigger origin, never supplied by the
/// inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Merchant,
    System,
    Network,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Merchant => "merchant",
            Self::System => "system",
            Self::Network => "network",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "merchant" => Some(Self::Merchant),
            "system" => Some(Self::System),
            "network" => Some(Self::Network),
            _ => None,
        }
    }
}

/// One immutable timeline fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Store-assigned insertion sequence; None until persisted.
    pub seq: Option<i64>,
    pub dispute_id: DisputeId,
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub details: serde_json::Value,
}

impl TimelineEvent {
    pub fn new(
        dispute_id: &str,
        event: &str,
        timestamp: DateTime<Utc>,
        actor: Actor,
        details: serde_json::Value,
    ) -> Self {
        Self {
            seq: None,
            dispute_id: dispute_id.to_string(),
            event: event.to_string(),
            timestamp,
            actor,
            details,
        }
    }
}

/// Stable event names. Variants are added over time — never renamed, the
/// ledger is a compliance artifact.
pub mod events {
    pub const DISPUTE_FILED: &str = "dispute_filed";
    pub const MERCHANT_CONTACTED: &str = "merchant_contacted";
    pub const SENT_TO_REVIEW: &str = "sent_to_review";
    pub const MERCHANT_RESPONDED: &str = "merchant_responded";
    pub const MERCHANT_RESPONSE_REPLACED: &str = "merchant_response_replaced";
    pub const NO_RESPONSE: &str = "no-response";
    pub const EVIDENCE_ADDED: &str = "evidence_added";
    pub const ESCALATED_TO_NETWORK: &str = "escalated_to_network";
    pub const RESOLVED: &str = "resolved";
    pub const RESOLUTION_PROPOSED: &str = "resolution_proposed";
    pub const CLOSED: &str = "closed";

    pub const NETWORK_CASE_OPENED: &str = "network_case_opened";
    pub const NETWORK_STATUS_CHANGED: &str = "network_status_changed";
    pub const NETWORK_EVIDENCE_REQUESTED: &str = "network_evidence_requested";
    pub const NETWORK_MESSAGE: &str = "network_message";
    pub const NETWORK_RESOLVED: &str = "network_resolved";
    pub const NETWORK_RESOLUTION_CONFLICT: &str = "network_resolution_conflict";
    pub const NETWORK_EVENT_AFTER_CLOSE: &str = "network_event_after_close";
}
