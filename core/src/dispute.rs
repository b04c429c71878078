//! The dispute aggregate and its value types.
//!
//! A dispute tracks one customer/merchant disagreement over one QR
//! point-of-sale transaction. Status only moves through the transition
//! table in state_machine.rs; the resolution is write-once; terminal
//! records are retained forever for audit.

use crate::fraud::RiskFactor;
use crate::types::{CaseId, DisputeId, EntityId, TransactionId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Submitted,
    MerchantReview,
    UnderReview,
    EscalatedToNetwork,
    InternalReview,
    Resolved,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::MerchantReview => "merchant_review",
            Self::UnderReview => "under_review",
            Self::EscalatedToNetwork => "escalated_to_network",
            Self::InternalReview => "internal_review",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "merchant_review" => Some(Self::MerchantReview),
            "under_review" => Some(Self::UnderReview),
            "escalated_to_network" => Some(Self::EscalatedToNetwork),
            "internal_review" => Some(Self::InternalReview),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// What the customer asked for when filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestedResolution {
    FullRefund,
    PartialRefund { amount: f64 },
    Replacement,
}

impl RequestedResolution {
    /// The monetary value of the request, used as the base for full-refund
    /// and compromise amounts.
    pub fn requested_amount(&self, txn_amount: f64) -> f64 {
        match self {
            Self::FullRefund | Self::Replacement => txn_amount,
            Self::PartialRefund { amount } => amount.min(txn_amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    CustomerWinsFullRefund,
    CustomerWinsPartialRefund,
    MerchantWins,
    Compromise,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerWinsFullRefund => "customer_wins_full_refund",
            Self::CustomerWinsPartialRefund => "customer_wins_partial_refund",
            Self::MerchantWins => "merchant_wins",
            Self::Compromise => "compromise",
        }
    }
}

/// Terminal, write-once resolution record. `factors` preserves the fraud
/// factors that drove the call, for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub reason: String,
    pub refund_amount: Option<f64>,
    pub compromise_details: Option<String>,
    #[serde(default)]
    pub factors: Vec<RiskFactor>,
    pub decided_at: DateTime<Utc>,
}

/// The merchant's answer to a dispute. At most one is current; a later
/// response replaces the prior one (the replacement itself is recorded on
/// the timeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantResponse {
    pub message: String,
    pub accepts_fault: bool,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub resolution_offer: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// A notifiable party. Tagged union, not inheritance — notification code
/// switches on the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Participant {
    Customer { id: EntityId, email: String },
    Merchant { id: EntityId, email: String },
}

impl Participant {
    pub fn id(&self) -> &str {
        match self {
            Self::Customer { id, .. } | Self::Merchant { id, .. } => id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Customer { email, .. } | Self::Merchant { email, .. } => email,
        }
    }
}

/// The aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: DisputeId,
    pub version: Version,
    pub transaction_id: TransactionId,
    pub customer_id: EntityId,
    pub merchant_id: EntityId,
    /// Snapshot of the disputed transaction, bounds any refund.
    pub txn_amount: f64,
    pub currency: String,
    pub status: DisputeStatus,
    pub requested_resolution: RequestedResolution,
    pub reason: String,
    pub description: String,
    /// Ordered; duplicates allowed, order is evidentiary.
    pub evidence_refs: Vec<String>,
    pub contact_merchant_first: bool,
    pub merchant_response: Option<MerchantResponse>,
    pub network_case_id: Option<CaseId>,
    /// Last-seen raw Network status, untranslated.
    pub network_status: Option<String>,
    pub network_resolution: Option<String>,
    pub resolution: Option<Resolution>,
    pub chat_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    /// Evidence from either side has been attached.
    pub fn has_evidence(&self) -> bool {
        if !self.evidence_refs.is_empty() {
            return true;
        }
        self.merchant_response
            .as_ref()
            .is_some_and(|r| !r.evidence.is_empty())
    }
}

/// Input to `DisputeEngine::file_dispute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDispute {
    pub transaction_id: TransactionId,
    pub customer_id: EntityId,
    pub merchant_id: EntityId,
    pub txn_amount: f64,
    pub currency: String,
    pub requested_resolution: RequestedResolution,
    pub reason: String,
    pub description: String,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    pub contact_merchant_first: bool,
}
