//! The dispute state machine.
//!
//! RULES:
//!   - Status moves ONLY through the transition table in `apply`.
//!   - A disallowed (status, trigger) pair is rejected with
//!     InvalidForState, never silently ignored. Stale/duplicate Network
//!     deliveries are filtered earlier, by the reconciliation engine.
//!   - Exactly one timeline event is produced per accepted transition;
//!     the actor derives from the trigger origin.
//!   - `apply` is pure over the aggregate: no I/O, no clock reads. The
//!     engine persists the returned event and drives notifications.

use crate::dispute::{Dispute, DisputeStatus, MerchantResponse, Resolution};
use crate::error::{DisputeError, DisputeResult};
use crate::timeline::{events, Actor, TimelineEvent};
use crate::types::CaseId;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Everything that can move a dispute. Variants are fixed; payload shape
/// depends on the trigger.
#[derive(Debug, Clone)]
pub enum Trigger {
    MerchantResponded(MerchantResponse),
    MerchantTimeout48h,
    InternalDecision(Resolution),
    Escalate,
    Network(NetworkTrigger),
    AdminClose,
}

/// Network-originated triggers, already translated out of the Network's
/// vocabulary by the reconciliation engine. The state machine never sees
/// raw Network strings except as opaque recorded values.
#[derive(Debug, Clone)]
pub enum NetworkTrigger {
    CaseOpened {
        case_id: CaseId,
        raw_status: Option<String>,
    },
    StatusChanged {
        raw_status: String,
    },
    EvidenceRequested,
    Ruled {
        resolution: Resolution,
        raw_resolution: String,
    },
    Message {
        body: String,
    },
}

impl Trigger {
    /// Stable name, used in rejection errors and notification kinds.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MerchantResponded(_) => "merchant_responded",
            Self::MerchantTimeout48h => "merchant_timeout_48h",
            Self::InternalDecision(_) => "internal_decision",
            Self::Escalate => "escalate",
            Self::Network(NetworkTrigger::CaseOpened { .. }) => "network_case_opened",
            Self::Network(NetworkTrigger::StatusChanged { .. }) => "network_status_changed",
            Self::Network(NetworkTrigger::EvidenceRequested) => "network_evidence_requested",
            Self::Network(NetworkTrigger::Ruled { .. }) => "network_ruled",
            Self::Network(NetworkTrigger::Message { .. }) => "network_message",
            Self::AdminClose => "admin_close",
        }
    }
}

fn rejected(dispute: &Dispute, trigger: &Trigger) -> DisputeError {
    DisputeError::InvalidForState {
        status: dispute.status.as_str().to_string(),
        trigger: trigger.name().to_string(),
    }
}

/// Apply one trigger to a loaded aggregate. On success the aggregate is
/// mutated in place and the single timeline event for the transition is
/// returned for the caller to append.
pub fn apply(
    dispute: &mut Dispute,
    trigger: Trigger,
    now: DateTime<Utc>,
) -> DisputeResult<TimelineEvent> {
    use DisputeStatus::*;

    let event = match (dispute.status, trigger) {
        // ── Merchant response ───────────────────────────────────────
        (MerchantReview | UnderReview, Trigger::MerchantResponded(response)) => {
            let replaced = dispute.merchant_response.is_some();
            let name = if replaced {
                events::MERCHANT_RESPONSE_REPLACED
            } else {
                events::MERCHANT_RESPONDED
            };
            let details = json!({
                "accepts_fault": response.accepts_fault,
                "evidence_count": response.evidence.len(),
                "resolution_offer": response.resolution_offer.clone(),
                "replaced_prior": replaced,
            });
            dispute.merchant_response = Some(response);
            dispute.status = UnderReview;
            TimelineEvent::new(&dispute.dispute_id, name, now, Actor::Merchant, details)
        }

        // ── 48h merchant silence (polled deadline, fired by the caller) ─
        (MerchantReview, t @ Trigger::MerchantTimeout48h) => {
            if dispute.merchant_response.is_some() {
                return Err(rejected(dispute, &t));
            }
            dispute.status = UnderReview;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::NO_RESPONSE,
                now,
                Actor::System,
                json!({ "note": "no-response", "window_opened_at": dispute.created_at }),
            )
        }

        // ── Internal decision, no external ruling ───────────────────
        (UnderReview | InternalReview, Trigger::InternalDecision(resolution)) => {
            if let Some(refund) = resolution.refund_amount {
                if refund > dispute.txn_amount {
                    return Err(DisputeError::RefundExceedsTransaction {
                        refund,
                        txn_amount: dispute.txn_amount,
                    });
                }
            }
            let details = json!({
                "outcome": resolution.outcome.as_str(),
                "reason": resolution.reason.clone(),
                "refund_amount": resolution.refund_amount,
            });
            dispute.resolution = Some(resolution);
            dispute.status = Resolved;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::RESOLVED,
                now,
                Actor::System,
                details,
            )
        }

        // ── Escalation to the Network ───────────────────────────────
        (UnderReview | InternalReview, Trigger::Escalate) => {
            dispute.status = EscalatedToNetwork;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::ESCALATED_TO_NETWORK,
                now,
                Actor::System,
                json!({ "network_case_id": dispute.network_case_id.clone() }),
            )
        }

        // ── Network acknowledges / opens the case ───────────────────
        // Accepted from every pre-terminal status: the external ack wins
        // the race against whatever the internal side was doing.
        (
            Submitted | MerchantReview | UnderReview | InternalReview | EscalatedToNetwork,
            Trigger::Network(NetworkTrigger::CaseOpened { case_id, raw_status }),
        ) => {
            if dispute.network_case_id.is_none() {
                dispute.network_case_id = Some(case_id.clone());
            }
            if let Some(raw) = &raw_status {
                dispute.network_status = Some(raw.clone());
            }
            dispute.status = EscalatedToNetwork;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_CASE_OPENED,
                now,
                Actor::Network,
                json!({ "network_case_id": case_id, "network_status": raw_status }),
            )
        }

        // ── Network status refresh: raw field + timeline only ───────
        // Never regresses the internal status; stale updates are inert.
        (
            Submitted | MerchantReview | UnderReview | InternalReview | EscalatedToNetwork,
            Trigger::Network(NetworkTrigger::StatusChanged { raw_status }),
        ) => {
            let previous = dispute.network_status.replace(raw_status.clone());
            TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_STATUS_CHANGED,
                now,
                Actor::Network,
                json!({ "from": previous, "to": raw_status }),
            )
        }

        // ── Network wants more evidence ─────────────────────────────
        (EscalatedToNetwork, Trigger::Network(NetworkTrigger::EvidenceRequested)) => {
            dispute.status = InternalReview;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_EVIDENCE_REQUESTED,
                now,
                Actor::Network,
                json!({ "network_case_id": dispute.network_case_id.clone() }),
            )
        }

        // ── Network ruling resolves the dispute ─────────────────────
        // Also valid during INTERNAL_REVIEW: the Network may rule while
        // evidence is still being gathered on our side.
        (
            EscalatedToNetwork | InternalReview,
            Trigger::Network(NetworkTrigger::Ruled {
                resolution,
                raw_resolution,
            }),
        ) => {
            let details = json!({
                "outcome": resolution.outcome.as_str(),
                "network_resolution": raw_resolution.clone(),
                "refund_amount": resolution.refund_amount,
            });
            dispute.network_resolution = Some(raw_resolution);
            dispute.resolution = Some(resolution);
            dispute.status = Resolved;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_RESOLVED,
                now,
                Actor::Network,
                details,
            )
        }

        // ── Case correspondence ─────────────────────────────────────
        (
            Submitted | MerchantReview | UnderReview | InternalReview | EscalatedToNetwork,
            Trigger::Network(NetworkTrigger::Message { body }),
        ) => TimelineEvent::new(
            &dispute.dispute_id,
            events::NETWORK_MESSAGE,
            now,
            Actor::Network,
            json!({ "body": body }),
        ),

        // ── Administrative archival ─────────────────────────────────
        (Resolved, Trigger::AdminClose) => {
            dispute.status = Closed;
            TimelineEvent::new(
                &dispute.dispute_id,
                events::CLOSED,
                now,
                Actor::System,
                json!({}),
            )
        }

        (_, trigger) => return Err(rejected(dispute, &trigger)),
    };

    dispute.updated_at = now;
    Ok(event)
}
