//! Resolution decision procedure.
//!
//! Computes an outcome when no external ruling exists (UNDER_REVIEW or
//! INTERNAL_REVIEW). Deterministic decision table, in priority order:
//!   1. merchant accepts fault        → customer wins at the requested resolution
//!   2. fraud recommendation REJECT   → merchant wins
//!   3. APPROVE with evidence present → customer wins full refund
//!   4. anything else                 → compromise at half the requested
//!      amount, flagged for human confirmation before it becomes final
//!
//! The produced resolution always carries the fraud factors that drove
//! the call.

use crate::config::ResolutionConfig;
use crate::dispute::{Dispute, RequestedResolution, Resolution, ResolutionOutcome};
use crate::fraud::{FraudAssessment, Recommendation};
use chrono::{DateTime, Utc};

/// A computed outcome plus whether a human must confirm it before the
/// engine may store it as the dispute's resolution.
#[derive(Debug, Clone)]
pub struct ResolutionDecision {
    pub resolution: Resolution,
    pub requires_confirmation: bool,
}

/// Round to the currency's minor unit (2 for most currencies, 0 for e.g. JPY).
pub fn round_to_minor_unit(amount: f64, minor_units: u32) -> f64 {
    let scale = 10f64.powi(minor_units as i32);
    (amount * scale).round() / scale
}

pub fn decide(
    dispute: &Dispute,
    assessment: &FraudAssessment,
    cfg: &ResolutionConfig,
    now: DateTime<Utc>,
) -> ResolutionDecision {
    let factors = assessment.factors.clone();

    // 1. Merchant concedes: customer wins at whatever they asked for.
    if dispute
        .merchant_response
        .as_ref()
        .is_some_and(|r| r.accepts_fault)
    {
        let resolution = resolution_for_request(dispute, factors, now);
        return ResolutionDecision {
            resolution,
            requires_confirmation: false,
        };
    }

    match assessment.recommendation {
        // 2. The risk signals say the claim itself is bad.
        Recommendation::Reject => ResolutionDecision {
            resolution: Resolution {
                outcome: ResolutionOutcome::MerchantWins,
                reason: "insufficient or contradictory evidence".to_string(),
                refund_amount: None,
                compromise_details: None,
                factors,
                decided_at: now,
            },
            requires_confirmation: false,
        },

        // 3. Clean claim with evidence on file.
        Recommendation::Approve if dispute.has_evidence() => ResolutionDecision {
            resolution: Resolution {
                outcome: ResolutionOutcome::CustomerWinsFullRefund,
                reason: "risk signals and evidence support the claim".to_string(),
                refund_amount: Some(dispute.txn_amount),
                compromise_details: None,
                factors,
                decided_at: now,
            },
            requires_confirmation: false,
        },

        // 4. Mixed or thin evidence: split the requested amount and put a
        //    human in the loop.
        _ => {
            let requested = dispute
                .requested_resolution
                .requested_amount(dispute.txn_amount);
            let half = round_to_minor_unit(requested / 2.0, cfg.minor_units(&dispute.currency));
            ResolutionDecision {
                resolution: Resolution {
                    outcome: ResolutionOutcome::Compromise,
                    reason: "mixed evidence; partial settlement proposed".to_string(),
                    refund_amount: Some(half),
                    compromise_details: Some(format!(
                        "partial refund of {half:.2} {} (half of requested)",
                        dispute.currency
                    )),
                    factors,
                    decided_at: now,
                },
                requires_confirmation: true,
            }
        }
    }
}

/// The resolution a conceding merchant grants: exactly what the customer
/// requested when filing.
fn resolution_for_request(
    dispute: &Dispute,
    factors: Vec<crate::fraud::RiskFactor>,
    now: DateTime<Utc>,
) -> Resolution {
    let reason = "merchant accepted fault".to_string();
    match &dispute.requested_resolution {
        RequestedResolution::FullRefund => Resolution {
            outcome: ResolutionOutcome::CustomerWinsFullRefund,
            reason,
            refund_amount: Some(dispute.txn_amount),
            compromise_details: None,
            factors,
            decided_at: now,
        },
        RequestedResolution::PartialRefund { amount } => Resolution {
            outcome: ResolutionOutcome::CustomerWinsPartialRefund,
            reason,
            refund_amount: Some(amount.min(dispute.txn_amount)),
            compromise_details: None,
            factors,
            decided_at: now,
        },
        RequestedResolution::Replacement => Resolution {
            outcome: ResolutionOutcome::Compromise,
            reason,
            refund_amount: None,
            compromise_details: Some("merchant replaces the item as requested".to_string()),
            factors,
            decided_at: now,
        },
    }
}
