//! Resolution decision procedure tests: the priority order of the
//! decision table, the compromise computation, and the human
//! confirmation gate.

mod common;

use common::{build_engine, new_dispute, start};
use dispute_core::dispute::{DisputeStatus, MerchantResponse, RequestedResolution, ResolutionOutcome};
use dispute_core::engine::ResolveAttempt;
use dispute_core::error::DisputeResult;
use dispute_core::fraud::RiskFactor;
use dispute_core::resolution::round_to_minor_unit;
use dispute_core::state_machine::Trigger;
use dispute_core::timeline::events;

fn factor(name: &str, s: f64) -> RiskFactor {
    RiskFactor::new(name, s, "test factor")
}

fn respond(engine: &dispute_core::DisputeEngine, id: &str, accepts_fault: bool) -> DisputeResult<()> {
    engine.apply_transition(
        id,
        Trigger::MerchantResponded(MerchantResponse {
            message: "response".to_string(),
            accepts_fault,
            evidence: Vec::new(),
            resolution_offer: None,
            received_at: start(),
        }),
    )?;
    Ok(())
}

/// Merchant accepts fault: customer wins at the requested resolution,
/// regardless of what the fraud signals say.
#[test]
fn accepts_fault_wins_at_requested_resolution() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();
    respond(&engine, &id, true)?;

    // High-risk factors would normally reject; priority 1 overrides.
    let attempt = engine.resolve_internally(&id, &[factor("velocity", 0.95)])?;
    let resolved = match attempt {
        ResolveAttempt::Applied(d) => d,
        ResolveAttempt::NeedsConfirmation(_) => panic!("accepts-fault must apply directly"),
    };

    assert_eq!(resolved.status, DisputeStatus::Resolved);
    let resolution = resolved.resolution.expect("resolution set");
    assert_eq!(resolution.outcome, ResolutionOutcome::CustomerWinsFullRefund);
    assert_eq!(resolution.refund_amount, Some(90.0));

    Ok(())
}

/// A partial-refund request is honored at the requested amount.
#[test]
fn accepts_fault_honors_partial_request() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let mut new = new_dispute(true);
    new.requested_resolution = RequestedResolution::PartialRefund { amount: 30.0 };
    let dispute = engine.file_dispute(new)?;
    let id = dispute.dispute_id.clone();
    respond(&engine, &id, true)?;

    let attempt = engine.resolve_internally(&id, &[])?;
    let ResolveAttempt::Applied(resolved) = attempt else {
        panic!("accepts-fault must apply directly");
    };
    let resolution = resolved.resolution.expect("resolution set");
    assert_eq!(resolution.outcome, ResolutionOutcome::CustomerWinsPartialRefund);
    assert_eq!(resolution.refund_amount, Some(30.0));

    Ok(())
}

/// REJECT recommendation: merchant wins with the canonical reason.
#[test]
fn reject_recommendation_means_merchant_wins() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    let attempt = engine.resolve_internally(
        &id,
        &[factor("velocity", 0.9), factor("chargeback_history", 0.85)],
    )?;
    let ResolveAttempt::Applied(resolved) = attempt else {
        panic!("reject must apply directly");
    };
    let resolution = resolved.resolution.expect("resolution set");
    assert_eq!(resolution.outcome, ResolutionOutcome::MerchantWins);
    assert_eq!(resolution.reason, "insufficient or contradictory evidence");
    assert!(resolution.refund_amount.is_none());
    // The driving factors survive into the audit record.
    assert_eq!(resolution.factors.len(), 2);

    Ok(())
}

/// APPROVE with evidence on file: full refund.
#[test]
fn approve_with_evidence_full_refund() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    let attempt = engine.resolve_internally(&id, &[factor("velocity", 0.05)])?;
    let ResolveAttempt::Applied(resolved) = attempt else {
        panic!("approve with evidence must apply directly");
    };
    let resolution = resolved.resolution.expect("resolution set");
    assert_eq!(resolution.outcome, ResolutionOutcome::CustomerWinsFullRefund);
    assert_eq!(resolution.refund_amount, Some(90.0));

    Ok(())
}

/// Mixed evidence: compromise at half the requested amount, parked for a
/// human to confirm. The dispute itself does not move.
#[test]
fn mixed_evidence_proposes_half_compromise() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    let attempt = engine.resolve_internally(&id, &[factor("velocity", 0.5)])?;
    let ResolveAttempt::NeedsConfirmation(decision) = attempt else {
        panic!("further-review must require confirmation");
    };
    assert_eq!(decision.resolution.outcome, ResolutionOutcome::Compromise);
    assert_eq!(decision.resolution.refund_amount, Some(45.0));

    // Status unchanged; the proposal is on the timeline.
    let current = engine.dispute(&id)?;
    assert_eq!(current.status, DisputeStatus::UnderReview);
    assert!(current.resolution.is_none());
    let timeline = engine.timeline(&id)?;
    assert_eq!(timeline.last().unwrap().event, events::RESOLUTION_PROPOSED);

    // A reviewer confirms the proposal verbatim.
    let confirmed =
        engine.apply_transition(&id, Trigger::InternalDecision(decision.resolution))?;
    assert_eq!(confirmed.status, DisputeStatus::Resolved);

    Ok(())
}

/// Compromise amounts land on the currency's minor unit.
#[test]
fn compromise_rounds_to_minor_unit() {
    assert_eq!(round_to_minor_unit(45.0, 2), 45.0);
    assert_eq!(round_to_minor_unit(33.333333, 2), 33.33);
    assert_eq!(round_to_minor_unit(22.5, 0), 23.0);
    assert_eq!(round_to_minor_unit(0.004, 2), 0.0);
}

/// The procedure only runs while the dispute is reviewable.
#[test]
fn resolution_requires_review_status() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;

    let err = engine
        .resolve_internally(&dispute.dispute_id, &[])
        .unwrap_err();
    assert!(matches!(
        err,
        dispute_core::DisputeError::InvalidForState { .. }
    ));

    Ok(())
}
