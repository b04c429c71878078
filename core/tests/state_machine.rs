//! State machine tests: the transition table, guard rejections, the
//! one-timeline-event-per-transition rule, and terminal immutability.

mod common;

use chrono::Utc;
use common::{build_engine, new_dispute};
use dispute_core::dispute::{DisputeStatus, MerchantResponse, Resolution, ResolutionOutcome};
use dispute_core::error::{DisputeError, DisputeResult};
use dispute_core::state_machine::Trigger;
use dispute_core::timeline::{events, Actor};

fn merchant_response(accepts_fault: bool) -> MerchantResponse {
    MerchantResponse {
        message: "Our records show delivery".to_string(),
        accepts_fault,
        evidence: vec!["evidence://pos-receipt/1".to_string()],
        resolution_offer: None,
        received_at: common::start(),
    }
}

fn merchant_wins(reason: &str) -> Resolution {
    Resolution {
        outcome: ResolutionOutcome::MerchantWins,
        reason: reason.to_string(),
        refund_amount: None,
        compromise_details: None,
        factors: Vec::new(),
        decided_at: common::start(),
    }
}

/// Filing routes to merchant review when the customer opted to contact
/// the merchant first, and appends both the filing and routing events.
#[test]
fn filing_routes_merchant_first() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();

    let dispute = engine.file_dispute(new_dispute(true))?;
    assert_eq!(dispute.status, DisputeStatus::MerchantReview);

    let timeline = engine.timeline(&dispute.dispute_id)?;
    let names: Vec<&str> = timeline.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec![events::DISPUTE_FILED, events::MERCHANT_CONTACTED]);
    assert_eq!(timeline[0].actor, Actor::Customer);

    Ok(())
}

#[test]
fn filing_routes_straight_to_review() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();

    let dispute = engine.file_dispute(new_dispute(false))?;
    assert_eq!(dispute.status, DisputeStatus::UnderReview);

    let timeline = engine.timeline(&dispute.dispute_id)?;
    assert_eq!(timeline.last().unwrap().event, events::SENT_TO_REVIEW);

    Ok(())
}

/// Pairs outside the transition table are rejected with InvalidForState
/// and the stored dispute is byte-for-byte unchanged.
#[test]
fn invalid_pairs_rejected_without_mutation() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();
    let before_len = engine.store.timeline_len(&id)?;

    let invalid: Vec<Trigger> = vec![
        Trigger::AdminClose,
        Trigger::Escalate,
        Trigger::InternalDecision(merchant_wins("premature")),
    ];
    for trigger in invalid {
        let name = trigger.name();
        let err = engine.apply_transition(&id, trigger).unwrap_err();
        assert!(
            matches!(err, DisputeError::InvalidForState { .. }),
            "expected InvalidForState for {name}, got {err:?}"
        );
    }

    let after = engine.dispute(&id)?;
    assert_eq!(after.status, DisputeStatus::MerchantReview);
    assert_eq!(after.version, dispute.version);
    assert_eq!(engine.store.timeline_len(&id)?, before_len);

    Ok(())
}

/// Timeout is only valid from merchant review, and only while the
/// merchant is still silent.
#[test]
fn timeout_rejected_after_response() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();

    engine.apply_transition(&id, Trigger::MerchantResponded(merchant_response(false)))?;
    let err = engine
        .apply_transition(&id, Trigger::MerchantTimeout48h)
        .unwrap_err();
    assert!(matches!(err, DisputeError::InvalidForState { .. }));

    Ok(())
}

/// A merchant response moves to under review; a second response replaces
/// the first but the replacement is still recorded on the timeline.
#[test]
fn merchant_response_replacement_recorded() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();

    let after_first =
        engine.apply_transition(&id, Trigger::MerchantResponded(merchant_response(false)))?;
    assert_eq!(after_first.status, DisputeStatus::UnderReview);

    let after_second =
        engine.apply_transition(&id, Trigger::MerchantResponded(merchant_response(true)))?;
    assert_eq!(after_second.status, DisputeStatus::UnderReview);
    assert!(after_second.merchant_response.unwrap().accepts_fault);

    let timeline = engine.timeline(&id)?;
    let names: Vec<&str> = timeline.iter().map(|e| e.event.as_str()).collect();
    assert!(names.contains(&events::MERCHANT_RESPONDED));
    assert!(names.contains(&events::MERCHANT_RESPONSE_REPLACED));

    Ok(())
}

/// Escalation stores the case id handed out by the network client.
#[test]
fn escalation_links_network_case() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    let escalated = engine.apply_transition(&id, Trigger::Escalate)?;
    assert_eq!(escalated.status, DisputeStatus::EscalatedToNetwork);
    assert_eq!(escalated.network_case_id.as_deref(), Some(common::TEST_CASE_ID));

    Ok(())
}

/// Exactly one timeline event per accepted transition.
#[test]
fn one_timeline_event_per_transition() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();
    let mut expected = engine.store.timeline_len(&id)?;

    engine.apply_transition(&id, Trigger::MerchantResponded(merchant_response(false)))?;
    expected += 1;
    assert_eq!(engine.store.timeline_len(&id)?, expected);

    engine.apply_transition(&id, Trigger::Escalate)?;
    expected += 1;
    assert_eq!(engine.store.timeline_len(&id)?, expected);

    Ok(())
}

/// An internal refund above the transaction amount is rejected before
/// anything is written.
#[test]
fn internal_refund_bounded_by_transaction() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    let oversized = Resolution {
        outcome: ResolutionOutcome::CustomerWinsFullRefund,
        reason: "fat-fingered".to_string(),
        refund_amount: Some(900.0),
        compromise_details: None,
        factors: Vec::new(),
        decided_at: Utc::now(),
    };
    let err = engine
        .apply_transition(&id, Trigger::InternalDecision(oversized))
        .unwrap_err();
    assert!(matches!(err, DisputeError::RefundExceedsTransaction { .. }));
    assert_eq!(engine.dispute(&id)?.status, DisputeStatus::UnderReview);

    Ok(())
}

/// RESOLVED → CLOSED via admin close; CLOSED is absorbing and the
/// resolution survives archival untouched.
#[test]
fn admin_close_is_absorbing() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(false))?;
    let id = dispute.dispute_id.clone();

    engine.apply_transition(&id, Trigger::InternalDecision(merchant_wins("no evidence")))?;
    let closed = engine.apply_transition(&id, Trigger::AdminClose)?;
    assert_eq!(closed.status, DisputeStatus::Closed);
    assert_eq!(
        closed.resolution.as_ref().map(|r| r.outcome),
        Some(ResolutionOutcome::MerchantWins)
    );

    let err = engine.apply_transition(&id, Trigger::AdminClose).unwrap_err();
    assert!(matches!(err, DisputeError::InvalidForState { .. }));

    Ok(())
}

/// Every accepted transition fires exactly one best-effort notification.
#[test]
fn notifications_follow_transitions() -> DisputeResult<()> {
    let (engine, _clock, notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();

    engine.apply_transition(&id, Trigger::MerchantResponded(merchant_response(false)))?;
    engine.apply_transition(&id, Trigger::Escalate)?;

    let sent = notifier.events();
    assert_eq!(
        sent,
        vec![
            events::DISPUTE_FILED.to_string(),
            events::MERCHANT_CONTACTED.to_string(),
            "merchant_responded".to_string(),
            events::ESCALATED_TO_NETWORK.to_string(),
        ]
    );

    Ok(())
}
