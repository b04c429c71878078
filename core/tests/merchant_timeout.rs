//! The polled 48-hour merchant-response deadline: `due_transitions`
//! drives a caller-side scheduler, the engine only evaluates the query
//! and applies the timeout trigger.

mod common;

use chrono::Duration;
use common::{build_engine, new_dispute, start};
use dispute_core::dispute::{DisputeStatus, MerchantResponse};
use dispute_core::error::DisputeResult;
use dispute_core::state_machine::Trigger;
use dispute_core::timeline::events;

/// Dispute filed, merchant silent 49 hours: the dispute shows up in
/// due_transitions, the fired timeout moves it to under review and the
/// timeline records the no-response note.
#[test]
fn silent_merchant_times_out_after_48h() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();

    // Not yet due within the window.
    let due = engine.due_transitions(start() + Duration::hours(47))?;
    assert!(due.is_empty());

    let due = engine.due_transitions(start() + Duration::hours(49))?;
    assert_eq!(due, vec![id.clone()]);

    let after = engine.apply_transition(&id, Trigger::MerchantTimeout48h)?;
    assert_eq!(after.status, DisputeStatus::UnderReview);

    let timeline = engine.timeline(&id)?;
    let note = timeline
        .iter()
        .find(|e| e.event == events::NO_RESPONSE)
        .expect("no-response event");
    assert_eq!(note.details["note"], "no-response");

    Ok(())
}

/// A merchant that answered in time never becomes due.
#[test]
fn responded_dispute_is_never_due() -> DisputeResult<()> {
    let (engine, clock, _notifier) = build_engine();
    let dispute = engine.file_dispute(new_dispute(true))?;
    let id = dispute.dispute_id.clone();

    clock.advance(Duration::hours(1));
    engine.apply_transition(
        &id,
        Trigger::MerchantResponded(MerchantResponse {
            message: "Refund on the way".to_string(),
            accepts_fault: true,
            evidence: Vec::new(),
            resolution_offer: Some("full refund".to_string()),
            received_at: start() + Duration::hours(1),
        }),
    )?;

    let due = engine.due_transitions(start() + Duration::hours(72))?;
    assert!(due.is_empty());

    Ok(())
}

/// Disputes routed straight to review have no merchant window at all.
#[test]
fn direct_review_disputes_not_tracked() -> DisputeResult<()> {
    let (engine, _clock, _notifier) = build_engine();
    engine.file_dispute(new_dispute(false))?;

    let due = engine.due_transitions(start() + Duration::hours(100))?;
    assert!(due.is_empty());

    Ok(())
}
