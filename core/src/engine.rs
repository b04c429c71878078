//! The dispute engine — operation surface over the state machine,
//! reconciliation, fraud scoring, and the timeline ledger.
//!
//! RULES:
//!   - All mutation of one dispute goes through a load → apply → CAS-save
//!     cycle; a concurrent writer surfaces as VersionConflict and the
//!     operation retries from a fresh load (bounded).
//!   - Every accepted transition appends exactly one timeline event and
//!     fires one best-effort notification.
//!   - Collaborators (clock, notifier, network client) are injected at
//!     construction. No ambient globals.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::dispute::{Dispute, DisputeStatus, NewDispute};
use crate::error::{DisputeError, DisputeResult};
use crate::fraud::{self, RiskFactor};
use crate::network::{CaseSummary, NetworkClient, OfflineNetworkClient};
use crate::notifier::{LogNotifier, Notifier};
use crate::reconcile::{DeadLetter, NetworkEvent, NetworkEventKind, ResolutionConflict};
use crate::resolution::{self, ResolutionDecision};
use crate::state_machine::{self, NetworkTrigger, Trigger};
use crate::store::DisputeStore;
use crate::timeline::{events, Actor, TimelineEvent};
use crate::types::DisputeId;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Reloads after a lost optimistic-lock race before giving up.
const SAVE_RETRIES: usize = 3;

/// Outcome of `resolve_internally`: either the decision was stored, or a
/// human has to confirm the proposed compromise first.
#[derive(Debug)]
pub enum ResolveAttempt {
    Applied(Dispute),
    NeedsConfirmation(ResolutionDecision),
}

pub struct DisputeEngine {
    pub store: DisputeStore,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    notifier: Box<dyn Notifier>,
    network: Box<dyn NetworkClient>,
}

impl DisputeEngine {
    pub fn new(
        store: DisputeStore,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notifier: Box<dyn Notifier>,
        network: Box<dyn NetworkClient>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            notifier,
            network,
        }
    }

    /// Fully wired engine with default collaborators: system clock, log
    /// notifier, offline network client.
    pub fn build(store: DisputeStore, config: EngineConfig) -> Self {
        Self::new(
            store,
            config,
            Arc::new(SystemClock),
            Box::new(LogNotifier),
            Box::new(OfflineNetworkClient),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Filing ─────────────────────────────────────────────────────

    /// Create a dispute from a customer submission and route it: to the
    /// merchant first when the customer opted in, straight to internal
    /// review otherwise.
    pub fn file_dispute(&self, new: NewDispute) -> DisputeResult<Dispute> {
        let now = self.clock.now();
        let dispute_id = format!("disp-{}", Uuid::new_v4());

        let mut dispute = Dispute {
            dispute_id: dispute_id.clone(),
            version: 1,
            transaction_id: new.transaction_id,
            customer_id: new.customer_id,
            merchant_id: new.merchant_id,
            txn_amount: new.txn_amount,
            currency: new.currency,
            status: DisputeStatus::Submitted,
            requested_resolution: new.requested_resolution,
            reason: new.reason,
            description: new.description,
            evidence_refs: new.evidence_refs,
            contact_merchant_first: new.contact_merchant_first,
            merchant_response: None,
            network_case_id: None,
            network_status: None,
            network_resolution: None,
            resolution: None,
            chat_channel_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_dispute(&dispute)?;
        self.store.append_timeline_event(&TimelineEvent::new(
            &dispute_id,
            events::DISPUTE_FILED,
            now,
            Actor::Customer,
            json!({
                "reason": dispute.reason.clone(),
                "evidence_count": dispute.evidence_refs.len(),
                "contact_merchant_first": dispute.contact_merchant_first,
            }),
        ))?;

        // Routing is itself a transition and gets its own timeline event.
        let routing = if dispute.contact_merchant_first {
            dispute.status = DisputeStatus::MerchantReview;
            TimelineEvent::new(
                &dispute_id,
                events::MERCHANT_CONTACTED,
                now,
                Actor::System,
                json!({ "response_window_hours": self.config.merchant_response_window_hours }),
            )
        } else {
            dispute.status = DisputeStatus::UnderReview;
            TimelineEvent::new(&dispute_id, events::SENT_TO_REVIEW, now, Actor::System, json!({}))
        };
        self.store.save_dispute(&dispute, 1)?;
        dispute.version = 2;
        self.store.append_timeline_event(&routing)?;
        self.notify(&dispute_id, events::DISPUTE_FILED);
        self.notify(&dispute_id, &routing.event);
        Ok(dispute)
    }

    // ── Transitions ────────────────────────────────────────────────

    /// Apply one trigger. Rejected triggers leave the stored dispute
    /// untouched and surface as InvalidForState.
    pub fn apply_transition(&self, dispute_id: &str, trigger: Trigger) -> DisputeResult<Dispute> {
        if matches!(trigger, Trigger::Escalate) {
            return self.escalate(dispute_id);
        }
        let name = trigger.name();
        let dispute = self.mutate(dispute_id, |d| {
            let event = state_machine::apply(d, trigger.clone(), self.clock.now())?;
            Ok(vec![event])
        })?;
        self.notify(dispute_id, name);
        Ok(dispute)
    }

    /// Escalate to the Network: opens the external case first, then moves
    /// the dispute. The later CREATED webhook is an idempotent ack.
    fn escalate(&self, dispute_id: &str) -> DisputeResult<Dispute> {
        let dispute = self.dispute(dispute_id)?;
        if !matches!(
            dispute.status,
            DisputeStatus::UnderReview | DisputeStatus::InternalReview
        ) {
            return Err(DisputeError::InvalidForState {
                status: dispute.status.as_str().to_string(),
                trigger: Trigger::Escalate.name().to_string(),
            });
        }

        let case_id = match &dispute.network_case_id {
            Some(existing) => existing.clone(),
            None => self.network.create_case(&CaseSummary {
                dispute_id: dispute.dispute_id.clone(),
                transaction_id: dispute.transaction_id.clone(),
                amount: dispute.txn_amount,
                currency: dispute.currency.clone(),
                reason: dispute.reason.clone(),
            })?,
        };

        let updated = self.mutate(dispute_id, |d| {
            let event = state_machine::apply(d, Trigger::Escalate, self.clock.now())?;
            if d.network_case_id.is_none() {
                d.network_case_id = Some(case_id.clone());
            }
            Ok(vec![event])
        })?;
        self.notify(dispute_id, events::ESCALATED_TO_NETWORK);
        Ok(updated)
    }

    /// Attach evidence URIs. Not a status transition, but it is recorded
    /// on the timeline and rejected once the dispute is terminal.
    pub fn add_evidence(
        &self,
        dispute_id: &str,
        actor: Actor,
        refs: Vec<String>,
    ) -> DisputeResult<Dispute> {
        let dispute = self.mutate(dispute_id, |d| {
            if d.status.is_terminal() {
                return Err(DisputeError::InvalidForState {
                    status: d.status.as_str().to_string(),
                    trigger: "add_evidence".to_string(),
                });
            }
            let now = self.clock.now();
            d.evidence_refs.extend(refs.iter().cloned());
            d.updated_at = now;
            Ok(vec![TimelineEvent::new(
                &d.dispute_id,
                events::EVIDENCE_ADDED,
                now,
                actor,
                json!({ "refs": refs.clone(), "total": d.evidence_refs.len() }),
            )])
        })?;
        self.notify(dispute_id, events::EVIDENCE_ADDED);
        Ok(dispute)
    }

    /// Disputes whose merchant-response window has lapsed by `now`. The
    /// caller's scheduler fires MERCHANT_TIMEOUT_48H for each.
    pub fn due_transitions(&self, now: DateTime<Utc>) -> DisputeResult<Vec<DisputeId>> {
        let cutoff = now - Duration::hours(self.config.merchant_response_window_hours);
        self.store.due_merchant_timeouts(cutoff)
    }

    // ── Internal resolution ────────────────────────────────────────

    /// Run the fraud aggregator and decision table over the stored
    /// dispute. Pure computation, nothing is written.
    pub fn propose_resolution(
        &self,
        dispute_id: &str,
        factors: &[RiskFactor],
    ) -> DisputeResult<ResolutionDecision> {
        let dispute = self.dispute(dispute_id)?;
        if !matches!(
            dispute.status,
            DisputeStatus::UnderReview | DisputeStatus::InternalReview
        ) {
            return Err(DisputeError::InvalidForState {
                status: dispute.status.as_str().to_string(),
                trigger: "internal_decision".to_string(),
            });
        }
        let assessment = fraud::score(factors, &self.config.fraud);
        Ok(resolution::decide(
            &dispute,
            &assessment,
            &self.config.resolution,
            self.clock.now(),
        ))
    }

    /// Compute and, when no human confirmation is needed, store the
    /// internal resolution. A proposed compromise is recorded on the
    /// timeline and left for a reviewer to confirm via
    /// `apply_transition(.., InternalDecision(..))`.
    pub fn resolve_internally(
        &self,
        dispute_id: &str,
        factors: &[RiskFactor],
    ) -> DisputeResult<ResolveAttempt> {
        let decision = self.propose_resolution(dispute_id, factors)?;
        if decision.requires_confirmation {
            self.store.append_timeline_event(&TimelineEvent::new(
                dispute_id,
                events::RESOLUTION_PROPOSED,
                self.clock.now(),
                Actor::System,
                json!({
                    "outcome": decision.resolution.outcome.as_str(),
                    "refund_amount": decision.resolution.refund_amount,
                    "reason": decision.resolution.reason.clone(),
                }),
            ))?;
            self.notify(dispute_id, events::RESOLUTION_PROPOSED);
            return Ok(ResolveAttempt::NeedsConfirmation(decision));
        }
        let dispute =
            self.apply_transition(dispute_id, Trigger::InternalDecision(decision.resolution))?;
        Ok(ResolveAttempt::Applied(dispute))
    }

    // ── Reconciliation ─────────────────────────────────────────────

    /// Apply one inbound Network notification. Safe under at-least-once
    /// delivery: a previously-seen event key is a successful no-op.
    pub fn reconcile(&self, event: NetworkEvent) -> DisputeResult<()> {
        let key = event.idempotency_key();
        if self.store.is_event_processed(&key)? {
            log::debug!("duplicate network event {key}, skipping");
            return Ok(());
        }
        let now = self.clock.now();

        let reference = match event.reference() {
            Some(r) => r.to_string(),
            None => {
                self.dead_letter(&event, &key, "missing case/payment reference", now)?;
                self.store.mark_event_processed(&key, now)?;
                return Err(DisputeError::MalformedNetworkEvent {
                    reason: "missing case/payment reference".to_string(),
                });
            }
        };

        // CREATED is matched by originating payment id; everything else
        // by the Network case id.
        let dispute = match event.kind {
            NetworkEventKind::Created => self.store.find_by_transaction_id(&reference)?,
            _ => self.store.find_by_network_case_id(&reference)?,
        };
        let Some(dispute) = dispute else {
            // The creating event may simply not have arrived yet: retain
            // for manual matching, leave unprocessed so a retry after the
            // dispute appears succeeds.
            self.dead_letter(&event, &key, "no matching dispute", now)?;
            return Err(DisputeError::UnknownDispute { reference });
        };

        if dispute.status.is_terminal() {
            return self.reconcile_terminal(&dispute, &event, &key, now);
        }

        let trigger = match self.translate(&event, &dispute, now) {
            Ok(t) => t,
            Err(e) => {
                // Fail closed: unknown vocabulary is recorded, never guessed,
                // and never mutates state. Marked processed so redelivery of
                // the same bad event is a clean no-op.
                self.dead_letter(&event, &key, &e.to_string(), now)?;
                self.store.mark_event_processed(&key, now)?;
                return Err(e);
            }
        };

        let name = trigger.name();
        match self.mutate(&dispute.dispute_id, |d| {
            let ev = state_machine::apply(d, trigger.clone(), now)?;
            Ok(vec![ev])
        }) {
            Ok(_) => {
                self.store.mark_event_processed(&key, now)?;
                self.notify(&dispute.dispute_id, name);
                Ok(())
            }
            Err(DisputeError::InvalidForState { status, .. }) => {
                // Stale or out-of-order delivery: informational record
                // only, still a success for the sender.
                log::info!(
                    "stale network event {key} for dispute {} in status {status}; recorded only",
                    dispute.dispute_id
                );
                self.store.append_timeline_event(&TimelineEvent::new(
                    &dispute.dispute_id,
                    name,
                    now,
                    Actor::Network,
                    json!({ "stale": true, "payload": serde_json::to_value(&event)? }),
                ))?;
                self.store.mark_event_processed(&key, now)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Translate the Network's vocabulary into a state-machine trigger.
    fn translate(
        &self,
        event: &NetworkEvent,
        dispute: &Dispute,
        now: DateTime<Utc>,
    ) -> DisputeResult<Trigger> {
        use crate::reconcile::{is_known_status, ruling_to_resolution};

        if let Some(status) = &event.status {
            if !is_known_status(status) {
                return Err(DisputeError::UnmappedNetworkStatus {
                    status: status.clone(),
                });
            }
        }

        let trigger = match event.kind {
            NetworkEventKind::Created => {
                let case_id = event.network_case_id.clone().ok_or_else(|| {
                    DisputeError::MalformedNetworkEvent {
                        reason: "created event without networkCaseId".to_string(),
                    }
                })?;
                Trigger::Network(NetworkTrigger::CaseOpened {
                    case_id,
                    raw_status: event.status.clone(),
                })
            }
            NetworkEventKind::Updated => {
                let raw_status = event.status.clone().ok_or_else(|| {
                    DisputeError::MalformedNetworkEvent {
                        reason: "updated event without status".to_string(),
                    }
                })?;
                Trigger::Network(NetworkTrigger::StatusChanged { raw_status })
            }
            NetworkEventKind::EvidenceRequested => {
                Trigger::Network(NetworkTrigger::EvidenceRequested)
            }
            NetworkEventKind::Resolved => {
                let raw = event.resolution.clone().ok_or_else(|| {
                    DisputeError::MalformedNetworkEvent {
                        reason: "resolved event without resolution".to_string(),
                    }
                })?;
                let resolution = ruling_to_resolution(&raw, event.refund_amount, dispute, now)?;
                Trigger::Network(NetworkTrigger::Ruled {
                    resolution,
                    raw_resolution: raw,
                })
            }
            NetworkEventKind::Message => Trigger::Network(NetworkTrigger::Message {
                body: event.message.clone().unwrap_or_default(),
            }),
        };
        Ok(trigger)
    }

    /// Terminal disputes accept Network events as informational records
    /// only. A late ruling that disagrees with the stored resolution
    /// raises a queryable conflict for human adjudication.
    fn reconcile_terminal(
        &self,
        dispute: &Dispute,
        event: &NetworkEvent,
        key: &str,
        now: DateTime<Utc>,
    ) -> DisputeResult<()> {
        use crate::reconcile::ruling_to_resolution;

        if event.kind == NetworkEventKind::Resolved {
            let raw = event.resolution.clone().unwrap_or_else(|| "unknown".to_string());
            let internal = dispute
                .resolution
                .as_ref()
                .map(|r| r.outcome.as_str().to_string())
                .unwrap_or_else(|| "none".to_string());

            // Agreement needs no adjudication; only a diverging late
            // ruling is flagged.
            let network_outcome = ruling_to_resolution(&raw, event.refund_amount, dispute, now)
                .ok()
                .map(|r| r.outcome.as_str().to_string());
            let diverges = network_outcome.as_deref() != Some(internal.as_str());

            self.store.append_timeline_event(&TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_RESOLUTION_CONFLICT,
                now,
                Actor::Network,
                json!({
                    "network_resolution": raw,
                    "network_refund_amount": event.refund_amount,
                    "internal_outcome": internal,
                    "diverges": diverges,
                }),
            ))?;
            if diverges {
                self.store.insert_resolution_conflict(&ResolutionConflict {
                    id: None,
                    dispute_id: dispute.dispute_id.clone(),
                    network_case_id: dispute
                        .network_case_id
                        .clone()
                        .or_else(|| event.network_case_id.clone())
                        .unwrap_or_default(),
                    internal_outcome: internal,
                    network_resolution: raw,
                    network_refund_amount: event.refund_amount,
                    detected_at: now,
                })?;
            }
        } else {
            self.store.append_timeline_event(&TimelineEvent::new(
                &dispute.dispute_id,
                events::NETWORK_EVENT_AFTER_CLOSE,
                now,
                Actor::Network,
                json!({ "kind": event.kind.as_str(), "payload": serde_json::to_value(event)? }),
            ))?;
        }
        self.store.mark_event_processed(key, now)?;
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn dispute(&self, dispute_id: &str) -> DisputeResult<Dispute> {
        self.store
            .get_dispute(dispute_id)?
            .ok_or_else(|| DisputeError::DisputeNotFound {
                dispute_id: dispute_id.to_string(),
            })
    }

    pub fn timeline(&self, dispute_id: &str) -> DisputeResult<Vec<TimelineEvent>> {
        self.store.timeline_for(dispute_id)
    }

    pub fn resolution_conflicts(&self) -> DisputeResult<Vec<ResolutionConflict>> {
        self.store.resolution_conflicts()
    }

    pub fn dead_letters(&self) -> DisputeResult<Vec<DeadLetter>> {
        self.store.dead_letters()
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Load → apply → CAS-save with bounded retry. The closure may run
    /// more than once and must be side-effect free on the engine.
    fn mutate<F>(&self, dispute_id: &str, mut f: F) -> DisputeResult<Dispute>
    where
        F: FnMut(&mut Dispute) -> DisputeResult<Vec<TimelineEvent>>,
    {
        let mut attempts = 0;
        loop {
            let mut dispute = self.dispute(dispute_id)?;
            let expected = dispute.version;
            let timeline = f(&mut dispute)?;
            match self.store.save_dispute(&dispute, expected) {
                Ok(()) => {
                    dispute.version = expected + 1;
                    for event in &timeline {
                        self.store.append_timeline_event(event)?;
                    }
                    return Ok(dispute);
                }
                Err(DisputeError::VersionConflict { .. }) if attempts < SAVE_RETRIES => {
                    attempts += 1;
                    log::debug!("version conflict on {dispute_id}, retry {attempts}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn dead_letter(
        &self,
        event: &NetworkEvent,
        key: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DisputeResult<()> {
        log::warn!("dead-lettering network event {key}: {reason}");
        self.store.insert_dead_letter(&DeadLetter {
            event_key: key.to_string(),
            network_case_id: event.network_case_id.clone(),
            network_payment_id: event.network_payment_id.clone(),
            kind: event.kind.as_str().to_string(),
            reason: reason.to_string(),
            payload: serde_json::to_value(event)?,
            external_timestamp: event.external_timestamp,
            received_at: now,
        })
    }

    /// Best-effort: a failed notification never rolls back a transition.
    fn notify(&self, dispute_id: &str, event: &str) {
        if let Err(e) = self.notifier.notify(&dispute_id.to_string(), event) {
            log::warn!("notify failed for dispute {dispute_id} event {event}: {e}");
        }
    }
}
