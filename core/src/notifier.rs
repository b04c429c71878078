//! Outbound notification seam.
//!
//! RULE: The engine takes a Notifier at construction — no ambient mutable
//! globals. Notification is best-effort: a failure is logged and never
//! rolls back the state transition that triggered it.

use crate::types::DisputeId;

/// The contract the notification renderer fulfills. Rendering (email,
/// push) is out of scope; the engine only reports that a transition
/// happened.
pub trait Notifier: Send + Sync {
    fn notify(&self, dispute_id: &DisputeId, event: &str) -> anyhow::Result<()>;
}

/// Default notifier: writes the notification to the log. Used by the
/// runner when no real renderer is wired in.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, dispute_id: &DisputeId, event: &str) -> anyhow::Result<()> {
        log::info!("notify: dispute {dispute_id} event {event}");
        Ok(())
    }
}
