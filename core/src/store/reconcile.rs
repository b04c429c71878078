use super::{ts_from_sql, ts_to_sql, DisputeStore};
use crate::error::{DisputeError, DisputeResult};
use crate::reconcile::{DeadLetter, ResolutionConflict};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

fn dead_letter_row_mapper(row: &Row<'_>) -> rusqlite::Result<DeadLetter> {
    let payload_raw: String = row.get(5)?;
    let payload = serde_json::from_str(&payload_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DeadLetter {
        event_key: row.get(0)?,
        network_case_id: row.get(1)?,
        network_payment_id: row.get(2)?,
        kind: row.get(3)?,
        reason: row.get(4)?,
        payload,
        external_timestamp: ts_from_sql(&row.get::<_, String>(6)?)?,
        received_at: ts_from_sql(&row.get::<_, String>(7)?)?,
    })
}

fn conflict_row_mapper(row: &Row<'_>) -> rusqlite::Result<ResolutionConflict> {
    Ok(ResolutionConflict {
        id: Some(row.get(0)?),
        dispute_id: row.get(1)?,
        network_case_id: row.get(2)?,
        internal_outcome: row.get(3)?,
        network_resolution: row.get(4)?,
        network_refund_amount: row.get(5)?,
        detected_at: ts_from_sql(&row.get::<_, String>(6)?)?,
    })
}

impl DisputeStore {
    // ── Idempotency keys ───────────────────────────────────────────

    pub fn is_event_processed(&self, event_key: &str) -> DisputeResult<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM processed_network_event WHERE event_key = ?1",
            params![event_key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mark_event_processed(
        &self,
        event_key: &str,
        processed_at: DateTime<Utc>,
    ) -> DisputeResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO processed_network_event (event_key, processed_at)
             VALUES (?1, ?2)",
            params![event_key, ts_to_sql(processed_at)],
        )?;
        Ok(())
    }

    // ── Dead letters ───────────────────────────────────────────────

    /// Keyed on the event's idempotency key: redelivery of an unmatched
    /// event cannot duplicate the record.
    pub fn insert_dead_letter(&self, dl: &DeadLetter) -> DisputeResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO network_dead_letter (
                event_key, network_case_id, network_payment_id, kind,
                reason, payload, external_timestamp, received_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &dl.event_key,
                dl.network_case_id.as_deref(),
                dl.network_payment_id.as_deref(),
                &dl.kind,
                &dl.reason,
                serde_json::to_string(&dl.payload)?,
                ts_to_sql(dl.external_timestamp),
                ts_to_sql(dl.received_at),
            ],
        )?;
        Ok(())
    }

    pub fn dead_letters(&self) -> DisputeResult<Vec<DeadLetter>> {
        let mut stmt = self.conn().prepare(
            "SELECT event_key, network_case_id, network_payment_id, kind,
                    reason, payload, external_timestamp, received_at
             FROM network_dead_letter ORDER BY received_at ASC",
        )?;
        let rows = stmt.query_map([], dead_letter_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DisputeError::from)
    }

    // ── Resolution conflicts ───────────────────────────────────────

    pub fn insert_resolution_conflict(&self, c: &ResolutionConflict) -> DisputeResult<()> {
        self.conn().execute(
            "INSERT INTO resolution_conflict (
                dispute_id, network_case_id, internal_outcome,
                network_resolution, network_refund_amount, detected_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &c.dispute_id,
                &c.network_case_id,
                &c.internal_outcome,
                &c.network_resolution,
                c.network_refund_amount,
                ts_to_sql(c.detected_at),
            ],
        )?;
        Ok(())
    }

    pub fn resolution_conflicts(&self) -> DisputeResult<Vec<ResolutionConflict>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, dispute_id, network_case_id, internal_outcome,
                    network_resolution, network_refund_amount, detected_at
             FROM resolution_conflict ORDER BY detected_at ASC",
        )?;
        let rows = stmt.query_map([], conflict_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DisputeError::from)
    }
}
