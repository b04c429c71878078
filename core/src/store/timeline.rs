use super::{ts_from_sql, ts_to_sql, DisputeStore};
use crate::error::{DisputeError, DisputeResult};
use crate::timeline::{Actor, TimelineEvent};
use rusqlite::{params, Row};

fn timeline_row_mapper(row: &Row<'_>) -> rusqlite::Result<TimelineEvent> {
    let actor_raw: String = row.get(4)?;
    let actor = Actor::parse(&actor_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown actor '{actor_raw}'").into(),
        )
    })?;
    let details_raw: String = row.get(5)?;
    let details = serde_json::from_str(&details_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(TimelineEvent {
        seq: Some(row.get(0)?),
        dispute_id: row.get(1)?,
        event: row.get(2)?,
        timestamp: ts_from_sql(&row.get::<_, String>(3)?)?,
        actor,
        details,
    })
}

impl DisputeStore {
    // ── Timeline ledger ────────────────────────────────────────────

    /// Append one immutable fact. Returns the assigned sequence number.
    pub fn append_timeline_event(&self, event: &TimelineEvent) -> DisputeResult<i64> {
        self.conn().execute(
            "INSERT INTO timeline_event (dispute_id, event, timestamp, actor, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &event.dispute_id,
                &event.event,
                ts_to_sql(event.timestamp),
                event.actor.as_str(),
                serde_json::to_string(&event.details)?,
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Full history for one dispute, in (timestamp, seq) order.
    pub fn timeline_for(&self, dispute_id: &str) -> DisputeResult<Vec<TimelineEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT seq, dispute_id, event, timestamp, actor, details
             FROM timeline_event WHERE dispute_id = ?1
             ORDER BY timestamp ASC, seq ASC",
        )?;
        let rows = stmt.query_map(params![dispute_id], timeline_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DisputeError::from)
    }

    pub fn timeline_len(&self, dispute_id: &str) -> DisputeResult<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM timeline_event WHERE dispute_id = ?1",
            params![dispute_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
