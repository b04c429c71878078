use super::{ts_from_sql, ts_to_sql, DisputeStore};
use crate::dispute::{Dispute, DisputeStatus};
use crate::error::{DisputeError, DisputeResult};
use crate::types::{DisputeId, Version};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const DISPUTE_COLUMNS: &str = "dispute_id, version, transaction_id, customer_id, merchant_id,
    txn_amount, currency, status, requested_resolution, reason, description,
    evidence_refs, contact_merchant_first, merchant_response, network_case_id,
    network_status, network_resolution, resolution, chat_channel_id,
    created_at, updated_at";

// Raw row with JSON columns still as text; converted outside the rusqlite
// mapper so serde failures surface as DisputeError, not column errors.
struct DisputeRow {
    dispute_id: String,
    version: i64,
    transaction_id: String,
    customer_id: String,
    merchant_id: String,
    txn_amount: f64,
    currency: String,
    status: String,
    requested_resolution: String,
    reason: String,
    description: String,
    evidence_refs: String,
    contact_merchant_first: bool,
    merchant_response: Option<String>,
    network_case_id: Option<String>,
    network_status: Option<String>,
    network_resolution: Option<String>,
    resolution: Option<String>,
    chat_channel_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn dispute_row_mapper(row: &Row<'_>) -> rusqlite::Result<DisputeRow> {
    Ok(DisputeRow {
        dispute_id: row.get(0)?,
        version: row.get(1)?,
        transaction_id: row.get(2)?,
        customer_id: row.get(3)?,
        merchant_id: row.get(4)?,
        txn_amount: row.get(5)?,
        currency: row.get(6)?,
        status: row.get(7)?,
        requested_resolution: row.get(8)?,
        reason: row.get(9)?,
        description: row.get(10)?,
        evidence_refs: row.get(11)?,
        contact_merchant_first: row.get::<_, i32>(12)? != 0,
        merchant_response: row.get(13)?,
        network_case_id: row.get(14)?,
        network_status: row.get(15)?,
        network_resolution: row.get(16)?,
        resolution: row.get(17)?,
        chat_channel_id: row.get(18)?,
        created_at: ts_from_sql(&row.get::<_, String>(19)?)?,
        updated_at: ts_from_sql(&row.get::<_, String>(20)?)?,
    })
}

impl DisputeRow {
    fn into_dispute(self) -> DisputeResult<Dispute> {
        let status = DisputeStatus::parse(&self.status).ok_or_else(|| {
            DisputeError::Other(anyhow::anyhow!(
                "corrupt status '{}' on dispute {}",
                self.status,
                self.dispute_id
            ))
        })?;
        Ok(Dispute {
            dispute_id: self.dispute_id,
            version: self.version,
            transaction_id: self.transaction_id,
            customer_id: self.customer_id,
            merchant_id: self.merchant_id,
            txn_amount: self.txn_amount,
            currency: self.currency,
            status,
            requested_resolution: serde_json::from_str(&self.requested_resolution)?,
            reason: self.reason,
            description: self.description,
            evidence_refs: serde_json::from_str(&self.evidence_refs)?,
            contact_merchant_first: self.contact_merchant_first,
            merchant_response: self
                .merchant_response
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            network_case_id: self.network_case_id,
            network_status: self.network_status,
            network_resolution: self.network_resolution,
            resolution: self
                .resolution
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            chat_channel_id: self.chat_channel_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DisputeStore {
    // ── Dispute aggregate ──────────────────────────────────────────

    pub fn insert_dispute(&self, d: &Dispute) -> DisputeResult<()> {
        self.conn().execute(
            "INSERT INTO dispute (
                dispute_id, version, transaction_id, customer_id, merchant_id,
                txn_amount, currency, status, requested_resolution, reason,
                description, evidence_refs, contact_merchant_first,
                merchant_response, network_case_id, network_status,
                network_resolution, resolution, chat_channel_id,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                &d.dispute_id,
                d.version,
                &d.transaction_id,
                &d.customer_id,
                &d.merchant_id,
                d.txn_amount,
                &d.currency,
                d.status.as_str(),
                serde_json::to_string(&d.requested_resolution)?,
                &d.reason,
                &d.description,
                serde_json::to_string(&d.evidence_refs)?,
                if d.contact_merchant_first { 1i32 } else { 0i32 },
                d.merchant_response
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                d.network_case_id.as_deref(),
                d.network_status.as_deref(),
                d.network_resolution.as_deref(),
                d.resolution.as_ref().map(serde_json::to_string).transpose()?,
                d.chat_channel_id.as_deref(),
                ts_to_sql(d.created_at),
                ts_to_sql(d.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_dispute(&self, dispute_id: &str) -> DisputeResult<Option<Dispute>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {DISPUTE_COLUMNS} FROM dispute WHERE dispute_id = ?1"),
                params![dispute_id],
                dispute_row_mapper,
            )
            .optional()?;
        row.map(DisputeRow::into_dispute).transpose()
    }

    pub fn find_by_transaction_id(&self, transaction_id: &str) -> DisputeResult<Option<Dispute>> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {DISPUTE_COLUMNS} FROM dispute
                     WHERE transaction_id = ?1 ORDER BY created_at ASC LIMIT 1"
                ),
                params![transaction_id],
                dispute_row_mapper,
            )
            .optional()?;
        row.map(DisputeRow::into_dispute).transpose()
    }

    pub fn find_by_network_case_id(&self, case_id: &str) -> DisputeResult<Option<Dispute>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {DISPUTE_COLUMNS} FROM dispute WHERE network_case_id = ?1"),
                params![case_id],
                dispute_row_mapper,
            )
            .optional()?;
        row.map(DisputeRow::into_dispute).transpose()
    }

    /// Compare-and-swap save. The caller passes the version it loaded; a
    /// zero-row update means another writer got there first.
    pub fn save_dispute(&self, d: &Dispute, expected_version: Version) -> DisputeResult<()> {
        let affected = self.conn().execute(
            "UPDATE dispute SET
                version = ?1, status = ?2, requested_resolution = ?3,
                reason = ?4, description = ?5, evidence_refs = ?6,
                merchant_response = ?7, network_case_id = ?8,
                network_status = ?9, network_resolution = ?10,
                resolution = ?11, chat_channel_id = ?12, updated_at = ?13
             WHERE dispute_id = ?14 AND version = ?15",
            params![
                expected_version + 1,
                d.status.as_str(),
                serde_json::to_string(&d.requested_resolution)?,
                &d.reason,
                &d.description,
                serde_json::to_string(&d.evidence_refs)?,
                d.merchant_response
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                d.network_case_id.as_deref(),
                d.network_status.as_deref(),
                d.network_resolution.as_deref(),
                d.resolution.as_ref().map(serde_json::to_string).transpose()?,
                d.chat_channel_id.as_deref(),
                ts_to_sql(d.updated_at),
                &d.dispute_id,
                expected_version,
            ],
        )?;
        if affected == 0 {
            return Err(DisputeError::VersionConflict {
                dispute_id: d.dispute_id.clone(),
            });
        }
        Ok(())
    }

    /// Disputes still waiting on the merchant whose response window opened
    /// at or before `cutoff`. Drives the polled 48h timeout.
    pub fn due_merchant_timeouts(&self, cutoff: DateTime<Utc>) -> DisputeResult<Vec<DisputeId>> {
        let mut stmt = self.conn().prepare(
            "SELECT dispute_id, created_at FROM dispute
             WHERE status = 'merchant_review' AND merchant_response IS NULL
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ts_from_sql(&row.get::<_, String>(1)?)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter(|(_, created_at)| *created_at <= cutoff)
            .map(|(id, _)| id)
            .collect())
    }

    pub fn dispute_count(&self) -> DisputeResult<i64> {
        let count =
            self.conn()
                .query_row("SELECT COUNT(*) FROM dispute", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_by_status(&self, status: DisputeStatus) -> DisputeResult<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM dispute WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
