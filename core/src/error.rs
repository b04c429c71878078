use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisputeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dispute '{dispute_id}' not found")]
    DisputeNotFound { dispute_id: String },

    #[error("Trigger '{trigger}' is not valid while status is '{status}'")]
    InvalidForState { status: String, trigger: String },

    #[error("Version conflict saving dispute '{dispute_id}': reload and retry")]
    VersionConflict { dispute_id: String },

    #[error("Inbound event matches no dispute (reference '{reference}'); dead-lettered")]
    UnknownDispute { reference: String },

    #[error("Unmapped Network status '{status}'; recorded and ignored")]
    UnmappedNetworkStatus { status: String },

    #[error("Malformed Network event: {reason}")]
    MalformedNetworkEvent { reason: String },

    #[error("Refund {refund:.2} exceeds transaction amount {txn_amount:.2}")]
    RefundExceedsTransaction { refund: f64, txn_amount: f64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DisputeResult<T> = Result<T, DisputeError>;
