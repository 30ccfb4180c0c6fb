//! Error taxonomy of the reconciliation engine.
//!
//! [`RowError`] messages are user-facing: they are what lands in the error
//! ledger. Underlying storage causes are logged where they occur and never
//! stored.

/// A row-fatal failure. Aborts one record; never the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("unknown reservation notice type: {0}")]
    UnknownNoticeType(String),

    #[error("required fields are missing: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("check-in date is invalid or missing")]
    CheckInDateInvalid,

    #[error("check-out date is invalid or missing")]
    CheckOutDateInvalid,

    #[error("reservation received date is invalid or missing")]
    ReservationDateInvalid,

    #[error("reservation channel is invalid or missing")]
    ChannelInvalid,

    #[error("failed to look up the guest")]
    GuestLookupFailed,

    #[error("failed to register the guest")]
    GuestInsertFailed,

    #[error("failed to update the guest")]
    GuestUpdateFailed,

    #[error("failed to register the reservation")]
    ReservationInsertFailed,

    #[error("no registered reservation matches this cancellation")]
    NoMatchingReservation,

    #[error("multiple registered reservations match this cancellation")]
    AmbiguousReservation,

    #[error("could not identify the reservation to cancel")]
    LookupFailed,

    #[error("failed to cancel the reservation")]
    CancelFailed,

    #[error("storage transaction failed at {0}")]
    Transaction(&'static str),
}

impl RowError {
    /// Coarse class used in logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            RowError::UnknownNoticeType(_) | RowError::Validation(_) => "validation",
            RowError::CheckInDateInvalid
            | RowError::CheckOutDateInvalid
            | RowError::ReservationDateInvalid => "format",
            RowError::ChannelInvalid => "reference",
            RowError::NoMatchingReservation
            | RowError::AmbiguousReservation
            | RowError::LookupFailed => "matching",
            RowError::GuestLookupFailed
            | RowError::GuestInsertFailed
            | RowError::GuestUpdateFailed
            | RowError::ReservationInsertFailed
            | RowError::CancelFailed
            | RowError::Transaction(_) => "storage",
        }
    }
}

/// Upload-lifecycle failure, surfaced to whoever drives the batch.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("csv upload {0} is already complete")]
    AlreadyComplete(i64),

    #[error("csv upload {0} already ended in ERROR")]
    AlreadyFailed(i64),

    #[error("csv upload {0} does not exist")]
    NotFound(i64),

    #[error("csv upload bookkeeping failed: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("sales channel name is empty")]
    MissingChannel,

    #[error("reference data lookup failed: {0:#}")]
    Storage(anyhow::Error),
}
