//! rsv-reconcile
//!
//! Reservation reconciliation engine: applies parsed site-controller rows to
//! the guest/reservation store, tracks each upload's lifecycle, records
//! per-row failures, and discovers new export files.
//!
//! Storage is behind [`ReservationStore`]; nothing here knows about SQL.

mod batch;
mod error;
mod guest;
mod ledger;
mod pipeline;
mod poller;
mod processor;
mod reference;
mod store;
mod tracker;
mod validation;
mod watermark;

pub mod postal;

pub use batch::{BatchReconciler, BatchReport, RowFailure};
pub use error::{LifecycleError, ReferenceError, RowError};
pub use guest::{GuestResolver, DEFAULT_GENDER};
pub use ledger::ErrorLedger;
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use poller::{list_new_files, FileBatch, FilePoller};
pub use processor::{InBatchIndex, RowOutcome, RowProcessor};
pub use reference::{ReferenceResolver, UNSPECIFIED_PAYMENT_METHOD};
pub use store::{CancelCriteria, GuestMatchKey, ReservationStore, StoreTx};
pub use tracker::UploadTracker;
pub use validation::{missing_for_cancel, missing_for_new, parse_date, parse_stay_from};
pub use watermark::{FileFreshness, FileWatermark};
