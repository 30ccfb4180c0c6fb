//! Plain data shared by every rsv crate.
//!
//! No IO and no behavior beyond string conversions for persisted enums.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Parsed CSV rows
// ---------------------------------------------------------------------------

/// Kind of notice carried by one export row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    New,
    Cancel,
    /// Anything the parser could not classify. The raw text is kept for the
    /// error ledger.
    Other(String),
}

impl NoticeKind {
    /// Classify the raw notice column. Both the English and the Japanese
    /// site-controller spellings are accepted.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "new" | "予約" => NoticeKind::New,
            "cancel" | "取消" => NoticeKind::Cancel,
            other => NoticeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NoticeKind::New => "new",
            NoticeKind::Cancel => "cancel",
            NoticeKind::Other(s) => s.as_str(),
        }
    }
}

/// One CSV row's semantic fields, as yielded by a site-controller parser.
///
/// Date columns stay as the raw export text; the row processor owns date
/// parsing so a malformed date is a row failure, not a file failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub notice: NoticeKind,

    /// Person who placed the booking.
    pub holder: String,
    pub holder_kana: String,
    pub holder_phone: String,

    /// Group / representative guest. This is the guest identity.
    pub name: String,
    pub name_kana: String,
    pub phone: String,
    pub email: String,
    pub postal_code: String,
    pub address: String,

    /// `YYYYMMDD`
    pub stay_from: String,
    /// `HH:MM`, may be empty.
    pub check_in_time: String,
    /// `YYYYMMDD`
    pub stay_to: String,
    pub stay_days: i16,
    pub rooms: i16,
    /// Declared total guest count.
    pub guests: i16,
    pub guests_male: i16,
    pub guests_female: i16,
    pub child_a: i16,
    pub child_b: i16,
    pub child_c: i16,
    pub child_d: i16,

    pub product_code: String,
    pub product_name: String,
    pub payment_method: String,
    pub sales_channel: String,
    /// `YYYYMMDD`
    pub reserved_on: String,
}

impl ReservationRecord {
    /// Male + female guests; this is what gets stored as the reservation's
    /// guest count.
    pub fn computed_guest_count(&self) -> i16 {
        self.guests_male.saturating_add(self.guests_female)
    }

    pub fn has_child(&self) -> bool {
        let children = i32::from(self.child_a)
            + i32::from(self.child_b)
            + i32::from(self.child_c)
            + i32::from(self.child_d);
        children > 0
    }
}

// ---------------------------------------------------------------------------
// Guests / reservations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub guest_id: i64,
    pub name: String,
    pub name_kana: String,
    pub gender: i16,
    pub email: String,
    pub phone: String,
    pub postal_code: String,
    pub address: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Guest row to insert on first sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGuest {
    pub name: String,
    pub name_kana: String,
    pub gender: i16,
    pub email: String,
    pub phone: String,
    /// Already normalized to `NNN-NNNN`.
    pub postal_code: String,
    pub address: String,
    pub now_utc: DateTime<Utc>,
}

/// Contact fields overwritten on a repeat sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestContact {
    pub email: String,
    pub phone: String,
    pub postal_code: String,
    pub address: String,
    pub now_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponState {
    None,
    Issued,
    Declined,
}

impl CouponState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponState::None => "none",
            CouponState::Issued => "issued",
            CouponState::Declined => "declined",
        }
    }
}

/// Reservation row to insert for a `new` notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub guest_id: i64,
    pub holder: String,
    pub holder_kana: String,
    pub stay_from: NaiveDateTime,
    pub stay_to: NaiveDate,
    pub stay_days: i16,
    pub rooms: i16,
    pub guests: i16,
    pub guests_male: i16,
    pub guests_female: i16,
    pub has_child: bool,
    pub plan_id: Option<i64>,
    pub plan_name: String,
    pub channel_id: i64,
    pub payment_method_id: Option<i64>,
    pub coupon: CouponState,
    pub payment_status: PaymentStatus,
    pub existing_guest: bool,
    pub reserved_on: NaiveDate,
    pub now_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: i64,
    pub guest_id: i64,
    pub holder: String,
    pub holder_kana: String,
    pub stay_from: NaiveDateTime,
    pub stay_to: NaiveDate,
    pub stay_days: i16,
    pub rooms: i16,
    pub guests: i16,
    pub has_child: bool,
    pub plan_id: Option<i64>,
    pub channel_id: i64,
    pub payment_method_id: Option<i64>,
    pub payment_status: PaymentStatus,
    pub existing_guest: bool,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Upload transactions
// ---------------------------------------------------------------------------

/// Lifecycle of one CSV upload. `Complete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "before")]
    Before,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "ERROR")]
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Before => "before",
            UploadStatus::Complete => "complete",
            UploadStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "before" => Some(UploadStatus::Before),
            "complete" => Some(UploadStatus::Complete),
            "ERROR" => Some(UploadStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Before)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUpload {
    pub file_name: String,
    /// File modification time for polled files; `None` for API submissions.
    pub created_time: Option<DateTime<Utc>>,
    /// Correlation token supplied by the submitter (`YYYYMMDDhhmmss`), empty
    /// for polled files.
    pub token: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTransaction {
    pub id: i64,
    pub file_name: String,
    pub created_time: Option<DateTime<Utc>>,
    pub token: String,
    pub path: String,
    pub status: UploadStatus,
}

// ---------------------------------------------------------------------------
// Execution error ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    Unresolved,
    Resolved,
}

impl ErrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Unresolved => "unresolved",
            ErrorStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(ErrorStatus::Unresolved),
            "resolved" => Some(ErrorStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExecutionError {
    pub upload_id: i64,
    /// 1-based line number within the batch.
    pub line_number: i32,
    pub customer_name: String,
    pub customer_phone: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub id: i64,
    pub upload_id: i64,
    /// File name of the owning upload, joined for triage screens.
    pub file_name: String,
    pub line_number: i32,
    pub customer_name: String,
    pub customer_phone: String,
    pub message: String,
    pub status: ErrorStatus,
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// A file found under the watch root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub name: String,
    pub path: PathBuf,
    pub modified_utc: DateTime<Utc>,
}
