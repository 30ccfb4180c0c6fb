//! Request and response types for rsv-daemon HTTP endpoints.
//!
//! No business logic lives here.

use rsv_schemas::{ExecutionError, UploadStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestTimestampResponse {
    /// `YYYY/MM/DD hh:mm:ss`; `None` when no upload carries a valid token.
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Query of `POST /v1/uploads/{token}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuery {
    /// Site controller name. Required.
    pub sc: Option<String>,
    /// Base file name; the token and `.csv` are appended.
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// /v1/errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ExecutionError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub resolved: u64,
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
