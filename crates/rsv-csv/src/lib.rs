//! rsv-csv
//!
//! Site-controller export parsers. This crate is the read side only: it turns
//! a CSV file into [`ReservationRecord`] values and never touches the store.
//!
//! Callers pick a parser through [`SiteController::parse`]; an unknown
//! site-controller name is rejected before any file is opened.

mod lincoln;

use std::path::Path;

use rsv_schemas::ReservationRecord;

pub use lincoln::LincolnParser;

/// Errors produced while turning an export file into records.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("site controller '{0}' is not available")]
    UnsupportedSiteController(String),

    #[error("csv io error: {0}")]
    Io(String),

    #[error("csv missing required header column: '{0}'")]
    MissingHeader(&'static str),

    #[error("csv row {row}: cannot parse field '{field}' from value '{raw}'")]
    ParseField {
        row: usize,
        field: &'static str,
        raw: String,
    },
}

/// A format-specific export parser.
pub trait ReservationParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse_str(&self, src: &str) -> Result<Vec<ReservationRecord>, CsvError>;

    fn parse_path(&self, path: &Path) -> Result<Vec<ReservationRecord>, CsvError> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| CsvError::Io(format!("read '{}': {e}", path.display())))?;
        self.parse_str(&src)
    }
}

/// Site controllers whose exports can be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteController {
    Lincoln,
}

impl SiteController {
    /// Case-insensitive lookup of a configured / requested controller name.
    pub fn parse(name: &str) -> Result<Self, CsvError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lincoln" => Ok(SiteController::Lincoln),
            _ => Err(CsvError::UnsupportedSiteController(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteController::Lincoln => "lincoln",
        }
    }

    pub fn parser(&self) -> Box<dyn ReservationParser> {
        match self {
            SiteController::Lincoln => Box::new(LincolnParser),
        }
    }
}
