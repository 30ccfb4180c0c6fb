//! File-discovery watermark.
//!
//! Tracks the modification time of the newest file already handed to the
//! ingest pipeline. A file is new only if its mtime is **strictly after**
//! the watermark; the watermark moves only through [`FileWatermark::advance`],
//! which the poller calls after the consumer has accepted a batch.

use chrono::{DateTime, Utc};

/// Result of checking one file time against the watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileFreshness {
    New,
    /// Not after the watermark; treated as already ingested.
    Seen {
        watermark: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

impl FileFreshness {
    pub fn is_new(&self) -> bool {
        matches!(self, FileFreshness::New)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FileWatermark {
    last: Option<DateTime<Utc>>,
}

impl FileWatermark {
    /// Empty watermark: every file is new.
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Seed from persisted state (the newest upload's created time).
    pub fn seeded(last: Option<DateTime<Utc>>) -> Self {
        Self { last }
    }

    pub fn check(&self, modified: DateTime<Utc>) -> FileFreshness {
        match self.last {
            Some(w) if modified <= w => FileFreshness::Seen {
                watermark: w,
                got: modified,
            },
            _ => FileFreshness::New,
        }
    }

    /// Move the watermark forward. Older values are ignored so the
    /// watermark never regresses.
    pub fn advance(&mut self, to: DateTime<Utc>) {
        if self.last.map_or(true, |w| to > w) {
            self.last = Some(to);
        }
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn empty_watermark_accepts_everything() {
        let wm = FileWatermark::new();
        assert!(wm.check(t(0)).is_new());
        assert!(wm.last().is_none());
    }

    #[test]
    fn equal_time_is_seen() {
        let wm = FileWatermark::seeded(Some(t(100)));
        assert_eq!(
            wm.check(t(100)),
            FileFreshness::Seen {
                watermark: t(100),
                got: t(100)
            }
        );
        assert!(wm.check(t(101)).is_new());
    }

    #[test]
    fn advance_never_regresses() {
        let mut wm = FileWatermark::seeded(Some(t(100)));
        wm.advance(t(50));
        assert_eq!(wm.last(), Some(t(100)));
        wm.advance(t(200));
        assert_eq!(wm.last(), Some(t(200)));
    }
}
