//! Watch-directory poller.
//!
//! Every tick the poller lists files under the root whose mtime is strictly
//! after the watermark, newest first, and hands the list to the consumer.
//! The watermark advances to the newest file only once the consumer has
//! accepted the list through [`FileBatch::accept`]; a list that is merely
//! queued does not count.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rsv_schemas::DiscoveredFile;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument, Span};

use crate::watermark::FileWatermark;

/// One handed-off listing, newest first.
#[derive(Debug)]
pub struct FileBatch {
    files: Vec<DiscoveredFile>,
    ack: oneshot::Sender<()>,
}

impl FileBatch {
    /// A batch plus the receiver that resolves once it is accepted.
    pub fn new(files: Vec<DiscoveredFile>) -> (Self, oneshot::Receiver<()>) {
        let (ack, accepted) = oneshot::channel();
        (Self { files, ack }, accepted)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Take ownership of the files and let the poller advance. Dropping the
    /// batch without accepting it leaves the watermark where it was.
    pub fn accept(self) -> Vec<DiscoveredFile> {
        let _ = self.ack.send(());
        self.files
    }
}

pub struct FilePoller {
    root: PathBuf,
    period: Duration,
    watermark: FileWatermark,
    span: Span,
}

impl FilePoller {
    pub fn new(
        root: impl Into<PathBuf>,
        period: Duration,
        seed: Option<DateTime<Utc>>,
        span: Span,
    ) -> Self {
        Self {
            root: root.into(),
            period,
            watermark: FileWatermark::seeded(seed),
            span,
        }
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark.last()
    }

    /// Files newer than the watermark, newest first. Does not advance.
    pub fn poll_once(&self) -> Result<Vec<DiscoveredFile>> {
        list_new_files(&self.root, &self.watermark)
    }

    /// Tick until `stop` turns `true` (or its sender goes away) or the
    /// consumer drops its receiver. Returns the final watermark.
    pub async fn run(
        mut self,
        handoff: mpsc::Sender<FileBatch>,
        mut stop: watch::Receiver<bool>,
    ) -> Option<DateTime<Utc>> {
        let span = self.span.clone();
        async move {
            info!(root = %self.root.display(), period_s = self.period.as_secs(), "poller/start");
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.wait_for(|s| *s) => break,
                    _ = handoff.closed() => break,
                    _ = ticker.tick() => {}
                }

                let files = match self.poll_once() {
                    Ok(files) => files,
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "poller/list failed");
                        continue;
                    }
                };
                let Some(newest) = files.first().map(|f| f.modified_utc) else {
                    debug!("poller/no new files");
                    continue;
                };

                let count = files.len();
                let (batch, accepted) = FileBatch::new(files);
                tokio::select! {
                    biased;
                    _ = stop.wait_for(|s| *s) => break,
                    sent = handoff.send(batch) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    biased;
                    _ = stop.wait_for(|s| *s) => break,
                    acked = accepted => match acked {
                        Ok(()) => {
                            self.watermark.advance(newest);
                            info!(count, watermark = %newest, "poller/handoff");
                        }
                        Err(_) => warn!(count, "poller/handoff dropped; retrying next tick"),
                    }
                }
            }

            info!(watermark = ?self.watermark.last(), "poller/stop");
            self.watermark.last()
        }
        .instrument(span)
        .await
    }
}

/// Recursive listing of regular files under `root` that are newer than
/// `watermark`, sorted newest first (name breaks ties).
pub fn list_new_files(root: &Path, watermark: &FileWatermark) -> Result<Vec<DiscoveredFile>> {
    let mut out = Vec::new();
    walk(root, watermark, &mut out)?;
    out.sort_by(|a, b| {
        b.modified_utc
            .cmp(&a.modified_utc)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(out)
}

fn walk(dir: &Path, watermark: &FileWatermark, out: &mut Vec<DiscoveredFile>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read_dir '{}' failed", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read_dir '{}' failed", dir.display()))?;
        let path = entry.path();
        let meta = entry
            .metadata()
            .with_context(|| format!("metadata '{}' failed", path.display()))?;
        if meta.is_dir() {
            walk(&path, watermark, out)?;
            continue;
        }
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .with_context(|| format!("mtime '{}' failed", path.display()))?;
        let modified_utc = to_utc(modified);
        if !watermark.check(modified_utc).is_new() {
            continue;
        }
        out.push(DiscoveredFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            modified_utc,
        });
    }
    Ok(())
}

/// Storage keeps microseconds; truncate so a persisted watermark compares
/// equal to the file it came from.
fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t).trunc_subsecs(6)
}
