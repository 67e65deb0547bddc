use std::fmt;

use crate::aggregate::AppliedKind;

/// Counters for one ingestion run, logged at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Candidates handed to the pipeline.
    pub received: usize,
    /// Dropped at validation (empty URL or title).
    pub rejected: usize,
    /// Dropped because an earlier candidate in the batch had the same URL.
    pub skipped_in_batch: usize,
    /// Folded into an existing article.
    pub updated: usize,
    /// Added to an already tracked story.
    pub attached: usize,
    /// Formed a new story together with a stored article.
    pub paired: usize,
    /// Started a new single-article story.
    pub standalone: usize,
    /// Resolved without an embedding after a lookup or embed failure.
    pub degraded: usize,
    /// Left for the next run because the deadline passed.
    pub deferred: usize,
}

impl IngestStats {
    pub fn record(&mut self, kind: AppliedKind) {
        match kind {
            AppliedKind::Updated => self.updated += 1,
            AppliedKind::Attached => self.attached += 1,
            AppliedKind::Paired => self.paired += 1,
            AppliedKind::Standalone => self.standalone += 1,
        }
    }

    /// Candidates that reached a decision and were written.
    pub fn applied(&self) -> usize {
        self.updated + self.attached + self.paired + self.standalone
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} rejected={} skipped={} updated={} attached={} \
             paired={} standalone={} degraded={} deferred={}",
            self.received,
            self.rejected,
            self.skipped_in_batch,
            self.updated,
            self.attached,
            self.paired,
            self.standalone,
            self.degraded,
            self.deferred,
        )
    }
}
