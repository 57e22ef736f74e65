use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Lifecycle of one ingested source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Running { lines: u64 },
    Finished { lines: u64, matched: u64 },
    /// `line` is 0 when the source could not be opened.
    Failed { line: u64, reason: String },
}

impl SourceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceStatus::Finished { .. } | SourceStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub status: SourceStatus,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

/// Concurrent per-source status table shared by every ingestion thread.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: DashMap<String, SourceRecord>,
    next_seq: AtomicU64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source as pending. Registering an id again resets its status.
    pub fn register(&self, source_id: &str) {
        let now = Utc::now();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.sources.insert(
            source_id.to_string(),
            SourceRecord {
                source_id: source_id.to_string(),
                status: SourceStatus::Pending,
                registered_at: now,
                updated_at: now,
                seq,
            },
        );
    }

    /// Set the status of a source, registering it first if unknown.
    pub fn update(&self, source_id: &str, status: SourceStatus) {
        if !self.sources.contains_key(source_id) {
            self.register(source_id);
        }
        if let Some(mut record) = self.sources.get_mut(source_id) {
            record.status = status;
            record.updated_at = Utc::now();
        }
    }

    pub fn status(&self, source_id: &str) -> Option<SourceStatus> {
        self.sources.get(source_id).map(|r| r.status.clone())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// All records in registration order.
    pub fn snapshot(&self) -> Vec<SourceRecord> {
        let mut records: Vec<SourceRecord> = self.sources.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    pub fn failed(&self) -> Vec<SourceRecord> {
        self.snapshot()
            .into_iter()
            .filter(|r| matches!(r.status, SourceStatus::Failed { .. }))
            .collect()
    }

    /// True once every registered source is finished or failed.
    pub fn all_terminal(&self) -> bool {
        self.sources.iter().all(|r| r.status.is_terminal())
    }
}
