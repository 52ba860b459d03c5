//! Audit trail of recent pipeline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use boxtrack_normalize_models::{FormatType, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One processed raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub format: FormatType,
    pub items: usize,
    pub valid: usize,
    pub partial: usize,
    pub rejected: usize,
    pub confidence: f64,
}

impl AuditEntry {
    #[must_use]
    pub fn from_result(result: &PipelineResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            format: result.format.format_type,
            items: result.items.len(),
            valid: result.valid_count(),
            partial: result.partial_count(),
            rejected: result.rejected_count(),
            confidence: result.confidence,
        }
    }
}

/// Receives one entry per processed input.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// In-memory audit log keeping the most recent `capacity` entries.
#[derive(Debug)]
pub struct BoundedAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl BoundedAuditLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl AuditSink for BoundedAuditLog {
    fn record(&self, entry: AuditEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            log::warn!("audit log lock poisoned, dropping entry {}", entry.id);
            return;
        };
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(items: usize) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            format: FormatType::PlainText,
            items,
            valid: items,
            partial: 0,
            rejected: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let log = BoundedAuditLog::new(2);
        log.record(entry(1));
        log.record(entry(2));
        log.record(entry(3));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].items, 2);
        assert_eq!(entries[1].items, 3);
    }

    #[test]
    fn entries_have_unique_ids() {
        let log = BoundedAuditLog::new(10);
        log.record(entry(1));
        log.record(entry(1));
        let entries = log.entries();
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let log = BoundedAuditLog::new(0);
        log.record(entry(1));
        log.record(entry(2));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].items, 2);
    }

    #[test]
    fn shared_across_threads() {
        let log = std::sync::Arc::new(BoundedAuditLog::new(100));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        log.record(entry(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 40);
    }
}
