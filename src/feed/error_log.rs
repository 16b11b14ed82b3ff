use crate::model::ErrorRecord;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded log of recent fetch failures.
///
/// Oldest records are evicted once `capacity` is reached. Diagnostics only:
/// nothing in the refresh cycle reads it back.
#[derive(Debug)]
pub struct ErrorLog {
    capacity: usize,
    records: Mutex<VecDeque<ErrorRecord>>,
}

impl ErrorLog {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a failure stamped with the current time.
    pub fn record(&self, url: &str, error: impl Into<String>) {
        let record = ErrorRecord {
            url: url.to_owned(),
            error: error.into(),
            at: Utc::now(),
        };
        tracing::warn!(url = %record.url, error = %record.error, "Feed fetch failed");

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Retained records, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
