//! Capacity-bounded alert history

use super::AlertEntry;
use std::collections::VecDeque;

/// Default number of entries retained
pub const DEFAULT_ALERT_CAPACITY: usize = 200;

/// Append-only log that drops its oldest entries beyond `capacity`
#[derive(Debug, Clone, PartialEq)]
pub struct AlertLog {
    capacity: usize,
    entries: VecDeque<AlertEntry>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Adopt entries read from the shared document, keeping the newest
    /// `capacity` of them
    pub fn from_entries(entries: Vec<AlertEntry>, capacity: usize) -> Self {
        let mut log = Self {
            capacity,
            entries: entries.into(),
        };
        log.trim();
        log
    }

    /// Append an entry and evict from the front until within capacity
    pub fn push(&mut self, entry: AlertEntry) {
        self.entries.push_back(entry);
        self.trim();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&AlertEntry> {
        self.entries.back()
    }

    /// Number of full anomaly records currently retained
    pub fn anomaly_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_anomaly()).count()
    }

    pub fn into_entries(self) -> Vec<AlertEntry> {
        self.entries.into()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}
