//! Bounded, append-ordered history of check results for one target.
//!
//! Eviction is strictly FIFO on append order: the timestamp carried by a
//! result plays no part in deciding which entry is the oldest.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::types::CheckResult;

/// Capacity used when none is configured
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Page size used when a caller does not pass one
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// 1-based page request over a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_LIMIT }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Index range `[start, end)` this page covers, `None` when it covers nothing
    pub fn bounds(&self) -> Option<(usize, usize)> {
        if self.page == 0 || self.limit == 0 {
            return None;
        }
        let limit = self.limit as usize;
        let start = (self.page as usize - 1).saturating_mul(limit);
        Some((start, start.saturating_add(limit)))
    }
}

/// A page of history plus the ledger's total length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub entries: Vec<CheckResult>,
    pub total_records: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    entries: VecDeque<CheckResult>,
    capacity: usize,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryLedger {
    /// Create an empty ledger, capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::new(), capacity }
    }

    /// Append at the tail, returning the entry evicted to stay within capacity
    pub fn append(&mut self, result: CheckResult) -> Option<CheckResult> {
        self.entries.push_back(result);
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended entry
    pub fn latest(&self) -> Option<&CheckResult> {
        self.entries.back()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<CheckResult> {
        self.entries.iter().cloned().collect()
    }

    /// Contiguous slice for a page; out-of-range pages are empty
    pub fn page(&self, request: PageRequest) -> HistoryPage {
        let total_records = self.entries.len();
        let entries = match request.bounds() {
            Some((start, end)) if start < total_records => {
                self.entries.range(start..end.min(total_records)).cloned().collect()
            }
            _ => Vec::new(),
        };

        HistoryPage { entries, total_records }
    }
}
