// Dashboard Aggregator
//
// Pure incremental state over the prediction stream of one connection. Each
// message is applied exactly once, in arrival order; nothing here touches the
// network or storage. A reconnect starts from a fresh `AggregateState`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use flowguard_common::{FeatureRecord, Label, StreamMessage};

/// Rows kept in the recent-history table
pub const RECENT_HISTORY_CAPACITY: usize = 20;

/// Percentage of `part` in `total`, rounded to one decimal; 0 when total is 0
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

/// One row of the recent-history table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub received_at: DateTime<Utc>,
    pub index: u64,
    pub prediction: Label,
    pub features: FeatureRecord,
}

/// Fixed-capacity, newest-first history
#[derive(Debug, Clone)]
pub struct RecentHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::with_capacity(RECENT_HISTORY_CAPACITY)
    }
}

impl RecentHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepend an entry, evicting the oldest once over capacity
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
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

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }
}

/// Absolute counts per category (bar chart)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountView {
    pub benign: u64,
    pub attack: u64,
}

/// One slice of the proportional view
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProportionSlice {
    pub label: Label,
    pub count: u64,
    /// Share of the total, one decimal
    pub percent: f64,
}

/// Proportional view with percentage annotations (pie chart)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProportionView {
    pub benign: ProportionSlice,
    pub attack: ProportionSlice,
}

/// Serializable view of the whole aggregate state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub total: u64,
    pub benign_count: u64,
    pub attack_count: u64,
    pub attack_rate: f64,
    pub counts: CountView,
    pub proportions: ProportionView,
    pub recent: Vec<HistoryEntry>,
}

/// Running counters and recent history for one stream connection
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    benign_count: u64,
    attack_count: u64,
    recent: RecentHistory,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one received message
    pub fn apply(&mut self, message: StreamMessage, received_at: DateTime<Utc>) {
        match message.prediction {
            Label::Benign => self.benign_count += 1,
            Label::Attack => self.attack_count += 1,
        }

        self.recent.push(HistoryEntry {
            received_at,
            index: message.index,
            prediction: message.prediction,
            features: message.features,
        });
    }

    pub fn benign_count(&self) -> u64 {
        self.benign_count
    }

    pub fn attack_count(&self) -> u64 {
        self.attack_count
    }

    pub fn total(&self) -> u64 {
        self.benign_count + self.attack_count
    }

    /// Attack share of all received events, in percent with one decimal
    pub fn attack_rate(&self) -> f64 {
        percentage(self.attack_count, self.total())
    }

    pub fn recent(&self) -> &RecentHistory {
        &self.recent
    }

    pub fn count_view(&self) -> CountView {
        CountView {
            benign: self.benign_count,
            attack: self.attack_count,
        }
    }

    pub fn proportion_view(&self) -> ProportionView {
        let total = self.total();
        ProportionView {
            benign: ProportionSlice {
                label: Label::Benign,
                count: self.benign_count,
                percent: percentage(self.benign_count, total),
            },
            attack: ProportionSlice {
                label: Label::Attack,
                count: self.attack_count,
                percent: percentage(self.attack_count, total),
            },
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            total: self.total(),
            benign_count: self.benign_count,
            attack_count: self.attack_count,
            attack_rate: self.attack_rate(),
            counts: self.count_view(),
            proportions: self.proportion_view(),
            recent: self.recent.iter().cloned().collect(),
        }
    }
}
