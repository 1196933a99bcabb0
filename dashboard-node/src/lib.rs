//! Dashboard Node Library
//!
//! Client side of the prediction stream: an incremental aggregator over the
//! received messages and a subscriber that feeds it from a replay node.

pub mod aggregator;
pub mod error;
pub mod subscriber;

pub use aggregator::{
    percentage, AggregateState, CountView, DashboardSnapshot, HistoryEntry, ProportionSlice,
    ProportionView, RecentHistory, RECENT_HISTORY_CAPACITY,
};
pub use error::{DashboardError, Result};
pub use subscriber::{DashboardSubscriber, SubscriptionReport};
