// Event Stream Generator
//
// Each connection owns a cursor into the shared catalog and a pacing timer.
// Ready -> Emitting -> Exhausted; the cursor only moves forward, so an event is
// never repeated or reordered within a session.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use flowguard_common::PredictionEvent;

use crate::catalog::EventCatalog;

/// Generator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// No event read yet
    Ready,
    /// At least one event read, more remain
    Emitting,
    /// Every event has been read
    Exhausted,
}

/// Per-session position into the shared event sequence
#[derive(Debug, Clone)]
pub struct SessionCursor {
    catalog: EventCatalog,
    position: usize,
    state: GeneratorState,
}

impl SessionCursor {
    pub fn new(catalog: EventCatalog) -> Self {
        Self {
            catalog,
            position: 0,
            state: GeneratorState::Ready,
        }
    }

    /// Index of the next event to read
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn remaining(&self) -> usize {
        self.catalog.len() - self.position
    }

    /// Read the event under the cursor and step past it
    pub fn advance(&mut self) -> Option<PredictionEvent> {
        let Some(event) = self.catalog.get(self.position).cloned() else {
            self.state = GeneratorState::Exhausted;
            return None;
        };

        self.position += 1;
        self.state = if self.position == self.catalog.len() {
            GeneratorState::Exhausted
        } else {
            GeneratorState::Emitting
        };
        Some(event)
    }
}

/// Paced producer of one session's events
#[derive(Debug)]
pub struct EventGenerator {
    cursor: SessionCursor,
    pacing: Interval,
}

impl EventGenerator {
    /// Must be called from within a tokio runtime (the pacing timer registers with it)
    pub fn new(catalog: EventCatalog, pacing_interval: Duration) -> Self {
        // First tick fires one full interval after the session starts
        let mut pacing = time::interval_at(Instant::now() + pacing_interval, pacing_interval);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            cursor: SessionCursor::new(catalog),
            pacing,
        }
    }

    pub fn cursor(&self) -> &SessionCursor {
        &self.cursor
    }

    /// Read the next event, wait out the pacing interval, then hand it over.
    /// Returns `None` without waiting once the sequence is exhausted.
    pub async fn next_event(&mut self) -> Option<PredictionEvent> {
        let event = self.cursor.advance()?;
        self.pacing.tick().await;
        Some(event)
    }
}
