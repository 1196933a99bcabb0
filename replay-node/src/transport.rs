// Stream Transport
//
// One task per connection runs that connection's generator and pushes encoded
// messages into a bounded channel; the response body drains the channel.
// Pacing never waits on the client: when the channel is full the newest
// message is dropped and counted. The response stream carries a cancellation
// drop guard, so dropping it (client gone) stops the task and its timer.

use futures::Stream;
use metrics::{counter, decrement_gauge, increment_gauge};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use flowguard_common::StreamMessage;

use crate::catalog::EventCatalog;
use crate::config::StreamConfig;
use crate::session::EventGenerator;

/// How a session's producer task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every event was generated; the channel is closed behind the last one
    Exhausted,
    /// The client went away first
    Disconnected,
}

/// Per-session delivery statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Stream settings shared by every session
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub pacing_interval: Duration,
    pub channel_capacity: usize,
}

impl From<&StreamConfig> for TransportSettings {
    fn from(stream: &StreamConfig) -> Self {
        Self {
            pacing_interval: stream.pacing_interval(),
            channel_capacity: stream.channel_capacity,
        }
    }
}

/// Number of open sessions, decremented when a producer task ends
#[derive(Debug, Clone, Default)]
pub struct SessionCounter(Arc<AtomicUsize>);

impl SessionCounter {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn enter(&self) -> ActiveSession {
        self.0.fetch_add(1, Ordering::Relaxed);
        increment_gauge!("replay_active_sessions", 1.0);
        ActiveSession(self.clone())
    }
}

struct ActiveSession(SessionCounter);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0 .0.fetch_sub(1, Ordering::Relaxed);
        decrement_gauge!("replay_active_sessions", 1.0);
    }
}

/// Encoded messages of one session, in generation order
pub struct SessionStream {
    id: Uuid,
    inner: ReceiverStream<String>,
    _cancel_on_drop: DropGuard,
}

impl SessionStream {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Stream for SessionStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Start a new session over `catalog` and return its message stream
pub fn open_session(
    catalog: EventCatalog,
    settings: &TransportSettings,
    sessions: &SessionCounter,
) -> SessionStream {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(settings.channel_capacity);
    let token = CancellationToken::new();

    let generator = EventGenerator::new(catalog, settings.pacing_interval);
    let active = sessions.enter();
    counter!("replay_sessions_opened_total", 1);
    info!(session_id = %id, events = generator.cursor().remaining(), "Stream session opened");

    let task_token = token.clone();
    tokio::spawn(async move {
        let (end, stats, position) = run_session(id, generator, tx, task_token).await;
        drop(active);
        counter!("replay_sessions_closed_total", 1);
        info!(
            session_id = %id,
            ?end,
            position,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "Stream session closed"
        );
    });

    SessionStream {
        id,
        inner: ReceiverStream::new(rx),
        _cancel_on_drop: token.drop_guard(),
    }
}

/// Drive one generator until it is exhausted or the client disconnects
async fn run_session(
    id: Uuid,
    mut generator: EventGenerator,
    tx: mpsc::Sender<String>,
    token: CancellationToken,
) -> (SessionEnd, SessionStats, usize) {
    let mut stats = SessionStats::default();

    let end = loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break SessionEnd::Disconnected,

            next = generator.next_event() => {
                let Some(event) = next else {
                    break SessionEnd::Exhausted;
                };

                let payload = match StreamMessage::from(&event).encode() {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(session_id = %id, index = event.index, error = %e, "Failed to encode event");
                        continue;
                    }
                };

                match tx.try_send(payload) {
                    Ok(()) => {
                        stats.delivered += 1;
                        counter!("replay_events_emitted_total", 1);
                        debug!(session_id = %id, index = event.index, prediction = %event.prediction, "Event queued");
                    }
                    Err(TrySendError::Full(_)) => {
                        stats.dropped += 1;
                        counter!("replay_events_dropped_total", 1);
                        warn!(session_id = %id, index = event.index, "Client not keeping up, dropping event");
                    }
                    Err(TrySendError::Closed(_)) => break SessionEnd::Disconnected,
                }
            }
        }
    };

    (end, stats, generator.cursor().position())
}
