//! Push-channel client feeding the aggregator

use chrono::Utc;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use std::io;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use flowguard_common::{FrameDecoder, StreamMessage};

use crate::aggregator::AggregateState;
use crate::error::{DashboardError, Result};

/// Outcome of one subscription, returned once the server closes the channel
#[derive(Debug, Clone)]
pub struct SubscriptionReport {
    /// Aggregate state after the last applied message
    pub state: AggregateState,
    /// Messages that failed to decode and were never applied
    pub skipped: u64,
}

/// Subscribes to a replay node's push endpoint
#[derive(Debug, Clone)]
pub struct DashboardSubscriber {
    client: reqwest::Client,
    url: String,
}

impl DashboardSubscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open one connection and aggregate it until the server closes the channel.
    /// Every call starts from a fresh `AggregateState`; `on_update` sees the
    /// state after each applied message.
    pub async fn run<F>(&self, mut on_update: F) -> Result<SubscriptionReport>
    where
        F: FnMut(&AggregateState),
    {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Status(status));
        }
        info!(url = %self.url, "Subscribed to prediction stream");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        let frames = FramedRead::new(StreamReader::new(body), FrameDecoder::new());
        let mut frames = std::pin::pin!(frames);

        let mut state = AggregateState::new();
        let mut skipped = 0;

        while let Some(frame) = frames.next().await {
            let payload = frame?;
            match StreamMessage::decode(&payload) {
                Ok(message) => {
                    debug!(index = message.index, prediction = %message.prediction, "Message received");
                    state.apply(message, Utc::now());
                    on_update(&state);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "Skipping undecodable message");
                }
            }
        }

        info!(
            total = state.total(),
            attack_rate = state.attack_rate(),
            skipped,
            "Prediction stream closed"
        );

        Ok(SubscriptionReport { state, skipped })
    }
}
