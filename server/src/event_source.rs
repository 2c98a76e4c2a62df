// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! A bus-shaped event source over newline-delimited JSON.
//!
//! Each line is one record of the form `{"topic": ..., "type": ...,
//! "payload": {...}}`, the shape a bus consumer bridge (e.g. `kcat -C`
//! piped into `consume-events`) emits per message. Records from other
//! topics are skipped; the stream ends at EOF. Deployments with a native
//! bus client implement [`DatasetEventSource`] directly instead.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::debug;

use wpsbackend::dataset_events::{DatasetEvent, DatasetEventSource};

/// One record on the wire.
#[derive(Debug, Deserialize)]
struct BusRecord {
    topic: String,
    #[serde(rename = "type")]
    event_type: String,
    payload: Value,
}

#[derive(Debug, Error)]
pub enum JsonLinesSourceError {
    #[error("Could not read event stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed event record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reads dataset change events from a newline-delimited JSON stream.
pub struct JsonLinesEventSource<R> {
    lines: Lines<BufReader<R>>,
    topic: String,
}

impl<R: AsyncRead + Unpin> JsonLinesEventSource<R> {
    /// Wrap a reader, keeping only records of the given topic.
    pub fn new(reader: R, topic: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> DatasetEventSource for JsonLinesEventSource<R> {
    type SourceError = JsonLinesSourceError;

    async fn next_event(&mut self) -> Result<Option<DatasetEvent>, JsonLinesSourceError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: BusRecord = serde_json::from_str(&line)?;
            if record.topic != self.topic {
                debug!(topic = %record.topic, "Skipping record from foreign topic");
                continue;
            }
            return Ok(Some(DatasetEvent {
                event_type: record.event_type,
                payload: record.payload,
            }));
        }
        Ok(None)
    }
}
