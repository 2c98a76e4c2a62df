// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Consumption of dataset change events.
//!
//! The metadata service announces datasets on a single topic with two
//! event types: a full overview on upsertion and a bare accession on
//! deletion. The translator maps the upstream payload shape onto the
//! internal [`Dataset`] model and applies it to the projection.
//! Re-delivery of an event is harmless; applying the same event twice
//! yields the same projection.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use wpstypes::dataset::{Dataset, DatasetFile, WorkType};

use crate::storage_provider_trait::DatasetStorageProvider;

/// Names of the topic and event types carrying dataset changes.
#[derive(Clone, Debug, Deserialize)]
pub struct DatasetEventConfig {
    #[serde(default = "default_change_topic")]
    pub dataset_change_topic: String,
    #[serde(default = "default_upsertion_type")]
    pub dataset_upsertion_type: String,
    #[serde(default = "default_deletion_type")]
    pub dataset_deletion_type: String,
}

fn default_change_topic() -> String {
    "metadata_datasets".into()
}

fn default_upsertion_type() -> String {
    "dataset_upserted".into()
}

fn default_deletion_type() -> String {
    "dataset_deleted".into()
}

impl Default for DatasetEventConfig {
    fn default() -> Self {
        Self {
            dataset_change_topic: default_change_topic(),
            dataset_upsertion_type: default_upsertion_type(),
            dataset_deletion_type: default_deletion_type(),
        }
    }
}

/// An event as delivered by the bus client, type tag plus raw payload.
#[derive(Clone, Debug)]
pub struct DatasetEvent {
    pub event_type: String,
    pub payload: Value,
}

/// The upstream payload shapes. Field names follow the producing service;
/// deployments with a different shape only need to touch this adapter.
mod payloads {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct DatasetFilePayload {
        pub accession: String,
        pub file_extension: String,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct DatasetOverviewPayload {
        pub accession: String,
        pub title: String,
        pub description: Option<String>,
        pub stage: String,
        pub files: Vec<DatasetFilePayload>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct DatasetDeletionPayload {
        pub accession: String,
    }

    impl DatasetOverviewPayload {
        /// The work type matching the announced stage, if any.
        pub(super) fn work_type(&self) -> Option<WorkType> {
            match self.stage.as_str() {
                "download" => Some(WorkType::Download),
                "upload" => Some(WorkType::Upload),
                _ => None,
            }
        }

        pub(super) fn into_dataset(self, stage: WorkType) -> Dataset {
            Dataset {
                id: self.accession,
                title: self.title,
                description: self.description,
                stage,
                files: self
                    .files
                    .into_iter()
                    .map(|file| DatasetFile {
                        id: file.accession,
                        extension: file.file_extension,
                    })
                    .collect(),
            }
        }
    }
}

/// Handling an event failed; the bus client decides between retry and
/// dead-lettering.
#[derive(Debug, Error)]
pub enum EventHandlingError {
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Could not update the dataset projection: {0}")]
    Storage(String),
}

/// Applies dataset change events to the projection.
pub struct DatasetEventTranslator<Ds> {
    config: DatasetEventConfig,
    datasets: Ds,
}

impl<Ds: DatasetStorageProvider> DatasetEventTranslator<Ds> {
    pub fn new(config: DatasetEventConfig, datasets: Ds) -> Self {
        Self { config, datasets }
    }

    /// Handle a single event from the configured topic.
    pub async fn handle(&self, event: &DatasetEvent) -> Result<(), EventHandlingError> {
        if event.event_type == self.config.dataset_upsertion_type {
            self.handle_upsertion(&event.payload).await
        } else if event.event_type == self.config.dataset_deletion_type {
            self.handle_deletion(&event.payload).await
        } else {
            debug!(event_type = %event.event_type, "Ignoring event of unhandled type");
            Ok(())
        }
    }

    async fn handle_upsertion(&self, payload: &Value) -> Result<(), EventHandlingError> {
        let payload: payloads::DatasetOverviewPayload = serde_json::from_value(payload.clone())?;
        let Some(stage) = payload.work_type() else {
            // stage does not correspond to a work type
            info!(stage = %payload.stage, "Ignoring dataset event with unknown stage");
            return Ok(());
        };
        let dataset = payload.into_dataset(stage);
        let dataset_id = dataset.id.clone();
        self.datasets
            .upsert_dataset(dataset)
            .await
            .map_err(|error| EventHandlingError::Storage(error.to_string()))?;
        info!(%dataset_id, "Registered dataset");
        Ok(())
    }

    async fn handle_deletion(&self, payload: &Value) -> Result<(), EventHandlingError> {
        let payload: payloads::DatasetDeletionPayload = serde_json::from_value(payload.clone())?;
        self.datasets
            .delete_dataset(&payload.accession)
            .await
            .map_err(|error| EventHandlingError::Storage(error.to_string()))?;
        info!(dataset_id = %payload.accession, "Deleted dataset");
        Ok(())
    }
}

/// A source of dataset change events, typically a bus consumer already
/// subscribed to the configured topic.
#[async_trait]
pub trait DatasetEventSource: Send {
    type SourceError: std::error::Error + Send + Sync + 'static;

    /// The next event, or `None` once the stream has ended.
    async fn next_event(&mut self) -> Result<Option<DatasetEvent>, Self::SourceError>;
}

/// The event loop terminated abnormally.
#[derive(Debug, Error)]
pub enum EventLoopError<E: std::error::Error> {
    #[error("Event source failed: {0}")]
    Source(#[source] E),
    #[error(transparent)]
    Handler(#[from] EventHandlingError),
}

/// Drive the translator from an event source until the source ends.
///
/// Handler errors are returned to the caller, which owns the retry and
/// dead-letter policy.
pub async fn run_dataset_event_loop<S, Ds>(
    mut source: S,
    translator: &DatasetEventTranslator<Ds>,
) -> Result<(), EventLoopError<S::SourceError>>
where
    S: DatasetEventSource,
    Ds: DatasetStorageProvider,
{
    while let Some(event) = source
        .next_event()
        .await
        .map_err(EventLoopError::Source)?
    {
        translator.handle(&event).await?;
    }
    Ok(())
}

/// An in-process event source over a tokio channel, used in tests and
/// local runs.
pub struct MemoryEventSource {
    receiver: tokio::sync::mpsc::Receiver<DatasetEvent>,
}

impl MemoryEventSource {
    /// A new source together with the sending half of its channel.
    pub fn channel(buffer: usize) -> (tokio::sync::mpsc::Sender<DatasetEvent>, Self) {
        let (sender, receiver) = tokio::sync::mpsc::channel(buffer);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl DatasetEventSource for MemoryEventSource {
    type SourceError = std::convert::Infallible;

    async fn next_event(&mut self) -> Result<Option<DatasetEvent>, Self::SourceError> {
        Ok(self.receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct MemDatasets(Mutex<HashMap<String, Dataset>>);

    #[async_trait]
    impl DatasetStorageProvider for &'static MemDatasets {
        type StorageError = Infallible;

        async fn upsert_dataset(&self, dataset: Dataset) -> Result<(), Infallible> {
            self.0.lock().unwrap().insert(dataset.id.clone(), dataset);
            Ok(())
        }

        async fn delete_dataset(&self, dataset_id: &str) -> Result<(), Infallible> {
            self.0.lock().unwrap().remove(dataset_id);
            Ok(())
        }

        async fn load_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>, Infallible> {
            Ok(self.0.lock().unwrap().get(dataset_id).cloned())
        }
    }

    fn translator() -> (DatasetEventTranslator<&'static MemDatasets>, &'static MemDatasets) {
        let datasets: &'static MemDatasets = Box::leak(Box::default());
        (
            DatasetEventTranslator::new(DatasetEventConfig::default(), datasets),
            datasets,
        )
    }

    fn upsertion_event() -> DatasetEvent {
        DatasetEvent {
            event_type: "dataset_upserted".into(),
            payload: json!({
                "accession": "DS001",
                "title": "Some dataset",
                "description": "Test dataset",
                "stage": "download",
                "files": [
                    {"accession": "F001", "file_extension": ".txt"},
                    {"accession": "F002", "file_extension": ".csv"},
                ],
            }),
        }
    }

    fn deletion_event() -> DatasetEvent {
        DatasetEvent {
            event_type: "dataset_deleted".into(),
            payload: json!({"accession": "DS001"}),
        }
    }

    #[tokio::test]
    async fn upsertion_projects_the_dataset() {
        let (translator, datasets) = translator();
        translator.handle(&upsertion_event()).await.unwrap();

        let dataset = datasets.load_dataset("DS001").await.unwrap().unwrap();
        assert_eq!(dataset.title, "Some dataset");
        assert_eq!(dataset.stage, WorkType::Download);
        assert_eq!(dataset.files.len(), 2);
        assert_eq!(dataset.files[0].id, "F001");
        assert_eq!(dataset.files[0].extension, ".txt");
    }

    #[tokio::test]
    async fn replaying_events_is_idempotent() {
        let (translator, datasets) = translator();
        let events = [upsertion_event(), upsertion_event(), deletion_event()];
        for event in &events {
            translator.handle(event).await.unwrap();
        }
        assert!(datasets.load_dataset("DS001").await.unwrap().is_none());
        // replay the whole stream
        for event in &events {
            translator.handle(event).await.unwrap();
        }
        assert!(datasets.load_dataset("DS001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_an_unknown_dataset_is_accepted() {
        let (translator, _) = translator();
        translator.handle(&deletion_event()).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_stages_are_ignored() {
        let (translator, datasets) = translator();
        let mut event = upsertion_event();
        event.payload["stage"] = json!("submitted");
        translator.handle(&event).await.unwrap();
        assert!(datasets.load_dataset("DS001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_event_types_are_ignored() {
        let (translator, datasets) = translator();
        let mut event = upsertion_event();
        event.event_type = "something_else".into();
        translator.handle(&event).await.unwrap();
        assert!(datasets.load_dataset("DS001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_payloads_are_reported() {
        let (translator, _) = translator();
        let mut event = upsertion_event();
        event.payload = json!({"unexpected": true});
        assert!(matches!(
            translator.handle(&event).await,
            Err(EventHandlingError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn event_loop_drains_the_source() {
        let (translator, datasets) = translator();
        let (sender, source) = MemoryEventSource::channel(8);
        sender.send(upsertion_event()).await.unwrap();
        drop(sender);

        run_dataset_event_loop(source, &translator).await.unwrap();
        assert!(datasets.load_dataset("DS001").await.unwrap().is_some());
    }
}
