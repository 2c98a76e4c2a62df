// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory storage providers, used by tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::WorkPackage;
use wpstypes::dataset::Dataset;
use wpstypes::identifiers::WorkPackageId;

#[derive(Debug, Error)]
pub enum MemoryStorageError {
    #[error("Memory store lock was poisoned")]
    Poisoned,
}

/// A storage provider keeping everything in process memory.
///
/// Clones share the same underlying maps, mirroring how pool-backed
/// providers share one database.
#[derive(Clone, Default)]
pub struct MemoryStorageProvider {
    datasets: Arc<Mutex<HashMap<String, Dataset>>>,
    work_packages: Arc<Mutex<HashMap<WorkPackageId, WorkPackage>>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStorageProvider for MemoryStorageProvider {
    type StorageError = MemoryStorageError;

    async fn upsert_dataset(&self, dataset: Dataset) -> Result<(), MemoryStorageError> {
        let mut datasets = self.datasets.lock().map_err(|_| MemoryStorageError::Poisoned)?;
        datasets.insert(dataset.id.clone(), dataset);
        Ok(())
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), MemoryStorageError> {
        let mut datasets = self.datasets.lock().map_err(|_| MemoryStorageError::Poisoned)?;
        datasets.remove(dataset_id);
        Ok(())
    }

    async fn load_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>, MemoryStorageError> {
        let datasets = self.datasets.lock().map_err(|_| MemoryStorageError::Poisoned)?;
        Ok(datasets.get(dataset_id).cloned())
    }
}

#[async_trait]
impl WorkPackageStorageProvider for MemoryStorageProvider {
    type StorageError = MemoryStorageError;

    async fn insert_work_package(
        &self,
        work_package: WorkPackage,
    ) -> Result<(), MemoryStorageError> {
        let mut packages = self
            .work_packages
            .lock()
            .map_err(|_| MemoryStorageError::Poisoned)?;
        packages.insert(work_package.id.clone(), work_package);
        Ok(())
    }

    async fn load_work_package(
        &self,
        id: &WorkPackageId,
    ) -> Result<Option<WorkPackage>, MemoryStorageError> {
        let packages = self
            .work_packages
            .lock()
            .map_err(|_| MemoryStorageError::Poisoned)?;
        Ok(packages.get(id).cloned())
    }
}
