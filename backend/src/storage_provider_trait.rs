// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Storage provider traits for the dataset projection and the work
//! package records.

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;

use wpstypes::dataset::Dataset;
use wpstypes::identifiers::WorkPackageId;

use crate::work_package::WorkPackage;

/// Storage provider for the dataset projection.
///
/// The projection is only ever mutated by the dataset event stream;
/// everything else reads.
#[async_trait]
pub trait DatasetStorageProvider: Send + Sync + 'static {
    type StorageError: Error + Debug + Send + Sync + 'static;

    /// Insert the dataset, or replace it wholesale if it already exists.
    async fn upsert_dataset(&self, dataset: Dataset) -> Result<(), Self::StorageError>;

    /// Delete the dataset. Deleting an unknown dataset is not an error.
    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), Self::StorageError>;

    /// Load the dataset with the given id, if known.
    async fn load_dataset(&self, dataset_id: &str)
        -> Result<Option<Dataset>, Self::StorageError>;
}

/// Storage provider for work package records.
///
/// Records are written once on creation and only read afterwards; expiry
/// is derived from the stored `expires` instant, never written back.
#[async_trait]
pub trait WorkPackageStorageProvider: Send + Sync + 'static {
    type StorageError: Error + Debug + Send + Sync + 'static;

    /// Persist a freshly created work package.
    async fn insert_work_package(&self, work_package: WorkPackage)
        -> Result<(), Self::StorageError>;

    /// Load the work package with the given id, if it exists.
    async fn load_work_package(
        &self,
        id: &WorkPackageId,
    ) -> Result<Option<WorkPackage>, Self::StorageError>;
}
