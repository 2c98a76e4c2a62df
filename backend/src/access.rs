// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The narrow interface to the external access API, which decides whether
//! a user may download or upload a dataset.

use async_trait::async_trait;
use thiserror::Error;

use wpstypes::dataset::WorkType;
use wpstypes::time::TimeStamp;

/// The access check failed without producing a result.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Could not reach the access API: {0}")]
    Transport(String),
    #[error("Unexpected response from the access API: {0}")]
    UnexpectedResponse(String),
}

/// A provider for access decisions on datasets.
#[async_trait]
pub trait AccessProvider: Send + Sync + 'static {
    /// Whether the given user may perform the given type of work on the
    /// given dataset.
    async fn check_access(
        &self,
        user_id: &str,
        dataset_id: &str,
        work_type: WorkType,
    ) -> Result<bool, AccessError>;

    /// All dataset ids the given user is allowed to download.
    async fn accessible_datasets(&self, user_id: &str) -> Result<Vec<String>, AccessError>;

    /// Notify the access API that a work order token was minted for the
    /// given file. Callers treat failures as non-fatal.
    async fn register_grant(
        &self,
        user_id: &str,
        file_id: &str,
        valid_until: TimeStamp,
    ) -> Result<(), AccessError>;
}
