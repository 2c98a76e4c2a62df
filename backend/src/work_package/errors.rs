// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use wpstypes::crypto::InvalidUserKeyError;

/// Errors of the work package lifecycle, already collapsed for the
/// boundary.
///
/// Every authentication and authorization failure is the same
/// [`AccessDenied`] so that callers cannot distinguish a missing work
/// package from a wrong token, a revoked permission or an expired window.
#[derive(Debug, Error)]
pub enum WorkPackageError {
    /// Authorization was refused. Maps to HTTP 403.
    #[error("Not authorized")]
    AccessDenied,
    /// The caller's public Crypt4GH key is malformed. Maps to HTTP 422.
    #[error(transparent)]
    InvalidUserKey(#[from] InvalidUserKeyError),
    /// A store or access API failure. Maps to HTTP 500; the correlation
    /// id also appears in the log.
    #[error("Internal error (correlation id {0})")]
    Internal(Uuid),
}

impl WorkPackageError {
    /// Log the underlying failure under a fresh correlation id and return
    /// the opaque internal error.
    pub(crate) fn internal(source: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4();
        error!(%correlation_id, %source, "Internal error in the work package repository");
        Self::Internal(correlation_id)
    }
}
