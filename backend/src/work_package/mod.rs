// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Work package records, their request/response models and the repository
//! that manages their lifecycle.

mod errors;
mod repository;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wpstypes::dataset::WorkType;
use wpstypes::identifiers::WorkPackageId;
use wpstypes::time::{TimeStamp, ValidityPeriod};

pub use errors::WorkPackageError;
pub use repository::WorkPackageRepository;

/// A persisted work package.
///
/// The record never contains the access token itself, only the SHA-256
/// fingerprint of its secret. The file ids are a snapshot taken at
/// creation time; later changes to the dataset do not affect them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub id: WorkPackageId,
    pub dataset_id: String,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub user_id: String,
    /// The user's public Crypt4GH key in base64 encoding.
    pub user_public_crypt4gh_key: String,
    /// The user's full name including academic title.
    pub full_user_name: String,
    pub email: String,
    pub file_ids: Vec<String>,
    /// Hex SHA-256 of the access token secret.
    pub token_hash: String,
    pub created: TimeStamp,
    pub expires: TimeStamp,
}

impl WorkPackage {
    pub fn validity(&self) -> ValidityPeriod {
        ValidityPeriod {
            created: self.created,
            expires: self.expires,
        }
    }
}

/// All data necessary to create a work package.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkPackageCreationData {
    pub dataset_id: String,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    /// Ids of all included files. If omitted, all files of the dataset
    /// are assumed as target.
    #[serde(default)]
    pub file_ids: Option<Vec<String>>,
    /// The user's public Crypt4GH key in base64 encoding.
    pub user_public_crypt4gh_key: String,
}

/// Response when a work package has been created.
#[derive(Clone, Debug, Serialize)]
pub struct WorkPackageCreationResponse {
    /// Id of the work package.
    pub id: WorkPackageId,
    /// The access token, encrypted with the user's public Crypt4GH key.
    pub token: String,
}

/// Details about a work package that holders of its access token may
/// request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkPackageDetails {
    #[serde(rename = "type")]
    pub work_type: WorkType,
    /// Ids of all included files mapped to their file extensions.
    pub files: BTreeMap<String, String>,
    pub created: TimeStamp,
    pub expires: TimeStamp,
}
