// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The work package repository, which sequences every operation of the
//! service: authenticate, authorize, read the projection, mint and
//! encrypt tokens, persist the verifier-only record.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use wpstypes::crypto::seal::UserPublicKey;
use wpstypes::crypto::signing::SigningKey;
use wpstypes::dataset::Dataset;
use wpstypes::identifiers::WorkPackageId;
use wpstypes::time::TimeStamp;
use wpstypes::tokens::{AccessToken, WorkOrderToken};

use crate::access::AccessProvider;
use crate::auth::UserContext;
use crate::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};

use super::{
    WorkPackage, WorkPackageCreationData, WorkPackageCreationResponse, WorkPackageDetails,
    WorkPackageError,
};

/// The repository for work packages.
pub struct WorkPackageRepository<Ds, Ws, Ap> {
    signing_key: SigningKey,
    valid_days: i64,
    datasets: Ds,
    work_packages: Ws,
    access: Ap,
}

impl<Ds, Ws, Ap> WorkPackageRepository<Ds, Ws, Ap>
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    pub fn new(
        signing_key: SigningKey,
        valid_days: i64,
        datasets: Ds,
        work_packages: Ws,
        access: Ap,
    ) -> Self {
        Self {
            signing_key,
            valid_days,
            datasets,
            work_packages,
            access,
        }
    }

    /// Create a work package for the authenticated user.
    ///
    /// Returns the work package id together with the access token,
    /// encrypted to the user's public Crypt4GH key. The token itself is
    /// not retained; only the fingerprint of its secret is persisted.
    pub async fn create(
        &self,
        creation_data: WorkPackageCreationData,
        user: &UserContext,
    ) -> Result<WorkPackageCreationResponse, WorkPackageError> {
        let user_public_key = UserPublicKey::parse(&creation_data.user_public_crypt4gh_key)?;

        let dataset_id = &creation_data.dataset_id;
        let work_type = creation_data.work_type;

        let dataset = self
            .datasets
            .load_dataset(dataset_id)
            .await
            .map_err(WorkPackageError::internal)?
            .ok_or_else(|| {
                // an unknown dataset is indistinguishable from a forbidden one
                info!(user_id = %user.id, %dataset_id, "Cannot determine dataset files");
                WorkPackageError::AccessDenied
            })?;

        let allowed = self
            .access
            .check_access(&user.id, dataset_id, work_type)
            .await
            .map_err(WorkPackageError::internal)?;
        if !allowed {
            info!(user_id = %user.id, %dataset_id, %work_type, "Missing dataset access permission");
            return Err(WorkPackageError::AccessDenied);
        }

        let file_ids = chosen_file_ids(&dataset, creation_data.file_ids.as_deref());
        if file_ids.is_empty() {
            info!(user_id = %user.id, %dataset_id, "No existing files have been specified");
            return Err(WorkPackageError::AccessDenied);
        }

        let id = WorkPackageId::random();
        let token = AccessToken::generate(id.clone());
        let validity = wpstypes::time::ValidityPeriod::starting_now(self.valid_days);

        let work_package = WorkPackage {
            id: id.clone(),
            dataset_id: dataset_id.clone(),
            work_type,
            user_id: user.id.clone(),
            user_public_crypt4gh_key: user_public_key.as_base64().to_owned(),
            full_user_name: user.full_name(),
            email: user.email.clone(),
            file_ids,
            token_hash: token.fingerprint(),
            created: validity.created,
            expires: validity.expires,
        };
        self.work_packages
            .insert_work_package(work_package)
            .await
            .map_err(WorkPackageError::internal)?;

        let encrypted_token = user_public_key
            .seal(token.to_string().as_bytes())
            .map_err(WorkPackageError::internal)?;
        info!(work_package_id = %id, user_id = %user.id, %dataset_id, "Created work package");
        Ok(WorkPackageCreationResponse {
            id,
            token: encrypted_token,
        })
    }

    /// Get the details of a work package, authenticated by its access
    /// token.
    ///
    /// File extensions are looked up against the current dataset
    /// projection; if the dataset has been deleted in the meantime, the
    /// known file ids are still returned with empty extensions.
    pub async fn get_details(
        &self,
        work_package_id: &WorkPackageId,
        presented_token: &str,
    ) -> Result<WorkPackageDetails, WorkPackageError> {
        let work_package = self
            .authorized_package(work_package_id, presented_token)
            .await?;

        let dataset = self
            .datasets
            .load_dataset(&work_package.dataset_id)
            .await
            .map_err(WorkPackageError::internal)?;
        let files: BTreeMap<String, String> = work_package
            .file_ids
            .iter()
            .map(|file_id| {
                let extension = dataset
                    .as_ref()
                    .and_then(|dataset| dataset.file_extension(file_id))
                    .unwrap_or_default();
                (file_id.clone(), extension.to_owned())
            })
            .collect();

        Ok(WorkPackageDetails {
            work_type: work_package.work_type,
            files,
            created: work_package.created,
            expires: work_package.expires,
        })
    }

    /// Mint a work order token for one file of a work package.
    ///
    /// The token is signed with the service key, encrypted to the user's
    /// public Crypt4GH key, and the grant is reported to the access API on
    /// a best-effort basis.
    pub async fn create_work_order_token(
        &self,
        work_package_id: &WorkPackageId,
        file_id: &str,
        presented_token: &str,
    ) -> Result<String, WorkPackageError> {
        let work_package = self
            .authorized_package(work_package_id, presented_token)
            .await?;

        if !work_package.file_ids.iter().any(|id| id == file_id) {
            info!(%work_package_id, file_id, "File is not contained in work package");
            return Err(WorkPackageError::AccessDenied);
        }

        let claims = WorkOrderToken::new(
            work_package.work_type,
            file_id.to_owned(),
            work_package.user_id.clone(),
            work_package.user_public_crypt4gh_key.clone(),
            work_package.full_user_name.clone(),
            work_package.email.clone(),
        );
        let signed = self
            .signing_key
            .sign(&claims)
            .map_err(WorkPackageError::internal)?;

        // the stored key was validated at creation time
        let user_public_key = UserPublicKey::parse(&work_package.user_public_crypt4gh_key)
            .map_err(WorkPackageError::internal)?;
        let encrypted = user_public_key
            .seal(signed.as_bytes())
            .map_err(WorkPackageError::internal)?;

        if let Err(error) = self
            .access
            .register_grant(&work_package.user_id, file_id, work_package.expires)
            .await
        {
            warn!(%error, %work_package_id, file_id, "Could not register work order grant");
        }

        info!(%work_package_id, file_id, "Created work order token");
        Ok(encrypted)
    }

    /// List the datasets accessible to the authenticated user.
    ///
    /// The order reported by the access API is preserved; datasets that
    /// are not (or no longer) in the projection are dropped.
    pub async fn list_user_datasets(
        &self,
        user: &UserContext,
        user_id: &str,
    ) -> Result<Vec<Dataset>, WorkPackageError> {
        if user.id != user_id {
            info!(user_id, asserted_id = %user.id, "Not authorized to list datasets");
            return Err(WorkPackageError::AccessDenied);
        }
        let dataset_ids = self
            .access
            .accessible_datasets(user_id)
            .await
            .map_err(WorkPackageError::internal)?;
        let mut datasets = Vec::with_capacity(dataset_ids.len());
        for dataset_id in dataset_ids {
            match self
                .datasets
                .load_dataset(&dataset_id)
                .await
                .map_err(WorkPackageError::internal)?
            {
                Some(dataset) => datasets.push(dataset),
                None => debug!(%dataset_id, "Accessible dataset not found in projection"),
            }
        }
        Ok(datasets)
    }

    /// Load a work package after checking the presented access token
    /// against the path, the stored fingerprint and the validity window.
    /// All failure modes are indistinguishable.
    async fn authorized_package(
        &self,
        work_package_id: &WorkPackageId,
        presented_token: &str,
    ) -> Result<WorkPackage, WorkPackageError> {
        let token = AccessToken::parse(presented_token).map_err(|_| {
            debug!("Presented access token is malformed");
            WorkPackageError::AccessDenied
        })?;
        if token.work_package_id() != work_package_id {
            debug!(%work_package_id, "Access token does not match the work package");
            return Err(WorkPackageError::AccessDenied);
        }
        let work_package = self
            .work_packages
            .load_work_package(work_package_id)
            .await
            .map_err(WorkPackageError::internal)?
            .ok_or_else(|| {
                debug!(%work_package_id, "Work package not found");
                WorkPackageError::AccessDenied
            })?;
        if token.fingerprint() != work_package.token_hash {
            debug!(%work_package_id, "Invalid work package access token");
            return Err(WorkPackageError::AccessDenied);
        }
        if !work_package.validity().contains(TimeStamp::now()) {
            debug!(%work_package_id, "Work package has expired");
            return Err(WorkPackageError::AccessDenied);
        }
        Ok(work_package)
    }
}

/// Resolve the caller's file selection against the dataset.
///
/// Without a selection, all dataset files are chosen in dataset order.
/// With a selection, caller order wins, duplicates collapse onto their
/// first occurrence and unknown ids are dropped.
fn chosen_file_ids(dataset: &Dataset, requested: Option<&[String]>) -> Vec<String> {
    match requested {
        None => dataset.files.iter().map(|file| file.id.clone()).collect(),
        Some(requested) => {
            let mut chosen: Vec<String> = Vec::with_capacity(requested.len());
            for file_id in requested {
                if dataset.file_extension(file_id).is_some() && !chosen.contains(file_id) {
                    chosen.push(file_id.clone());
                }
            }
            chosen
        }
    }
}
