// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoints for creating work packages, reading their details and minting
//! work order tokens.

use actix_web::web::{self, Data};
use actix_web::{HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use wpsbackend::access::AccessProvider;
use wpsbackend::auth::IdentityVerifier;
use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::{WorkPackageCreationData, WorkPackageRepository};
use wpstypes::identifiers::WorkPackageId;

use super::{bearer_token, error_response, forbidden};

#[derive(Serialize)]
struct WorkOrderTokenResponse {
    /// The signed work order token, encrypted with the user's public
    /// Crypt4GH key.
    token: String,
}

/// Create a work package using an internal auth token with a user context.
#[tracing::instrument(name = "Create work package", skip_all)]
pub(crate) async fn create_work_package<Ds, Ws, Ap>(
    creation_data: web::Json<WorkPackageCreationData>,
    repository: Data<WorkPackageRepository<Ds, Ws, Ap>>,
    verifier: Data<IdentityVerifier>,
    request: HttpRequest,
) -> impl Responder
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    let Some(assertion) = bearer_token(&request) else {
        return forbidden();
    };
    let Ok(user) = verifier.verify(assertion) else {
        return forbidden();
    };
    match repository.create(creation_data.into_inner(), &user).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(error) => error_response(error),
    }
}

/// Get work package details using a work package access token.
#[tracing::instrument(name = "Get work package", skip_all)]
pub(crate) async fn get_work_package<Ds, Ws, Ap>(
    work_package_id: web::Path<String>,
    repository: Data<WorkPackageRepository<Ds, Ws, Ap>>,
    request: HttpRequest,
) -> impl Responder
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    let Some(access_token) = bearer_token(&request) else {
        return forbidden();
    };
    let Ok(work_package_id) = work_package_id.parse::<WorkPackageId>() else {
        return forbidden();
    };
    match repository.get_details(&work_package_id, access_token).await {
        Ok(details) => HttpResponse::Ok().json(details),
        Err(error) => error_response(error),
    }
}

/// Create an encrypted work order token using a work package access token.
#[tracing::instrument(name = "Create work order token", skip_all)]
pub(crate) async fn create_work_order_token<Ds, Ws, Ap>(
    path: web::Path<(String, String)>,
    repository: Data<WorkPackageRepository<Ds, Ws, Ap>>,
    request: HttpRequest,
) -> impl Responder
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    let Some(access_token) = bearer_token(&request) else {
        return forbidden();
    };
    let (work_package_id, file_id) = path.into_inner();
    let Ok(work_package_id) = work_package_id.parse::<WorkPackageId>() else {
        return forbidden();
    };
    match repository
        .create_work_order_token(&work_package_id, &file_id, access_token)
        .await
    {
        Ok(token) => HttpResponse::Created().json(WorkOrderTokenResponse { token }),
        Err(error) => error_response(error),
    }
}
