// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoint for listing the datasets accessible to a user.

use actix_web::web::{self, Data};
use actix_web::{HttpRequest, HttpResponse, Responder};

use wpsbackend::access::AccessProvider;
use wpsbackend::auth::IdentityVerifier;
use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::WorkPackageRepository;

use super::{bearer_token, error_response, forbidden};

/// Get details for all datasets accessible to the given user.
#[tracing::instrument(name = "List user datasets", skip_all)]
pub(crate) async fn get_datasets<Ds, Ws, Ap>(
    user_id: web::Path<String>,
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
    match repository.list_user_datasets(&user, &user_id).await {
        Ok(datasets) => HttpResponse::Ok().json(datasets),
        Err(error) => error_response(error),
    }
}
