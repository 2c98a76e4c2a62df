// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod datasets;
pub(crate) mod work_packages;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};

use wpsbackend::work_package::WorkPackageError;

/// Work package endpoints
pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_WORK_PACKAGES: &str = "/work-packages";
pub const ENDPOINT_WORK_PACKAGE: &str = "/work-packages/{work_package_id}";
pub const ENDPOINT_WORK_ORDER_TOKENS: &str =
    "/work-packages/{work_package_id}/files/{file_id}/work-order-tokens";

/// Dataset endpoints
pub const ENDPOINT_USER_DATASETS: &str = "/users/{user_id}/datasets";

/// The bearer token of the request, if one is present.
pub(crate) fn bearer_token(request: &HttpRequest) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Uniform response for refused authentication or authorization.
pub(crate) fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json("Not authorized")
}

/// Map repository errors onto the response contract: refusals become 403
/// without detail, a malformed user key 422, everything else 500.
pub(crate) fn error_response(error: WorkPackageError) -> HttpResponse {
    match &error {
        WorkPackageError::AccessDenied => forbidden(),
        WorkPackageError::InvalidUserKey(_) => {
            HttpResponse::UnprocessableEntity().json(error.to_string())
        }
        WorkPackageError::Internal(_) => {
            HttpResponse::InternalServerError().json(error.to_string())
        }
    }
}
