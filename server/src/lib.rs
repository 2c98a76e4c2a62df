// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Server that makes the work package logic implemented in the backend
//! available via a REST API.

use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web::{self, Data};
use actix_web::{App, HttpResponse, HttpServer, Responder};
use tracing_actix_web::TracingLogger;

use wpsbackend::access::AccessProvider;
use wpsbackend::auth::IdentityVerifier;
use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::WorkPackageRepository;

pub mod access_provider;
pub mod configurations;
pub mod endpoints;
pub mod event_source;
pub mod storage_provider;
pub mod telemetry;

use endpoints::{
    datasets, work_packages, ENDPOINT_HEALTH, ENDPOINT_USER_DATASETS, ENDPOINT_WORK_ORDER_TOKENS,
    ENDPOINT_WORK_PACKAGE, ENDPOINT_WORK_PACKAGES,
};

/// Used to test if this service is alive.
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "OK"}))
}

/// Body deserialization failures surface as 422, matching the validation
/// behavior of the other response codes.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|error, _request| {
        actix_web::error::InternalError::from_response(
            error,
            HttpResponse::UnprocessableEntity().json("Validation error in submitted data"),
        )
        .into()
    })
}

/// Register all routes and shared state of the service.
///
/// Factored out of [`run`] so that tests can drive the same application
/// wiring without binding a listener.
pub fn configure_app<Ds, Ws, Ap>(
    repository: Data<WorkPackageRepository<Ds, Ws, Ap>>,
    verifier: Data<IdentityVerifier>,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    move |app| {
        app.app_data(json_config())
            .app_data(repository)
            .app_data(verifier)
            .route(ENDPOINT_HEALTH, web::get().to(health))
            .route(
                ENDPOINT_WORK_PACKAGES,
                web::post().to(work_packages::create_work_package::<Ds, Ws, Ap>),
            )
            .route(
                ENDPOINT_WORK_PACKAGE,
                web::get().to(work_packages::get_work_package::<Ds, Ws, Ap>),
            )
            .route(
                ENDPOINT_WORK_ORDER_TOKENS,
                web::post().to(work_packages::create_work_order_token::<Ds, Ws, Ap>),
            )
            .route(
                ENDPOINT_USER_DATASETS,
                web::get().to(datasets::get_datasets::<Ds, Ws, Ap>),
            );
    }
}

pub struct ServerRunParams<Ds, Ws, Ap> {
    pub listener: TcpListener,
    pub repository: WorkPackageRepository<Ds, Ws, Ap>,
    pub verifier: IdentityVerifier,
}

/// Configure and run the server application.
pub fn run<Ds, Ws, Ap>(
    ServerRunParams {
        listener,
        repository,
        verifier,
    }: ServerRunParams<Ds, Ws, Ap>,
) -> std::io::Result<Server>
where
    Ds: DatasetStorageProvider,
    Ws: WorkPackageStorageProvider,
    Ap: AccessProvider,
{
    let repository = Data::new(repository);
    let verifier = Data::new(verifier);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(configure_app(repository.clone(), verifier.clone()))
    })
    .listen(listener)?
    .run();
    Ok(server)
}
