// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The service's entrypoints: one process serves the REST API, a second
//! drains the dataset change stream into the projection.

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;

use wpsbackend::auth::IdentityVerifier;
use wpsbackend::dataset_events::{run_dataset_event_loop, DatasetEventTranslator};
use wpsbackend::work_package::WorkPackageRepository;
use wpsserver::access_provider::HttpAccessProvider;
use wpsserver::configurations::{get_configuration, DatabaseSettings, Settings};
use wpsserver::event_source::JsonLinesEventSource;
use wpsserver::storage_provider::postgres::PostgresStorageProvider;
use wpsserver::telemetry::{get_subscriber, init_subscriber};
use wpsserver::{run, ServerRunParams};
use wpstypes::crypto::signing::SigningKey;

#[derive(Parser)]
#[command(name = "wps", version, about = "Work package service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API.
    RunRest,
    /// Drain dataset change events into the projection.
    ///
    /// Events arrive as newline-delimited JSON records
    /// `{"topic": ..., "type": ..., "payload": ...}` on stdin, e.g. from a
    /// bus consumer bridge piping the configured topic.
    ConsumeEvents {
        /// Read the records from this file instead of stdin.
        #[arg(long)]
        events_file: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = get_configuration("server/").context("Could not load configuration")?;

    let subscriber = get_subscriber(
        format!(
            "{}.{}",
            configuration.application.service_name, configuration.application.service_instance_id
        ),
        &configuration.application.log_level,
        std::io::stdout,
    );
    init_subscriber(subscriber);

    match cli.command.unwrap_or(Command::RunRest) {
        Command::RunRest => run_rest(configuration).await,
        Command::ConsumeEvents { events_file } => consume_events(configuration, events_file).await,
    }
}

/// Connect to the database, retrying each second while postgres comes up.
async fn connect_with_retry(settings: &DatabaseSettings) -> anyhow::Result<PostgresStorageProvider> {
    tracing::info!("Connecting to postgres server at {}.", settings.host);
    let mut counter = 0;
    loop {
        match PostgresStorageProvider::connect(settings).await {
            Ok(storage) => return Ok(storage),
            Err(error) => {
                counter += 1;
                if counter > 10 {
                    anyhow::bail!("Database not ready after 10 seconds: {error}");
                }
                tracing::info!(%error, "Failed to connect to postgres server");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn run_rest(configuration: Settings) -> anyhow::Result<()> {
    tracing::info!(
        service_instance_id = %configuration.application.service_instance_id,
        "Starting work package service"
    );
    let storage = connect_with_retry(&configuration.database).await?;

    let signing_key = SigningKey::from_jwk(
        configuration
            .work_packages
            .work_package_signing_key
            .expose_secret(),
    )
    .context("Invalid work package signing key")?;
    let verifier =
        IdentityVerifier::new(&configuration.auth).context("Invalid auth configuration")?;
    let access = HttpAccessProvider::new(&configuration.access)
        .context("Could not build the access API client")?;
    let repository = WorkPackageRepository::new(
        signing_key,
        configuration.work_packages.work_package_valid_days,
        storage.clone(),
        storage,
        access,
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind to {address}"))?;
    tracing::info!(%address, "Starting server");
    run(ServerRunParams {
        listener,
        repository,
        verifier,
    })?
    .await?;
    Ok(())
}

async fn consume_events(
    configuration: Settings,
    events_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let storage = connect_with_retry(&configuration.database).await?;
    let topic = configuration.events.dataset_change_topic.clone();
    let translator = DatasetEventTranslator::new(configuration.events, storage);
    tracing::info!(%topic, "Consuming dataset change events");

    match events_file {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Could not open {}", path.display()))?;
            run_dataset_event_loop(JsonLinesEventSource::new(file, topic), &translator).await?;
        }
        None => {
            let stdin = tokio::io::stdin();
            run_dataset_event_loop(JsonLinesEventSource::new(stdin, topic), &translator).await?;
        }
    }
    tracing::info!("Event stream ended");
    Ok(())
}
