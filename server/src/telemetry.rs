// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Tracing setup shared by the REST and event consumer processes.

use tracing::{subscriber::set_global_default, Subscriber};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// Infrastructure modules that are capped at info unless `RUST_LOG`
/// overrides the whole filter.
const CHATTY_MODULES: &[&str] = &[
    "actix_http",
    "actix_server",
    "hyper",
    "mio",
    "reqwest",
    "sqlx",
    "want",
];

/// Build a subscriber emitting bunyan-formatted JSON records.
///
/// The subscriber name and the default level come from the application
/// settings (`<service_name>.<service_instance_id>`), so records of all
/// replicas and processes stay distinguishable. Setting `RUST_LOG`
/// replaces the whole filter, including the chatty-module capping.
pub fn get_subscriber<Sink>(
    name: String,
    default_level: &str,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| silence_chatty_modules(EnvFilter::new(default_level)));
    let formatting_layer = BunyanFormattingLayer::new(name, sink);
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Keep service-level debug and trace output readable.
fn silence_chatty_modules(env_filter: EnvFilter) -> EnvFilter {
    CHATTY_MODULES.iter().fold(env_filter, |filter, module| {
        filter.add_directive(
            format!("{module}=info")
                .parse()
                .expect("directive is well-formed"),
        )
    })
}

/// Register a subscriber as global default to process span data.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    LogTracer::init().expect("Failed to set logger");
    set_global_default(subscriber).expect("Failed to set subscriber");
}
