//! Mock virtual data container.
//!
//! Serves `GET /ask` with either a canned message or the first `msg` value returned by
//! the DAL query service, and mirrors request activity to an optional log collector.

pub mod config;
pub mod dal;
pub mod emitter;
pub mod errors;
pub mod metrics_defs;
pub mod service;
pub mod upstream;

#[cfg(test)]
mod testutils;

use errors::VdcError;
use service::{VdcServer, VdcService};
use std::future::Future;
use tokio::net::TcpListener;

/// Validates `config`, connects to the DAL if configured, and serves until `shutdown`
/// resolves.
///
/// A DAL that cannot be reached is reported before the listener is bound.
pub async fn run<F>(config: config::Config, shutdown: F) -> Result<(), VdcError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let server = VdcServer::from_config(&config).await?;

    println!("started mock-vdc running at {}", config.listener.port);
    shared::http::run_http_service(
        &config.listener.host,
        config.listener.port,
        VdcService::new(server),
        shutdown,
    )
    .await?;

    tracing::info!("mock-vdc stopped");
    Ok(())
}

/// Serves an already built server on a bound listener.
pub async fn serve<F>(
    listener: TcpListener,
    server: VdcServer,
    shutdown: F,
) -> Result<(), VdcError>
where
    F: Future<Output = ()>,
{
    shared::http::serve(listener, VdcService::new(server), shutdown).await
}
