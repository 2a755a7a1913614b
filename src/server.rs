//! HTTP trigger: every request to `/` runs the transfer once

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use axum::{extract::State, http::StatusCode, routing::any, Router};
use tracing::{error, info};

use crate::job::{HttpTransferJob, JobOutcome};

pub fn router(job: Arc<HttpTransferJob>) -> Router {
    Router::new().route("/", any(trigger)).with_state(job)
}

async fn trigger(State(job): State<Arc<HttpTransferJob>>) -> (StatusCode, String) {
    let result = tokio::task::spawn_blocking(move || job.run()).await;

    match result {
        Ok(Ok(outcome)) => respond(outcome),
        Ok(Err(e)) => {
            error!(error = %e, "transfer failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "transfer task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_owned(),
            )
        }
    }
}

fn respond(outcome: JobOutcome) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, outcome.message)
}

/// Resolves once `signal` fires. If the handler could not be installed the
/// server keeps running until the process is killed.
async fn until_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "could not listen for ctrl-c, serving until terminated");
        std::future::pending::<()>().await;
    }
}

pub async fn serve(addr: SocketAddr, job: Arc<HttpTransferJob>) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening for triggers");

    axum::serve(listener, router(job))
        .with_graceful_shutdown(until_signal(tokio::signal::ctrl_c()))
        .await
}
