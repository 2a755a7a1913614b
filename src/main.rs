use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cj_sheets::{
    config::{Endpoints, JobConfig},
    error::JobError,
    job::HttpTransferJob,
    server,
};

/// Copies yesterday's CJ commissions into a Google spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "cj-sheets")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// GCP project holding the credentials secret.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT", hide_env_values = true)]
    project_id: String,

    /// Name of the secret with the service account key.
    #[arg(long, env = "SECRET_NAME")]
    secret_name: String,

    /// Key of the destination spreadsheet.
    #[arg(long, env = "SHEET_ID")]
    sheet_id: String,

    /// Bearer token for the CJ commission API.
    #[arg(long, env = "CJ_API_KEY", hide_env_values = true)]
    api_token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the transfer once and print the result.
    Run,
    /// Listen for HTTP triggers, running the transfer on each request.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "cj-sheets failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, JobError> {
    let config = JobConfig::new(args.project_id, args.secret_name, args.sheet_id, args.api_token)?;
    info!(?config, "configuration loaded");

    // the blocking HTTP client is built outside of the async runtime
    let job = HttpTransferJob::from_config(config, &Endpoints::default())?;

    match args.command {
        Command::Run => {
            let outcome = job.run()?;
            println!("{}", outcome.message);
            Ok(if outcome.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Serve { port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let job = Arc::new(job);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(addr, Arc::clone(&job)))?;
            // the last handle on the blocking client goes away off the runtime
            drop(runtime);
            drop(job);
            Ok(ExitCode::SUCCESS)
        }
    }
}
