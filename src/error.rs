//! Error types for every stage of the transfer

use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of characters of an upstream body kept in messages
pub const BODY_SNIPPET_CHARS: usize = 500;

/// Returns at most [BODY_SNIPPET_CHARS] characters of `body`
pub fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("could not reach the secret store: {0}")]
    Http(#[from] reqwest::Error),
    #[error("secret store answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("secret version has no payload")]
    NoPayload,
    #[error("secret payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("secret payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("secret payload is not a service account key: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not sign the token request: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("could not reach the token endpoint: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint answered {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("spreadsheet authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("could not reach the spreadsheet API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("spreadsheet API answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid spreadsheet API url: {0}")]
    Url(#[from] url::ParseError),
    #[error("spreadsheet {0} has no worksheets")]
    NoWorksheet(String),
}

/// Failures of the commissions request.
///
/// `Status` and `Parse` are answered with a 500 outcome by the job,
/// `Transport` is fatal.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not reach the commissions API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("commissions API answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("commissions API returned invalid JSON: {body}")]
    Parse { body: String },
}

/// Errors which abort a run without producing an outcome
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("credential resolution failed: {0}")]
    Secret(#[from] SecretError),
    #[error("{0} has no previous day")]
    NoPreviousDay(NaiveDate),
    #[error("commissions request failed: {0}")]
    Transport(reqwest::Error),
    #[error("spreadsheet write failed: {0}")]
    Sheets(#[from] SheetsError),
    #[error("trigger server failed: {0}")]
    Serve(#[from] std::io::Error),
}
