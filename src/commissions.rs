//! Client for the CJ commission detail API

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::debug;

use crate::{
    data::{CommissionRecord, CommissionsResponse},
    error::{snippet, FetchError},
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait CommissionSource {
    /// Fetches the commissions whose event date is `date`
    fn fetch(&self, date: NaiveDate) -> Result<Vec<CommissionRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct CommissionsClient {
    http: Client,
    url: String,
    token: String,
}

impl CommissionsClient {
    pub fn new(http: Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            token: token.into(),
        }
    }
}

impl CommissionSource for CommissionsClient {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<CommissionRecord>, FetchError> {
        let date = date.format(DATE_FORMAT).to_string();
        debug!(url = %self.url, %date, "requesting commissions");

        let res = self
            .http
            .get(&self.url)
            .query(&[
                ("date-type", "event"),
                ("start-date", date.as_str()),
                ("end-date", date.as_str()),
            ])
            .bearer_auth(&self.token)
            .send()?;

        let status = res.status();
        let body = res.text()?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: snippet(&body),
            });
        }

        parse_commissions(&body)
    }
}

/// Parses a commissions body, keeping the records in the order received
pub fn parse_commissions(body: &str) -> Result<Vec<CommissionRecord>, FetchError> {
    serde_json::from_str::<CommissionsResponse>(body)
        .map(|res| res.commissions)
        .map_err(|_| FetchError::Parse {
            body: snippet(body),
        })
}
