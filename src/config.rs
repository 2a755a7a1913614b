//! Settings for a transfer run

use crate::error::ConfigError;

pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const SECRET_NAME_ENV: &str = "SECRET_NAME";
pub const SHEET_ID_ENV: &str = "SHEET_ID";
pub const API_TOKEN_ENV: &str = "CJ_API_KEY";

const COMMISSIONS_URL: &str = "https://commission-detail.api.cj.com/v3/commissions";
const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
const SHEETS_URL: &str = "https://sheets.googleapis.com";
const METADATA_URL: &str = "http://metadata.google.internal";

/// The four settings a run needs. All of them are required.
#[derive(Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub project_id: String,
    pub secret_name: String,
    pub sheet_id: String,
    pub api_token: String,
}

impl JobConfig {
    pub fn new(
        project_id: impl Into<String>,
        secret_name: impl Into<String>,
        sheet_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: required(PROJECT_ENV, project_id.into())?,
            secret_name: required(SECRET_NAME_ENV, secret_name.into())?,
            sheet_id: required(SHEET_ID_ENV, sheet_id.into())?,
            api_token: required(API_TOKEN_ENV, api_token.into())?,
        })
    }
}

// the token must never end up in logs
impl std::fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobConfig")
            .field("project_id", &self.project_id)
            .field("secret_name", &self.secret_name)
            .field("sheet_id", &self.sheet_id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

fn required(name: &'static str, value: String) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.to_owned())
}

/// Base URLs of the remote services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub commissions: String,
    pub secret_manager: String,
    pub sheets: String,
    pub metadata: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            commissions: COMMISSIONS_URL.to_owned(),
            secret_manager: SECRET_MANAGER_URL.to_owned(),
            sheets: SHEETS_URL.to_owned(),
            metadata: METADATA_URL.to_owned(),
        }
    }
}

impl Endpoints {
    /// Points every service at `base`, used against mock servers
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            commissions: format!("{base}/v3/commissions"),
            secret_manager: base.to_owned(),
            sheets: base.to_owned(),
            metadata: base.to_owned(),
        }
    }
}
