//! Service account credentials stored in GCP Secret Manager

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{snippet, SecretError};

/// Scopes granted to the spreadsheet credentials
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

/// The fields of a service account key file which are needed to authorize
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// A service account key restricted to a set of scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: ServiceAccountKey,
    pub scopes: Vec<&'static str>,
}

impl Credentials {
    pub fn from_json(payload: &str) -> Result<Self, SecretError> {
        let key: ServiceAccountKey = serde_json::from_str(payload)?;
        Ok(Self {
            key,
            scopes: SCOPES.to_vec(),
        })
    }
}

pub trait SecretStore {
    /// Returns the payload of the latest version of `secret_name`
    fn access_latest(&self, project_id: &str, secret_name: &str) -> Result<String, SecretError>;

    fn credentials(&self, project_id: &str, secret_name: &str) -> Result<Credentials, SecretError> {
        let payload = self.access_latest(project_id, secret_name)?;
        Credentials::from_json(&payload)
    }
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Secret Manager REST client, authorized as the runtime's default service account
#[derive(Debug, Clone)]
pub struct SecretManagerClient {
    http: Client,
    base_url: String,
    metadata_url: String,
}

impl SecretManagerClient {
    pub fn new(http: Client, base_url: impl Into<String>, metadata_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            metadata_url: metadata_url.into(),
        }
    }

    fn runtime_token(&self) -> Result<String, SecretError> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_url
        );
        let res = self.http.get(url).header("Metadata-Flavor", "Google").send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(SecretError::Status {
                status,
                body: snippet(&body),
            });
        }

        Ok(res.json::<MetadataToken>()?.access_token)
    }
}

impl SecretStore for SecretManagerClient {
    fn access_latest(&self, project_id: &str, secret_name: &str) -> Result<String, SecretError> {
        let name = format!("projects/{project_id}/secrets/{secret_name}/versions/latest");
        debug!(secret = %name, "reading secret");

        let token = self.runtime_token()?;
        let res = self
            .http
            .get(format!("{}/v1/{name}:access", self.base_url))
            .bearer_auth(token)
            .send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(SecretError::Status {
                status,
                body: snippet(&body),
            });
        }

        let data = res
            .json::<AccessResponse>()?
            .payload
            .and_then(|p| p.data)
            .ok_or(SecretError::NoPayload)?;

        Ok(String::from_utf8(STANDARD.decode(data)?)?)
    }
}
