//! OAuth2 JWT bearer flow for service accounts

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{snippet, AuthError},
    secrets::Credentials,
};

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signs the assertion exchanged for an access token
pub fn assertion(creds: &Credentials, now: i64) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = creds.key.private_key_id.clone();

    let claims = Claims {
        iss: &creds.key.client_email,
        scope: creds.scopes.join(" "),
        aud: &creds.key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(creds.key.private_key.as_bytes())?;
    Ok(encode(&header, &claims, &key)?)
}

/// Exchanges the credentials for a bearer token at their `token_uri`
pub fn access_token(http: &Client, creds: &Credentials) -> Result<String, AuthError> {
    let jwt = assertion(creds, Utc::now().timestamp())?;
    debug!(client = %creds.key.client_email, "exchanging service account assertion");

    let res = http
        .post(&creds.key.token_uri)
        .form(&[("grant_type", GRANT_TYPE), ("assertion", jwt.as_str())])
        .send()?;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().unwrap_or_default();
        return Err(AuthError::Status {
            status,
            body: snippet(&body),
        });
    }

    Ok(res.json::<TokenResponse>()?.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_private_key() {
        let creds =
            Credentials::from_json(r#"{"client_email":"a@b.iam","private_key":"not a pem"}"#)
                .unwrap();
        assert!(matches!(assertion(&creds, 0), Err(AuthError::Key(_))));
    }
}
