use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use songjam_core::errors::UpstreamError;
use songjam_core::security::SigningCredentials;

const SERVICE: &str = "stream";
const MISSING_KEYS: &str = "STREAM_API_KEY and STREAM_API_SECRET";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamClaims {
    pub user_id: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Token plus the public key a client SDK needs alongside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamToken {
    pub token: String,
    pub api_key: String,
    pub user_id: String,
}

/// Signs Stream user tokens locally; no network involved.
#[derive(Clone)]
pub struct StreamTokenIssuer {
    credentials: Option<SigningCredentials>,
}

impl StreamTokenIssuer {
    pub fn new(credentials: Option<SigningCredentials>) -> Self {
        Self { credentials }
    }

    pub fn user_token(&self, user_id: &str, ttl: Option<Duration>) -> Result<StreamToken, UpstreamError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| UpstreamError::missing_config(SERVICE, MISSING_KEYS))?;

        let now = Utc::now().timestamp();
        let claims = StreamClaims {
            user_id: user_id.to_string(),
            iat: now,
            exp: ttl.map(|ttl| now + ttl.as_secs() as i64),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(creds.secret.expose().as_bytes()),
        )
        .map_err(|e| UpstreamError::Signing(e.to_string()))?;

        Ok(StreamToken {
            token,
            api_key: creds.key.expose().to_string(),
            user_id: user_id.to_string(),
        })
    }
}
