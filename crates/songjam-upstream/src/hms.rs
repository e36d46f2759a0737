//! 100ms: room creation plus locally signed app/management tokens.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use songjam_core::errors::UpstreamError;
use songjam_core::security::SigningCredentials;

use crate::http::{join_url, HttpClient};

const SERVICE: &str = "hms";
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const MISSING_KEYS: &str = "HMS_ACCESS_KEY and HMS_SECRET";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HmsClaims {
    pub access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub token_type: String,
    pub version: u8,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issued app token and the room it is bound to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HmsToken {
    pub token: String,
    pub room_id: String,
}

#[derive(Clone)]
pub struct HmsClient {
    http: HttpClient,
    base_url: String,
    credentials: Option<SigningCredentials>,
    template_id: Option<String>,
}

impl HmsClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        credentials: Option<SigningCredentials>,
        template_id: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            template_id,
        }
    }

    fn credentials(&self) -> Result<&SigningCredentials, UpstreamError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| UpstreamError::missing_config(SERVICE, MISSING_KEYS))
    }

    fn sign(&self, mut claims: HmsClaims) -> Result<String, UpstreamError> {
        let creds = self.credentials()?;
        claims.access_key = creds.key.expose().to_string();
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(creds.secret.expose().as_bytes()),
        )
        .map_err(|e| UpstreamError::Signing(e.to_string()))
    }

    fn claims(token_type: &str) -> HmsClaims {
        let now = Utc::now().timestamp();
        HmsClaims {
            access_key: String::new(),
            room_id: None,
            user_id: None,
            role: None,
            token_type: token_type.to_string(),
            version: 2,
            iat: now,
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            jti: Uuid::now_v7().to_string(),
        }
    }

    /// Token for the 100ms REST API.
    pub fn management_token(&self) -> Result<String, UpstreamError> {
        self.sign(Self::claims("management"))
    }

    /// Token a client SDK uses to join `room_id` as `user_id` with `role`.
    pub fn app_token(&self, room_id: &str, user_id: &str, role: &str) -> Result<String, UpstreamError> {
        let mut claims = Self::claims("app");
        claims.room_id = Some(room_id.to_string());
        claims.user_id = Some(user_id.to_string());
        claims.role = Some(role.to_string());
        self.sign(claims)
    }

    /// Create a room from the configured template. Returns the upstream body.
    #[instrument(skip(self))]
    pub async fn create_room(&self, name: Option<&str>) -> Result<Value, UpstreamError> {
        let token = self.management_token()?;
        let mut body = json!({});
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if let Some(template_id) = &self.template_id {
            body["template_id"] = json!(template_id);
        }
        let request = self
            .http
            .post(&join_url(&self.base_url, "rooms"))
            .bearer_auth(token)
            .json(&body);
        self.http.send_json(SERVICE, request).await
    }

    /// App token for `room_id`, creating a room first when none is given.
    #[instrument(skip(self))]
    pub async fn issue_token(
        &self,
        room_id: Option<&str>,
        user_id: &str,
        role: &str,
    ) -> Result<HmsToken, UpstreamError> {
        // fail before creating a room we could not sign for
        self.credentials()?;

        let room_id = match room_id {
            Some(id) => id.to_string(),
            None => {
                let room = self.create_room(None).await?;
                let id = room["id"].as_str().ok_or_else(|| UpstreamError::Decode {
                    service: SERVICE,
                    detail: "room response has no id".into(),
                })?;
                info!(room_id = id, "created 100ms room");
                id.to_string()
            }
        };

        let token = self.app_token(&room_id, user_id, role)?;
        Ok(HmsToken { token, room_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use songjam_core::security::ApiKey;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> SigningCredentials {
        SigningCredentials {
            key: ApiKey::new("access-123"),
            secret: ApiKey::new("secret-456"),
        }
    }

    fn client(base: &str, credentials: Option<SigningCredentials>) -> HmsClient {
        HmsClient::new(
            HttpClient::new(Duration::from_secs(5)).unwrap(),
            base,
            credentials,
            Some("tmpl-1".into()),
        )
    }

    fn decode(token: &str) -> HmsClaims {
        jsonwebtoken::decode::<HmsClaims>(
            token,
            &DecodingKey::from_secret(b"secret-456"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims
    }

    #[test]
    fn app_token_claims() {
        let hms = client("http://unused", Some(creds()));
        let claims = decode(&hms.app_token("room-1", "user-1", "host").unwrap());
        assert_eq!(claims.access_key, "access-123");
        assert_eq!(claims.room_id.as_deref(), Some("room-1"));
        assert_eq!(claims.user_id.as_deref(), Some("user-1"));
        assert_eq!(claims.role.as_deref(), Some("host"));
        assert_eq!(claims.token_type, "app");
        assert_eq!(claims.version, 2);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn management_token_has_no_room() {
        let hms = client("http://unused", Some(creds()));
        let claims = decode(&hms.management_token().unwrap());
        assert_eq!(claims.token_type, "management");
        assert!(claims.room_id.is_none());
    }

    #[test]
    fn tokens_have_unique_jti() {
        let hms = client("http://unused", Some(creds()));
        let a = decode(&hms.management_token().unwrap());
        let b = decode(&hms.management_token().unwrap());
        assert_ne!(a.jti, b.jti);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_network() {
        let server = MockServer::start().await;
        let hms = client(&server.uri(), None);
        let err = hms.issue_token(None, "u", "host").await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingConfig { service: "hms", .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn creates_room_when_none_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .and(header_exists("authorization"))
            .and(body_partial_json(serde_json::json!({"template_id": "tmpl-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "room-new"})))
            .expect(1)
            .mount(&server)
            .await;

        let hms = client(&server.uri(), Some(creds()));
        let issued = hms.issue_token(None, "user-1", "speaker").await.unwrap();
        assert_eq!(issued.room_id, "room-new");
        assert_eq!(decode(&issued.token).room_id.as_deref(), Some("room-new"));
    }

    #[tokio::test]
    async fn existing_room_skips_creation() {
        let server = MockServer::start().await;
        let hms = client(&server.uri(), Some(creds()));
        let issued = hms.issue_token(Some("room-1"), "user-1", "listener").await.unwrap();
        assert_eq!(issued.room_id, "room-1");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn room_creation_failure_passes_status_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({"message": "forbidden"})))
            .mount(&server)
            .await;

        let hms = client(&server.uri(), Some(creds()));
        let err = hms.issue_token(None, "user-1", "host").await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(403));
    }
}
