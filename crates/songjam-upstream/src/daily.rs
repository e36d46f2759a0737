use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use songjam_core::errors::UpstreamError;
use songjam_core::security::ApiKey;
use songjam_core::services::{Room, RoomProvider};
use songjam_settings::credentials::DAILY_API_KEY;

use crate::http::{join_url, HttpClient};

const SERVICE: &str = "daily";

/// Body forwarded to Daily's `POST /rooms`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRoomRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Clone)]
pub struct DailyClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl DailyClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Create a room; rooms are public unless the caller says otherwise.
    #[instrument(skip(self, request))]
    pub async fn create_room(&self, request: &DailyRoomRequest) -> Result<Value, UpstreamError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| UpstreamError::missing_config(SERVICE, DAILY_API_KEY))?;

        let mut body = request.clone();
        if body.privacy.is_none() {
            body.privacy = Some("public".to_string());
        }

        let request = self
            .http
            .post(&join_url(&self.base_url, "rooms"))
            .bearer_auth(key.expose())
            .json(&body);
        self.http.send_json(SERVICE, request).await
    }
}

#[async_trait]
impl RoomProvider for DailyClient {
    async fn create_room(&self, name: Option<&str>) -> Result<Room, UpstreamError> {
        let body = DailyClient::create_room(
            self,
            &DailyRoomRequest {
                name: name.map(str::to_string),
                ..Default::default()
            },
        )
        .await?;

        let field = |key: &str| {
            body[key].as_str().map(str::to_string).ok_or_else(|| UpstreamError::Decode {
                service: SERVICE,
                detail: format!("room response has no {key}"),
            })
        };
        Ok(Room {
            name: field("name")?,
            url: field("url")?,
        })
    }
}
