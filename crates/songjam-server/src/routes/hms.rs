use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use songjam_upstream::HmsToken;

use super::required;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// `POST /api/hms/token`: app token for a room, creating the room if needed.
pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenBody>,
) -> ApiResult<Json<HmsToken>> {
    let (Some(user_id), Some(role)) = (required(&body.user_id), required(&body.role)) else {
        return Err(ApiError::bad_request("user_id and role are required"));
    };
    let token = state
        .clients
        .hms
        .issue_token(required(&body.room_id), user_id, role)
        .await?;
    Ok(Json(token))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{call, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn missing_role_is_400() {
        let app = TestApp::new().await;
        let (status, body) = call(&app.router(), "POST", "/api/hms/token", Some(json!({"user_id": "u1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "user_id and role are required");
    }

    #[tokio::test]
    async fn missing_credentials_is_500_without_upstream_call() {
        let app = TestApp::without_credentials().await;
        let (status, body) = call(
            &app.router(),
            "POST",
            "/api/hms/token",
            Some(json!({"user_id": "u1", "role": "host"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("HMS_ACCESS_KEY"));
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn creates_room_when_none_given() {
        let app = TestApp::new().await;
        Mock::given(method("POST"))
            .and(path("/hms/rooms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "room-9"})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, body) = call(
            &app.router(),
            "POST",
            "/api/hms/token",
            Some(json!({"user_id": "u1", "role": "host"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room_id"], "room-9");
        assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    }

    #[tokio::test]
    async fn existing_room_skips_upstream() {
        let app = TestApp::new().await;
        let (status, body) = call(
            &app.router(),
            "POST",
            "/api/hms/token",
            Some(json!({"room_id": "room-1", "user_id": "u1", "role": "listener"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room_id"], "room-1");
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }
}
