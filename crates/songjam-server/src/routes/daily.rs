use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use songjam_upstream::DailyRoomRequest;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// `POST /api/daily/rooms`. The body is optional; an empty one creates a
/// public room with a generated name.
pub async fn create_room(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        DailyRoomRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("invalid room request: {e}")))?
    };
    let room = state.clients.daily.create_room(&request).await?;
    Ok(Json(room))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{call, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn empty_body_creates_public_room() {
        let app = TestApp::new().await;
        Mock::given(method("POST"))
            .and(path("/daily/rooms"))
            .and(header("authorization", "Bearer test-daily_api_key"))
            .and(body_json(json!({"privacy": "public"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "abc",
                "url": "https://songjam.daily.co/abc",
            })))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, body) = call(&app.router(), "POST", "/api/daily/rooms", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://songjam.daily.co/abc");
    }

    #[tokio::test]
    async fn upstream_error_passes_through() {
        let app = TestApp::new().await;
        Mock::given(method("POST"))
            .and(path("/daily/rooms"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"info": "name taken"})))
            .mount(&app.upstream)
            .await;

        let (status, body) = call(&app.router(), "POST", "/api/daily/rooms", Some(json!({"name": "taken"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["info"], "name taken");
    }

    #[tokio::test]
    async fn missing_key_is_500() {
        let app = TestApp::without_credentials().await;
        let (status, body) = call(&app.router(), "POST", "/api/daily/rooms", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("DAILY_API_KEY"));
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = TestApp::new().await;
        let (status, _) = call(&app.router(), "POST", "/api/daily/rooms", Some(json!({"privacy": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
