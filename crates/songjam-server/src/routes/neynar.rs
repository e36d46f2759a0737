use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use songjam_upstream::neynar::{DEFAULT_BEST_FRIENDS_LIMIT, DEFAULT_DISTRIBUTION_TOTAL};
use songjam_upstream::{distribute, Allocation, BestFriend, CastRequest, ReactionType};

use super::required;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CastBody {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub embeds: Option<Vec<Value>>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionBody {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    /// Cast hash or URL.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowBody {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    #[serde(default)]
    pub target_fid: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    #[serde(default)]
    pub fids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub fid: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BestFriendsQuery {
    pub fid: Option<String>,
    pub limit: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BestFriendsResponse {
    pub fid: u64,
    pub total: u64,
    pub friends: Vec<BestFriend>,
    pub distribution: Vec<Allocation>,
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ApiResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{name} must be a positive integer")))
}

/// `POST /api/neynar/cast`
pub async fn cast(State(state): State<AppState>, ApiJson(body): ApiJson<CastBody>) -> ApiResult<Json<Value>> {
    let (Some(signer_uuid), Some(text)) = (required(&body.signer_uuid), required(&body.text)) else {
        return Err(ApiError::bad_request("signer_uuid and text are required"));
    };
    let cast = CastRequest {
        signer_uuid: signer_uuid.to_string(),
        text: text.to_string(),
        embeds: body.embeds,
        parent: body.parent,
        channel_id: body.channel_id,
    };
    Ok(Json(state.clients.neynar.publish_cast(&cast).await?))
}

/// `POST /api/neynar/like`
pub async fn like(state: State<AppState>, body: ApiJson<ReactionBody>) -> ApiResult<Json<Value>> {
    react(state, body, ReactionType::Like).await
}

/// `POST /api/neynar/recast`
pub async fn recast(state: State<AppState>, body: ApiJson<ReactionBody>) -> ApiResult<Json<Value>> {
    react(state, body, ReactionType::Recast).await
}

async fn react(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ReactionBody>,
    reaction: ReactionType,
) -> ApiResult<Json<Value>> {
    let (Some(signer_uuid), Some(target)) = (required(&body.signer_uuid), required(&body.target)) else {
        return Err(ApiError::bad_request("signer_uuid and target are required"));
    };
    Ok(Json(state.clients.neynar.react(signer_uuid, reaction, target).await?))
}

/// `POST /api/neynar/follow`
pub async fn follow(State(state): State<AppState>, ApiJson(body): ApiJson<FollowBody>) -> ApiResult<Json<Value>> {
    let (Some(signer_uuid), Some(target_fid)) = (required(&body.signer_uuid), body.target_fid) else {
        return Err(ApiError::bad_request("signer_uuid and target_fid are required"));
    };
    Ok(Json(state.clients.neynar.follow(signer_uuid, target_fid).await?))
}

/// `GET /api/neynar/user?fid=` or `?username=`. `fid` wins when both are given.
pub async fn user(State(state): State<AppState>, Query(query): Query<UserQuery>) -> ApiResult<Json<Value>> {
    let neynar = &state.clients.neynar;
    let user = match (required(&query.fid), required(&query.username)) {
        (Some(fid), _) => neynar.user_by_fid(parse_number("fid", fid)?).await?,
        (None, Some(username)) => neynar.user_by_username(username.trim_start_matches('@')).await?,
        (None, None) => return Err(ApiError::bad_request("fid or username is required")),
    };
    Ok(Json(user))
}

/// `POST /api/neynar/users/bulk`
pub async fn users_bulk(State(state): State<AppState>, ApiJson(body): ApiJson<BulkBody>) -> ApiResult<Json<Value>> {
    let fids = body.fids.ok_or_else(|| ApiError::bad_request("fids is required"))?;
    Ok(Json(state.clients.neynar.users_bulk(&fids).await?))
}

/// `GET /api/neynar/best-friends?fid=&limit=&total=`: best friends plus a
/// score-weighted split of `total` units across them.
pub async fn best_friends(
    State(state): State<AppState>,
    Query(query): Query<BestFriendsQuery>,
) -> ApiResult<Json<BestFriendsResponse>> {
    let fid: u64 = match required(&query.fid) {
        Some(fid) => parse_number("fid", fid)?,
        None => return Err(ApiError::bad_request("fid is required")),
    };
    let limit = match required(&query.limit) {
        Some(limit) => parse_number("limit", limit)?,
        None => DEFAULT_BEST_FRIENDS_LIMIT,
    };
    let total = match required(&query.total) {
        Some(total) => parse_number("total", total)?,
        None => DEFAULT_DISTRIBUTION_TOTAL,
    };

    let friends = state.clients.neynar.best_friends(fid, limit).await?;
    let distribution = distribute(&friends, total);
    Ok(Json(BestFriendsResponse {
        fid,
        total,
        friends,
        distribution,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{call, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn follow_without_target_is_400() {
        let app = TestApp::new().await;
        let (status, body) = call(&app.router(), "POST", "/api/neynar/follow", Some(json!({"signer_uuid": "abc"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "signer_uuid and target_fid are required"}));
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn follow_forwards_target_fids() {
        let app = TestApp::new().await;
        Mock::given(method("POST"))
            .and(path("/neynar/farcaster/user/follow"))
            .and(header("x-api-key", "test-neynar_api_key"))
            .and(body_json(json!({"signer_uuid": "abc", "target_fids": [3]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, body) = call(
            &app.router(),
            "POST",
            "/api/neynar/follow",
            Some(json!({"signer_uuid": "abc", "target_fid": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn cast_missing_key_is_500() {
        let app = TestApp::without_credentials().await;
        let (status, body) = call(
            &app.router(),
            "POST",
            "/api/neynar/cast",
            Some(json!({"signer_uuid": "abc", "text": "gm"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("NEYNAR_API_KEY"));
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recast_sends_reaction_type() {
        let app = TestApp::new().await;
        Mock::given(method("POST"))
            .and(path("/neynar/farcaster/reaction"))
            .and(body_json(json!({"signer_uuid": "abc", "reaction_type": "recast", "target": "0xcast"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, _) = call(
            &app.router(),
            "POST",
            "/api/neynar/recast",
            Some(json!({"signer_uuid": "abc", "target": "0xcast"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn user_lookup_needs_fid_or_username() {
        let app = TestApp::new().await;
        let (status, body) = call(&app.router(), "GET", "/api/neynar/user", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fid or username is required");

        let (status, body) = call(&app.router(), "GET", "/api/neynar/user?fid=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fid must be a positive integer");
    }

    #[tokio::test]
    async fn user_lookup_by_username_strips_at() {
        let app = TestApp::new().await;
        Mock::given(method("GET"))
            .and(path("/neynar/farcaster/user/by_username"))
            .and(query_param("username", "dwr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"fid": 3}})))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, body) = call(&app.router(), "GET", "/api/neynar/user?username=@dwr", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["fid"], 3);
    }

    #[tokio::test]
    async fn bulk_rejects_empty_list() {
        let app = TestApp::new().await;
        let (status, _) = call(&app.router(), "POST", "/api/neynar/users/bulk", Some(json!({"fids": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(&app.router(), "POST", "/api/neynar/users/bulk", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fids is required");
    }

    #[tokio::test]
    async fn best_friends_includes_distribution() {
        let app = TestApp::new().await;
        Mock::given(method("GET"))
            .and(path("/neynar/farcaster/user/best_friends"))
            .and(query_param("fid", "3"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {"fid": 10, "username": "a", "mutual_affinity_score": 3.0},
                    {"fid": 11, "username": "b", "mutual_affinity_score": 1.0},
                ]
            })))
            .expect(1)
            .mount(&app.upstream)
            .await;

        let (status, body) = call(&app.router(), "GET", "/api/neynar/best-friends?fid=3&total=100", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 100);
        assert_eq!(body["friends"].as_array().unwrap().len(), 2);
        assert_eq!(body["distribution"][0]["fid"], 10);
        assert_eq!(body["distribution"][0]["amount"], 75);
        assert_eq!(body["distribution"][1]["amount"], 25);
    }

    #[tokio::test]
    async fn upstream_404_passes_through() {
        let app = TestApp::new().await;
        Mock::given(method("GET"))
            .and(path("/neynar/farcaster/user/bulk"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
            .mount(&app.upstream)
            .await;

        let (status, body) = call(&app.router(), "GET", "/api/neynar/user?fid=999999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["details"]["message"], "not found");
    }

    #[tokio::test]
    async fn missing_required_fields_never_reach_neynar() {
        let app = TestApp::new().await;
        let router = app.router();
        let cases = [
            ("POST", "/api/neynar/cast", Some(json!({"signer_uuid": "abc"})), "signer_uuid and text are required"),
            ("POST", "/api/neynar/cast", Some(json!({"signer_uuid": "abc", "text": "  "})), "signer_uuid and text are required"),
            ("POST", "/api/neynar/like", Some(json!({"signer_uuid": "abc"})), "signer_uuid and target are required"),
            ("POST", "/api/neynar/recast", Some(json!({"target": "0xcast"})), "signer_uuid and target are required"),
            ("GET", "/api/neynar/best-friends", None, "fid is required"),
            ("GET", "/api/neynar/best-friends?limit=5", None, "fid is required"),
        ];

        for (method, uri, body, message) in cases {
            let (status, response) = call(&router, method, uri, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(response["error"], message, "{method} {uri}");
        }
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_500_on_every_neynar_route() {
        let app = TestApp::without_credentials().await;
        let router = app.router();
        let cases = [
            ("POST", "/api/neynar/like", Some(json!({"signer_uuid": "abc", "target": "0xcast"}))),
            ("POST", "/api/neynar/recast", Some(json!({"signer_uuid": "abc", "target": "0xcast"}))),
            ("POST", "/api/neynar/follow", Some(json!({"signer_uuid": "abc", "target_fid": 3}))),
            ("GET", "/api/neynar/user?fid=3", None),
            ("GET", "/api/neynar/user?username=dwr", None),
            ("POST", "/api/neynar/users/bulk", Some(json!({"fids": [3, 5]}))),
            ("GET", "/api/neynar/best-friends?fid=3", None),
        ];

        for (method, uri, body) in cases {
            let (status, response) = call(&router, method, uri, body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{method} {uri}");
            assert!(
                response["error"].as_str().unwrap().contains("NEYNAR_API_KEY"),
                "{method} {uri}: {response}"
            );
        }
        assert!(app.upstream.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn best_friends_splits_largest_total() {
        let app = TestApp::new().await;
        Mock::given(method("GET"))
            .and(path("/neynar/farcaster/user/best_friends"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {"fid": 10, "username": "a", "mutual_affinity_score": 1.0},
                    {"fid": 11, "username": "b", "mutual_affinity_score": 1.0},
                ]
            })))
            .mount(&app.upstream)
            .await;

        let uri = format!("/api/neynar/best-friends?fid=3&total={}", u64::MAX);
        let (status, body) = call(&app.router(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let sum: u128 = body["distribution"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| u128::from(a["amount"].as_u64().unwrap()))
            .sum();
        assert_eq!(sum, u128::from(u64::MAX));
    }
}
