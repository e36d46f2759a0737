//! Neynar (Farcaster) proxy calls and the best-friends allocation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use songjam_core::errors::UpstreamError;
use songjam_core::security::ApiKey;
use songjam_settings::credentials::NEYNAR_API_KEY;

use crate::http::{join_url, HttpClient};

const SERVICE: &str = "neynar";

pub const MAX_BULK_FIDS: usize = 100;
pub const DEFAULT_BEST_FRIENDS_LIMIT: u32 = 10;
/// Basis points shared out by [`distribute`] when the caller gives no total.
pub const DEFAULT_DISTRIBUTION_TOTAL: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Recast,
}

impl ReactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Recast => "recast",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CastRequest {
    pub signer_uuid: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Value>>,
    /// Hash or URL of the cast being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestFriend {
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub mutual_affinity_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub fid: u64,
    pub username: Option<String>,
    pub score: f64,
    pub amount: u64,
}

#[derive(Clone)]
pub struct NeynarClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl NeynarClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn key(&self) -> Result<&ApiKey, UpstreamError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| UpstreamError::missing_config(SERVICE, NEYNAR_API_KEY))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, UpstreamError> {
        let key = self.key()?;
        let request = self
            .http
            .post(&join_url(&self.base_url, path))
            .header("x-api-key", key.expose())
            .json(&body);
        self.http.send_json(SERVICE, request).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let key = self.key()?;
        let request = self
            .http
            .get(&join_url(&self.base_url, path))
            .header("x-api-key", key.expose())
            .query(query);
        self.http.send_json(SERVICE, request).await
    }

    #[instrument(skip(self, cast), fields(signer_uuid = %cast.signer_uuid))]
    pub async fn publish_cast(&self, cast: &CastRequest) -> Result<Value, UpstreamError> {
        let body = serde_json::to_value(cast).map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;
        self.post("farcaster/cast", body).await
    }

    /// Like or recast the cast identified by `target` (hash or URL).
    #[instrument(skip(self))]
    pub async fn react(&self, signer_uuid: &str, reaction: ReactionType, target: &str) -> Result<Value, UpstreamError> {
        self.post(
            "farcaster/reaction",
            json!({
                "signer_uuid": signer_uuid,
                "reaction_type": reaction.as_str(),
                "target": target,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn follow(&self, signer_uuid: &str, target_fid: u64) -> Result<Value, UpstreamError> {
        self.post(
            "farcaster/user/follow",
            json!({
                "signer_uuid": signer_uuid,
                "target_fids": [target_fid],
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn user_by_fid(&self, fid: u64) -> Result<Value, UpstreamError> {
        self.get("farcaster/user/bulk", &[("fids", fid.to_string())]).await
    }

    #[instrument(skip(self))]
    pub async fn user_by_username(&self, username: &str) -> Result<Value, UpstreamError> {
        self.get("farcaster/user/by_username", &[("username", username.to_string())])
            .await
    }

    /// Look up between 1 and [`MAX_BULK_FIDS`] users in one call.
    #[instrument(skip(self, fids), fields(count = fids.len()))]
    pub async fn users_bulk(&self, fids: &[u64]) -> Result<Value, UpstreamError> {
        if fids.is_empty() || fids.len() > MAX_BULK_FIDS {
            return Err(UpstreamError::InvalidRequest(format!(
                "fids must contain between 1 and {MAX_BULK_FIDS} entries"
            )));
        }
        let joined = fids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        self.get("farcaster/user/bulk", &[("fids", joined)]).await
    }

    #[instrument(skip(self))]
    pub async fn best_friends(&self, fid: u64, limit: u32) -> Result<Vec<BestFriend>, UpstreamError> {
        let body = self
            .get(
                "farcaster/user/best_friends",
                &[("fid", fid.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        let users = body.get("users").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(users).map_err(|e| UpstreamError::Decode {
            service: SERVICE,
            detail: e.to_string(),
        })
    }
}

/// Fixed-point scale for affinity weights.
const WEIGHT_SCALE: f64 = (1u64 << 52) as f64;

/// Split `total` units across friends in proportion to their affinity score.
///
/// Scores become fixed-point weights and shares are computed in `u128`, so
/// any `u64` total is exact. Each friend gets the floor of its share;
/// leftover units (fewer than the number of friends) go one at a time to
/// the highest scores, ties broken by lower fid. Friends with a
/// non-positive score get nothing and are left out. The amounts always sum
/// to `total` unless no friend qualifies.
pub fn distribute(friends: &[BestFriend], total: u64) -> Vec<Allocation> {
    let mut eligible: Vec<&BestFriend> = friends
        .iter()
        .filter(|f| f.mutual_affinity_score.is_finite() && f.mutual_affinity_score > 0.0)
        .collect();
    let Some(max) = eligible.iter().map(|f| f.mutual_affinity_score).reduce(f64::max) else {
        return Vec::new();
    };

    eligible.sort_by(|a, b| {
        b.mutual_affinity_score
            .partial_cmp(&a.mutual_affinity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.fid.cmp(&b.fid))
    });

    let weights: Vec<u128> = eligible
        .iter()
        .map(|f| (f.mutual_affinity_score / max * WEIGHT_SCALE).round() as u128)
        .collect();
    let weight_sum: u128 = weights.iter().sum();
    if weight_sum == 0 {
        return Vec::new();
    }

    let total_wide = u128::from(total);
    let mut allocations: Vec<Allocation> = eligible
        .iter()
        .zip(&weights)
        .map(|(f, weight)| Allocation {
            fid: f.fid,
            username: f.username.clone(),
            score: f.mutual_affinity_score,
            // share <= total, so the narrowing cannot fail
            amount: u64::try_from(total_wide * weight / weight_sum).unwrap_or(total),
        })
        .collect();

    let assigned: u128 = allocations.iter().map(|a| u128::from(a.amount)).sum();
    let remainder = usize::try_from(total_wide.saturating_sub(assigned)).unwrap_or(usize::MAX);
    for allocation in allocations.iter_mut().take(remainder) {
        allocation.amount += 1;
    }
    allocations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str, key: Option<&str>) -> NeynarClient {
        NeynarClient::new(
            HttpClient::new(Duration::from_secs(5)).unwrap(),
            base,
            key.map(ApiKey::new),
        )
    }

    fn friend(fid: u64, score: f64) -> BestFriend {
        BestFriend {
            fid,
            username: Some(format!("user{fid}")),
            mutual_affinity_score: score,
        }
    }

    #[test]
    fn distribution_sums_to_total() {
        let friends = vec![friend(1, 1.0), friend(2, 1.0), friend(3, 1.0)];
        let allocations = distribute(&friends, 10_000);
        assert_eq!(allocations.iter().map(|a| a.amount).sum::<u64>(), 10_000);
        // 3333 each, the spare unit goes to the lowest fid among equal scores
        assert_eq!(allocations[0].fid, 1);
        assert_eq!(allocations[0].amount, 3_334);
        assert_eq!(allocations[1].amount, 3_333);
    }

    #[test]
    fn distribution_is_proportional() {
        let friends = vec![friend(10, 3.0), friend(20, 1.0)];
        let allocations = distribute(&friends, 100);
        assert_eq!(allocations[0].fid, 10);
        assert_eq!(allocations[0].amount, 75);
        assert_eq!(allocations[1].amount, 25);
    }

    #[test]
    fn non_positive_scores_are_excluded() {
        let friends = vec![friend(1, 0.0), friend(2, -1.0), friend(3, 2.0)];
        let allocations = distribute(&friends, 10);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].fid, 3);
        assert_eq!(allocations[0].amount, 10);
    }

    #[test]
    fn full_u64_total_is_split_exactly() {
        let friends = vec![friend(1, 1.0), friend(2, 1.0)];
        let allocations = distribute(&friends, u64::MAX);
        let sum: u128 = allocations.iter().map(|a| u128::from(a.amount)).sum();
        assert_eq!(sum, u128::from(u64::MAX));
        assert_eq!(allocations[0].amount, u64::MAX / 2 + 1);
        assert_eq!(allocations[1].amount, u64::MAX / 2);

        let uneven = vec![friend(7, 0.3), friend(8, 2.5), friend(9, 1e-9)];
        let sum: u128 = distribute(&uneven, u64::MAX - 3)
            .iter()
            .map(|a| u128::from(a.amount))
            .sum();
        assert_eq!(sum, u128::from(u64::MAX - 3));
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(distribute(&[], 10_000).is_empty());
        assert!(distribute(&[friend(1, 0.0)], 10_000).is_empty());
    }

    #[tokio::test]
    async fn follow_wraps_fid_in_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/farcaster/user/follow"))
            .and(header("x-api-key", "ney-key"))
            .and(body_json(json!({"signer_uuid": "abc", "target_fids": [42]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let neynar = client(&server.uri(), Some("ney-key"));
        let body = neynar.follow("abc", 42).await.unwrap();
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn reaction_type_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/farcaster/reaction"))
            .and(body_json(json!({"signer_uuid": "abc", "reaction_type": "recast", "target": "0xcast"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let neynar = client(&server.uri(), Some("k"));
        neynar.react("abc", ReactionType::Recast, "0xcast").await.unwrap();
    }

    #[tokio::test]
    async fn bulk_joins_fids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/farcaster/user/bulk"))
            .and(query_param("fids", "1,2,3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
            .expect(1)
            .mount(&server)
            .await;

        let neynar = client(&server.uri(), Some("k"));
        neynar.users_bulk(&[1, 2, 3]).await.unwrap();
    }

    #[tokio::test]
    async fn bulk_rejects_out_of_range_counts() {
        let server = MockServer::start().await;
        let neynar = client(&server.uri(), Some("k"));
        assert!(matches!(
            neynar.users_bulk(&[]).await.unwrap_err(),
            UpstreamError::InvalidRequest(_)
        ));
        let too_many: Vec<u64> = (0..=MAX_BULK_FIDS as u64).collect();
        assert!(matches!(
            neynar.users_bulk(&too_many).await.unwrap_err(),
            UpstreamError::InvalidRequest(_)
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn best_friends_parses_users() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/farcaster/user/best_friends"))
            .and(query_param("fid", "7"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {"fid": 1, "username": "a", "mutual_affinity_score": 0.8},
                    {"fid": 2, "username": "b", "mutual_affinity_score": 0.2}
                ]
            })))
            .mount(&server)
            .await;

        let neynar = client(&server.uri(), Some("k"));
        let friends = neynar.best_friends(7, 3).await.unwrap();
        assert_eq!(friends.len(), 2);
        assert_eq!(friends[0].username.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let server = MockServer::start().await;
        let neynar = client(&server.uri(), None);
        let err = neynar.user_by_username("dwr").await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingConfig { key: "NEYNAR_API_KEY", .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
