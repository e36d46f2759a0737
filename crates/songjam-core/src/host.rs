use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::HostId;

/// Identity of the user starting a Space, captured from their session.
///
/// Immutable for the duration of one deployment attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub twitter_id: HostId,
    pub twitter_handle: String,
    pub display_name: String,
    #[serde(default)]
    pub creator_address: Option<String>,
    #[serde(default)]
    pub owner_address: Option<String>,
    /// Wallet signature over `message`, forwarded to Empire Builder.
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HostInfo {
    pub fn id(&self) -> &HostId {
        &self.twitter_id
    }
}

/// Token the host wants deployed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"))
}

/// True for a `0x`-prefixed, 20-byte hex EVM address.
pub fn is_evm_address(value: &str) -> bool {
    address_pattern().is_match(value)
}

/// Return the trimmed value if present and non-empty.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
