//! Settings types. Every struct deserializes with defaults so a partial
//! settings file only overrides what it names.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongjamSettings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub services: ServiceSettings,
    pub space: SpaceSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Whole-request timeout applied by the HTTP layer.
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            request_timeout_ms: 120_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: songjam_dir()
                .join("database")
                .join("songjam.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Upstream endpoints. Keys are not here: see [`crate::Credentials`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceSettings {
    pub hms_base_url: String,
    /// 100ms template used when creating rooms.
    pub hms_template_id: Option<String>,
    pub daily_base_url: String,
    pub empire_builder_base_url: String,
    pub neynar_base_url: String,
    pub chain_rpc_url: String,
    pub receipt_poll_interval_ms: u64,
    pub receipt_max_polls: u32,
    /// Per-call timeout for every upstream request.
    pub upstream_timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            hms_base_url: "https://api.100ms.live/v2".to_string(),
            hms_template_id: None,
            daily_base_url: "https://api.daily.co/v1".to_string(),
            empire_builder_base_url: "https://empirebuilder.world/api".to_string(),
            neynar_base_url: "https://api.neynar.com/v2".to_string(),
            chain_rpc_url: "https://mainnet.base.org".to_string(),
            receipt_poll_interval_ms: 2_000,
            receipt_max_polls: 60,
            upstream_timeout_ms: 30_000,
        }
    }
}

impl ServiceSettings {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

/// Pacing of the simulated live session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpaceSettings {
    pub transition_delay_ms: u64,
    pub participant_interval_ms: u64,
    pub transcript_interval_ms: u64,
    pub invite_interval_ms: u64,
    pub max_participants: usize,
    pub max_transcript_lines: usize,
    pub max_invite_targets: usize,
}

impl Default for SpaceSettings {
    fn default() -> Self {
        Self {
            transition_delay_ms: 2_000,
            participant_interval_ms: 3_000,
            transcript_interval_ms: 2_000,
            invite_interval_ms: 5_000,
            max_participants: 24,
            max_transcript_lines: 50,
            max_invite_targets: 12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetrySettings {
    /// Default level; `RUST_LOG` still wins when set.
    pub log_level: String,
    pub log_to_sqlite: bool,
    pub log_db_path: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_sqlite: true,
            log_db_path: songjam_dir()
                .join("database")
                .join("logs.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// `~/.songjam`, falling back to `/tmp/.songjam` without a home directory.
pub fn songjam_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".songjam")
}
