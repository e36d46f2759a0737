//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SongjamSettings::default()`]
//! 2. If `~/.songjam/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SONGJAM_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{songjam_dir, SongjamSettings};

/// Resolve the path to the settings file (`~/.songjam/settings.json`).
pub fn settings_path() -> PathBuf {
    songjam_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SongjamSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SongjamSettings> {
    let mut settings = read_settings_file(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<SongjamSettings> {
    let defaults = serde_json::to_value(SongjamSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key; arrays and primitives are replaced; nulls in
/// `source` are skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SONGJAM_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored.
pub fn apply_overrides<F>(settings: &mut SongjamSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup: &lookup };

    if let Some(v) = env.string("SONGJAM_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64_in("SONGJAM_PORT", 1, 65_535) {
        settings.server.port = v as u16;
    }
    if let Some(v) = env.u64_in("SONGJAM_REQUEST_TIMEOUT_MS", 1_000, 600_000) {
        settings.server.request_timeout_ms = v;
    }
    if let Some(v) = env.string("SONGJAM_DB") {
        settings.database.path = v;
    }

    if let Some(v) = env.string("SONGJAM_HMS_BASE_URL") {
        settings.services.hms_base_url = v;
    }
    if let Some(v) = env.string("HMS_TEMPLATE_ID") {
        settings.services.hms_template_id = Some(v);
    }
    if let Some(v) = env.string("SONGJAM_DAILY_BASE_URL") {
        settings.services.daily_base_url = v;
    }
    if let Some(v) = env.string("SONGJAM_EMPIRE_BUILDER_BASE_URL") {
        settings.services.empire_builder_base_url = v;
    }
    if let Some(v) = env.string("SONGJAM_NEYNAR_BASE_URL") {
        settings.services.neynar_base_url = v;
    }
    if let Some(v) = env.string("SONGJAM_CHAIN_RPC_URL") {
        settings.services.chain_rpc_url = v;
    }
    if let Some(v) = env.u64_in("SONGJAM_UPSTREAM_TIMEOUT_MS", 100, 600_000) {
        settings.services.upstream_timeout_ms = v;
    }

    if let Some(v) = env.u64_in("SONGJAM_SPACE_TRANSITION_MS", 0, 60_000) {
        settings.space.transition_delay_ms = v;
    }

    if let Some(v) = env.string("SONGJAM_LOG_LEVEL") {
        settings.telemetry.log_level = v;
    }
    if let Some(v) = env.bool("SONGJAM_LOG_TO_SQLITE") {
        settings.telemetry.log_to_sqlite = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "out-of-range env var, ignoring");
        }
        result
    }
}
