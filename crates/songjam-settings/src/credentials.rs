//! Server-side API keys. Read only from the environment, never serialized.

use songjam_core::security::{ApiKey, SigningCredentials};

pub const HMS_ACCESS_KEY: &str = "HMS_ACCESS_KEY";
pub const HMS_SECRET: &str = "HMS_SECRET";
pub const DAILY_API_KEY: &str = "DAILY_API_KEY";
pub const STREAM_API_KEY: &str = "STREAM_API_KEY";
pub const STREAM_API_SECRET: &str = "STREAM_API_SECRET";
pub const EMPIRE_BUILDER_API_KEY: &str = "EMPIRE_BUILDER_API_KEY";
pub const NEYNAR_API_KEY: &str = "NEYNAR_API_KEY";

/// Credentials for every upstream. A `None` means the matching proxy
/// routes answer 500 without calling out.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub hms_access_key: Option<ApiKey>,
    pub hms_secret: Option<ApiKey>,
    pub daily_api_key: Option<ApiKey>,
    pub stream_api_key: Option<ApiKey>,
    pub stream_api_secret: Option<ApiKey>,
    pub empire_builder_api_key: Option<ApiKey>,
    pub neynar_api_key: Option<ApiKey>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(ApiKey::new)
        };
        Self {
            hms_access_key: key(HMS_ACCESS_KEY),
            hms_secret: key(HMS_SECRET),
            daily_api_key: key(DAILY_API_KEY),
            stream_api_key: key(STREAM_API_KEY),
            stream_api_secret: key(STREAM_API_SECRET),
            empire_builder_api_key: key(EMPIRE_BUILDER_API_KEY),
            neynar_api_key: key(NEYNAR_API_KEY),
        }
    }

    pub fn hms(&self) -> Option<SigningCredentials> {
        pair(&self.hms_access_key, &self.hms_secret)
    }

    pub fn stream(&self) -> Option<SigningCredentials> {
        pair(&self.stream_api_key, &self.stream_api_secret)
    }

    /// Names of the services whose credentials are present.
    pub fn configured_services(&self) -> Vec<&'static str> {
        let mut services = Vec::new();
        if self.hms().is_some() {
            services.push("hms");
        }
        if self.daily_api_key.is_some() {
            services.push("daily");
        }
        if self.stream().is_some() {
            services.push("stream");
        }
        if self.empire_builder_api_key.is_some() {
            services.push("empire_builder");
        }
        if self.neynar_api_key.is_some() {
            services.push("neynar");
        }
        services
    }
}

fn pair(key: &Option<ApiKey>, secret: &Option<ApiKey>) -> Option<SigningCredentials> {
    Some(SigningCredentials {
        key: key.clone()?,
        secret: secret.clone()?,
    })
}
