use secrecy::{ExposeSecret, SecretString};

/// Wraps an API key or signing secret with secrecy protection
/// (zeroized on drop, redacted in Debug).
#[derive(Clone)]
pub struct ApiKey(pub SecretString);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Key pair for services that sign tokens locally (100ms, Stream).
#[derive(Clone, Debug)]
pub struct SigningCredentials {
    pub key: ApiKey,
    pub secret: ApiKey,
}
