//! # songjam-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SongjamSettings::default()`]
//! 2. **User file**: `~/.songjam/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `SONGJAM_*` overrides
//!
//! API keys never live in the settings file; [`Credentials`] reads them
//! from their conventional environment variables.

#![deny(unsafe_code)]

pub mod credentials;
pub mod errors;
pub mod loader;
pub mod types;

pub use credentials::Credentials;
pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
