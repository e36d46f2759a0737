pub mod deployment;
pub mod errors;
pub mod events;
pub mod host;
pub mod ids;
pub mod security;
pub mod services;
pub mod space;
