//! Host token auto-deployment: token config, on-chain deploy, empire
//! contract, with every status change persisted per host.

pub mod mock;
pub mod orchestrator;
pub mod store;

pub use orchestrator::{DeploymentOrchestrator, DeploymentRequest, DEFAULT_DEPLOY_LEASE};
pub use store::RecordStore;
