use songjam_core::deployment::DeploymentStage;
use songjam_core::errors::UpstreamError;
use songjam_core::ids::{HostId, SpaceId};

#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("host {0} already has an active space")]
    AlreadyActive(HostId),

    #[error("space {0} not found")]
    NotFound(SpaceId),

    #[error("token deployment failed: {message}")]
    DeploymentFailed { stage: DeploymentStage, message: String },

    #[error("room creation failed: {0}")]
    RoomFailed(#[source] UpstreamError),

    #[error("space {0} ended before going live")]
    Ended(SpaceId),

    #[error("space setup task failed: {0}")]
    Interrupted(String),
}
