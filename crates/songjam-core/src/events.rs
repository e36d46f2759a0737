use serde::{Deserialize, Serialize};

use crate::ids::SpaceId;
use crate::space::{InviteTarget, Participant, TranscriptLine, ViewState};

/// Events emitted while a Space session runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpaceEvent {
    #[serde(rename = "state_changed")]
    StateChanged {
        space_id: SpaceId,
        state: ViewState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "participant_joined")]
    ParticipantJoined {
        space_id: SpaceId,
        participant: Participant,
    },

    #[serde(rename = "transcript")]
    Transcript {
        space_id: SpaceId,
        line: TranscriptLine,
    },

    #[serde(rename = "invite_target")]
    InviteTargetAdded {
        space_id: SpaceId,
        target: InviteTarget,
    },

    #[serde(rename = "space_ended")]
    SpaceEnded { space_id: SpaceId },
}

impl SpaceEvent {
    pub fn space_id(&self) -> &SpaceId {
        match self {
            Self::StateChanged { space_id, .. }
            | Self::ParticipantJoined { space_id, .. }
            | Self::Transcript { space_id, .. }
            | Self::InviteTargetAdded { space_id, .. }
            | Self::SpaceEnded { space_id } => space_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::Transcript { .. } => "transcript",
            Self::InviteTargetAdded { .. } => "invite_target",
            Self::SpaceEnded { .. } => "space_ended",
        }
    }
}
