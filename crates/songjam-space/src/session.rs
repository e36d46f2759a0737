use serde::{Deserialize, Serialize};

use songjam_core::host::HostInfo;
use songjam_core::ids::{HostId, SpaceId};
use songjam_core::space::{InviteTarget, Participant, TranscriptLine, ViewState};

/// Snapshot of one Space. Lives in memory only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceSession {
    pub id: SpaceId,
    pub host_id: HostId,
    pub host_handle: String,
    pub host_display_name: String,
    pub state: ViewState,
    pub room_url: Option<String>,
    pub token_address: Option<String>,
    pub participants: Vec<Participant>,
    pub transcript: Vec<TranscriptLine>,
    pub invite_targets: Vec<InviteTarget>,
    pub started_at: Option<String>,
}

impl SpaceSession {
    pub fn new(id: SpaceId, host: &HostInfo) -> Self {
        Self {
            id,
            host_id: host.id().clone(),
            host_handle: host.twitter_handle.clone(),
            host_display_name: host.display_name.clone(),
            state: ViewState::Listening,
            room_url: None,
            token_address: None,
            participants: Vec::new(),
            transcript: Vec::new(),
            invite_targets: Vec::new(),
            started_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ViewState::Transitioning | ViewState::Live)
    }

    pub fn add_participant(&mut self, participant: Participant, cap: usize) {
        push_bounded(&mut self.participants, participant, cap);
    }

    pub fn add_transcript(&mut self, line: TranscriptLine, cap: usize) {
        push_bounded(&mut self.transcript, line, cap);
    }

    pub fn add_invite_target(&mut self, target: InviteTarget, cap: usize) {
        push_bounded(&mut self.invite_targets, target, cap);
    }

    /// Back to the initial listening state, keeping identity fields.
    pub fn reset(&mut self) {
        self.state = ViewState::Listening;
        self.room_url = None;
        self.token_address = None;
        self.participants.clear();
        self.transcript.clear();
        self.invite_targets.clear();
        self.started_at = None;
    }
}

/// Append, dropping the oldest entries beyond `cap`. A zero cap keeps nothing.
fn push_bounded<T>(list: &mut Vec<T>, item: T, cap: usize) {
    if cap == 0 {
        return;
    }
    list.push(item);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}
