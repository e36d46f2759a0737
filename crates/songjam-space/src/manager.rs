use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Instrument};

use songjam_core::deployment::{DeploymentOutcome, DeploymentStage, DeploymentStatus};
use songjam_core::events::SpaceEvent;
use songjam_core::host::{HostInfo, TokenSpec};
use songjam_core::ids::{HostId, ParticipantId, SpaceId};
use songjam_core::services::RoomProvider;
use songjam_core::space::{Participant, ParticipantRole, ViewState};
use songjam_deploy::DeploymentOrchestrator;
use songjam_settings::SpaceSettings;

use crate::error::SpaceError;
use crate::generator;
use crate::session::SpaceSession;

const EVENT_CAPACITY: usize = 256;

/// A registered session and the token that stops its timers.
struct SessionEntry {
    session: Mutex<SpaceSession>,
    cancel: CancellationToken,
}

impl SessionEntry {
    /// Mutate the session unless it has been ended. Returns false once ended.
    ///
    /// The cancellation check happens under the session lock, and `end`
    /// cancels under the same lock, so nothing mutates after `end` returns.
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut SpaceSession),
    {
        let mut session = self.session.lock();
        if self.cancel.is_cancelled() {
            return false;
        }
        f(&mut *session);
        true
    }
}

/// Registry of running Spaces, at most one active per host.
///
/// Clones share the same registry and event channel.
#[derive(Clone)]
pub struct SpaceManager {
    deployments: Arc<DeploymentOrchestrator>,
    rooms: Arc<dyn RoomProvider>,
    settings: SpaceSettings,
    event_tx: broadcast::Sender<SpaceEvent>,
    sessions: Arc<DashMap<SpaceId, Arc<SessionEntry>>>,
    hosts: Arc<DashMap<HostId, SpaceId>>,
}

impl SpaceManager {
    pub fn new(
        deployments: Arc<DeploymentOrchestrator>,
        rooms: Arc<dyn RoomProvider>,
        settings: SpaceSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            deployments,
            rooms,
            settings,
            event_tx,
            sessions: Arc::new(DashMap::new()),
            hosts: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
        self.event_tx.subscribe()
    }

    pub fn get(&self, id: &SpaceId) -> Option<SpaceSession> {
        let entry = self.sessions.get(id)?.value().clone();
        let snapshot = entry.session.lock().clone();
        Some(snapshot)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Begin a Space for `host`.
    ///
    /// Deploys the host's token when it is not deployed yet, then creates a
    /// room. Either failure reverts the session to listening and removes it.
    /// On success the session is returned in `transitioning` and goes live
    /// after the configured delay.
    ///
    /// The deployment and room setup run on their own task, so a deployment
    /// always reaches a final status. Dropping this future before it resolves
    /// abandons the session and frees the host.
    #[instrument(skip_all, fields(host_id = %host.id()))]
    pub async fn start(&self, host: HostInfo, token: TokenSpec) -> Result<SpaceSession, SpaceError> {
        let host_id = host.id().clone();
        let space_id = SpaceId::new();

        match self.hosts.entry(host_id.clone()) {
            Entry::Occupied(_) => return Err(SpaceError::AlreadyActive(host_id)),
            Entry::Vacant(slot) => {
                slot.insert(space_id.clone());
            }
        }

        let mut session = SpaceSession::new(space_id.clone(), &host);
        session.state = ViewState::Transitioning;
        let entry = Arc::new(SessionEntry {
            session: Mutex::new(session),
            cancel: CancellationToken::new(),
        });
        self.sessions.insert(space_id.clone(), entry.clone());
        self.emit_state(&space_id, ViewState::Transitioning, None);
        info!(space_id = %space_id, "space transitioning");

        let mut pending = PendingStart {
            manager: self,
            space_id: space_id.clone(),
            host_id,
            armed: true,
        };
        let task = tokio::spawn(self.clone().prepare(entry, space_id, host, token).in_current_span());
        match task.await {
            Ok(result) => {
                // the task cleans up after its own failures
                pending.armed = false;
                result
            }
            Err(e) => Err(SpaceError::Interrupted(e.to_string())),
        }
    }

    async fn prepare(
        self,
        entry: Arc<SessionEntry>,
        space_id: SpaceId,
        host: HostInfo,
        token: TokenSpec,
    ) -> Result<SpaceSession, SpaceError> {
        let host_id = host.id().clone();
        let token_address = match self.ensure_deployed(&host, &token).await {
            Ok(address) => address,
            Err((stage, message)) => {
                self.abort_start(&space_id, &host_id, &message);
                return Err(SpaceError::DeploymentFailed { stage, message });
            }
        };
        if entry.cancel.is_cancelled() {
            return Err(SpaceError::Ended(space_id));
        }

        let room = match self.rooms.create_room(None).await {
            Ok(room) => room,
            Err(e) => {
                self.abort_start(&space_id, &host_id, &e.to_string());
                return Err(SpaceError::RoomFailed(e));
            }
        };

        let live = entry.update(|s| {
            s.room_url = Some(room.url.clone());
            s.token_address = Some(token_address.clone());
        });
        if !live {
            return Err(SpaceError::Ended(space_id));
        }

        self.schedule_live(entry.clone());
        let snapshot = entry.session.lock().clone();
        Ok(snapshot)
    }

    /// Stop a Space: cancel its timers, reset it and drop it from the registry.
    #[instrument(skip(self), fields(space_id = %id))]
    pub fn end(&self, id: &SpaceId) -> Result<(), SpaceError> {
        let (_, entry) = self
            .sessions
            .remove(id)
            .ok_or_else(|| SpaceError::NotFound(id.clone()))?;

        let host_id = {
            let mut session = entry.session.lock();
            entry.cancel.cancel();
            session.reset();
            session.host_id.clone()
        };
        self.hosts.remove_if(&host_id, |_, space| space == id);

        let _ = self.event_tx.send(SpaceEvent::StateChanged {
            space_id: id.clone(),
            state: ViewState::Listening,
            message: None,
        });
        let _ = self.event_tx.send(SpaceEvent::SpaceEnded { space_id: id.clone() });
        info!("space ended");
        Ok(())
    }

    /// End every session. Returns how many were running.
    pub fn end_all(&self) -> usize {
        let ids: Vec<SpaceId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.end(id).is_ok()).count()
    }

    /// Token address for the host, deploying first when needed.
    async fn ensure_deployed(&self, host: &HostInfo, token: &TokenSpec) -> Result<String, (DeploymentStage, String)> {
        if let Some(record) = self.deployments.record(host.id()) {
            if record.status == DeploymentStatus::Deployed {
                if let Some(address) = record.token_address {
                    return Ok(address);
                }
            }
        }

        match self.deployments.deploy(host, token).await {
            DeploymentOutcome::Deployed { token_address, .. } => Ok(token_address),
            DeploymentOutcome::Failed { stage, message } => Err((stage, message)),
        }
    }

    fn abort_start(&self, space_id: &SpaceId, host_id: &HostId, message: &str) {
        warn!(space_id = %space_id, error = message, "space start failed, reverting to listening");
        if let Some((_, entry)) = self.sessions.remove(space_id) {
            let mut session = entry.session.lock();
            entry.cancel.cancel();
            session.reset();
        }
        self.hosts.remove_if(host_id, |_, space| space == space_id);
        self.emit_state(space_id, ViewState::Listening, Some(message.to_string()));
    }

    fn emit_state(&self, space_id: &SpaceId, state: ViewState, message: Option<String>) {
        let _ = self.event_tx.send(SpaceEvent::StateChanged {
            space_id: space_id.clone(),
            state,
            message,
        });
    }

    fn schedule_live(&self, entry: Arc<SessionEntry>) {
        let settings = self.settings.clone();
        let tx = self.event_tx.clone();
        let delay = Duration::from_millis(settings.transition_delay_ms);

        tokio::spawn(async move {
            tokio::select! {
                _ = entry.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let went_live = entry.update(|s| {
                s.state = ViewState::Live;
                s.started_at = Some(Utc::now().to_rfc3339());
                let host = Participant {
                    id: ParticipantId::new(),
                    display_name: s.host_display_name.clone(),
                    handle: s.host_handle.clone(),
                    role: ParticipantRole::Host,
                    joined_at: Utc::now().to_rfc3339(),
                };
                s.add_participant(host.clone(), settings.max_participants);
                let _ = tx.send(SpaceEvent::StateChanged {
                    space_id: s.id.clone(),
                    state: ViewState::Live,
                    message: None,
                });
                let _ = tx.send(SpaceEvent::ParticipantJoined {
                    space_id: s.id.clone(),
                    participant: host,
                });
            });
            if !went_live {
                return;
            }
            info!("space live");

            let cap = settings.max_participants;
            spawn_generator(entry.clone(), tx.clone(), settings.participant_interval_ms, move |s, rng| {
                let participant = generator::participant(rng);
                s.add_participant(participant.clone(), cap);
                SpaceEvent::ParticipantJoined {
                    space_id: s.id.clone(),
                    participant,
                }
            });

            let cap = settings.max_transcript_lines;
            spawn_generator(entry.clone(), tx.clone(), settings.transcript_interval_ms, move |s, rng| {
                let speakers: Vec<&str> = s
                    .participants
                    .iter()
                    .filter(|p| p.role != ParticipantRole::Listener)
                    .map(|p| p.handle.as_str())
                    .collect();
                let line = generator::transcript_line(rng, &speakers, &s.host_handle);
                s.add_transcript(line.clone(), cap);
                SpaceEvent::Transcript {
                    space_id: s.id.clone(),
                    line,
                }
            });

            let cap = settings.max_invite_targets;
            spawn_generator(entry, tx, settings.invite_interval_ms, move |s, rng| {
                let target = generator::invite_target(rng);
                s.add_invite_target(target.clone(), cap);
                SpaceEvent::InviteTargetAdded {
                    space_id: s.id.clone(),
                    target,
                }
            });
        });
    }
}

/// Frees the host when a `start` call is dropped before its setup task
/// reports back. The task itself keeps running and stops at the next
/// cancellation check.
struct PendingStart<'a> {
    manager: &'a SpaceManager,
    space_id: SpaceId,
    host_id: HostId,
    armed: bool,
}

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager
                .abort_start(&self.space_id, &self.host_id, "space start interrupted");
        }
    }
}

/// Run `step` every `interval_ms` until the session is cancelled.
/// A zero interval disables the generator.
fn spawn_generator<F>(entry: Arc<SessionEntry>, tx: broadcast::Sender<SpaceEvent>, interval_ms: u64, mut step: F)
where
    F: FnMut(&mut SpaceSession, &mut StdRng) -> SpaceEvent + Send + 'static,
{
    if interval_ms == 0 {
        return;
    }
    let every = Duration::from_millis(interval_ms);
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        loop {
            tokio::select! {
                _ = entry.cancel.cancelled() => break,
                _ = tokio::time::sleep(every) => {}
            }
            let alive = entry.update(|s| {
                let event = step(s, &mut rng);
                let _ = tx.send(event);
            });
            if !alive {
                break;
            }
        }
    });
}
