use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use songjam_core::events::SpaceEvent;
use songjam_core::ids::SpaceId;
use songjam_deploy::DeploymentRequest;
use songjam_space::{SpaceError, SpaceSession};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::server::AppState;

/// `POST /api/spaces`: deploy if needed, open a room and start the session.
pub async fn start(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeploymentRequest>,
) -> ApiResult<(StatusCode, Json<SpaceSession>)> {
    let session = state.spaces.start(request.host, request.token).await?;
    info!(space_id = %session.id, "space started");
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/spaces/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SpaceSession>> {
    let id = SpaceId::from_raw(id);
    let session = state.spaces.get(&id).ok_or(SpaceError::NotFound(id))?;
    Ok(Json(session))
}

/// `DELETE /api/spaces/{id}`
pub async fn end(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.spaces.end(&SpaceId::from_raw(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/spaces/{id}/events`: server-sent events for one Space. The
/// stream closes after the `space_ended` event.
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id = SpaceId::from_raw(id);
    // subscribe before the existence check so no event slips between them
    let rx = state.spaces.subscribe();
    if state.spaces.get(&id).is_none() {
        return Err(SpaceError::NotFound(id).into());
    }

    let events = BroadcastStream::new(rx);
    let stream = futures::stream::unfold((events, id, false), |(mut events, id, ended)| async move {
        if ended {
            return None;
        }
        loop {
            match events.next().await? {
                Ok(event) if event.space_id() == &id => {
                    let ended = matches!(event, SpaceEvent::SpaceEnded { .. });
                    let sse = Event::default()
                        .event(event.event_type())
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().comment("unencodable event"));
                    return Some((Ok::<_, Infallible>(sse), (events, id, ended)));
                }
                Ok(_) => {}
                Err(lagged) => debug!(error = %lagged, "event subscriber lagged"),
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
