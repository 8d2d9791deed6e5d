//! SSE endpoint for job progress.
//!
//! GET /api/jobs/:id/events
//!
//! Replays the job's recorded events first, then switches to the live
//! broadcast. The scheduler takes both under one lock, so the stream never
//! drops or repeats an event across the handoff. Terminated jobs simply
//! replay their full log; the broadcast side stays silent.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::kernel::jobs::RecordedEvent;
use crate::server::app::AppState;

pub async fn stream_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let (recorded, rx) = state.scheduler.subscribe(id).ok_or(StatusCode::NOT_FOUND)?;

    let connected = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("connected").data("ok"))
    });

    let replay = stream::iter(
        recorded
            .into_iter()
            .filter_map(|e| to_sse_event(&e).map(Ok)),
    );

    let live = BroadcastStream::new(rx).filter_map(|result| async {
        match result {
            Ok(recorded) => to_sse_event(&recorded).map(Ok),
            Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                Event::default()
                    .event("lagged")
                    .json_data(&serde_json::json!({ "missed": n }))
                    .ok()
                    .map(Ok)
            }
        }
    });

    Ok(Sse::new(connected.chain(replay).chain(live)).keep_alive(KeepAlive::default()))
}

fn to_sse_event(recorded: &RecordedEvent) -> Option<Event> {
    Event::default()
        .event(recorded.event.kind())
        .json_data(recorded)
        .ok()
}
