use crate::{
    AppState,
    types::{AppError, ResearchRequest, Result},
};
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

/// Run a research request, streaming progress and content as SSE.
///
/// Each event's `event:` field is the variant name (`progress`, `plan`,
/// `source`, `token`, `reflection`, `error`, `done`) and its `data:` field
/// is the JSON-encoded event. The stream always terminates with `done`.
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "SSE stream of research events", content_type = "text/event-stream"),
        (status = 400, description = "Invalid input")
    ),
    tag = "research"
)]
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    if payload.prompt.trim().is_empty() {
        return Err(AppError::InvalidInput("Empty research prompt".to_string()));
    }

    let conversation_id = match payload.conversation_id {
        Some(id) => id,
        None => state.memory.create_conversation(None).await?,
    };
    let intensity = payload.intensity.unwrap_or(50).min(100);

    let events = state.orchestrator.clone().process_research(
        payload.prompt,
        conversation_id,
        intensity,
        payload.clarification_answers,
    );

    let sse_events = events.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event.name()).data(data))
    });

    Ok(Sse::new(sse_events).keep_alive(KeepAlive::default()))
}
