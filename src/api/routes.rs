use crate::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(crate::api::handlers::health::health))
        .route("/research", post(crate::api::handlers::research::research))
        .route(
            "/conversations",
            post(crate::api::handlers::conversations::create_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(crate::api::handlers::conversations::list_messages),
        )
}
