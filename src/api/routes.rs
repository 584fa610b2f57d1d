use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/players", post(handlers::create_player))
        .route("/players/:player_id", get(handlers::get_player))
        .route(
            "/players/:player_id/guesses",
            post(handlers::place_guess).get(handlers::list_guesses),
        )
        .route(
            "/players/:player_id/guesses/:guess_id",
            get(handlers::get_guess),
        )
        .with_state(state)
        .layer(cors)
}
