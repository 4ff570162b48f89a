use crate::{controller::health_check_controller, params, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::controller::{processing_controller, transcription_record_controller};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Call Insights Platform API"
        ),
        paths(
            health_check_controller::health_check,
            processing_controller::run,
            processing_controller::missing,
            transcription_record_controller::index,
            transcription_record_controller::read,
        ),
        components(
            schemas(
                domain::call_logs::Model,
                domain::transcription_records::Model,
                params::processing::RunParams,
            )
        ),
        tags(
            (name = "call_insights", description = "Call-center transcription analytics API")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(processing_routes(app_state.clone()))
        .merge(transcription_record_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
        .fallback_service(static_routes())
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn processing_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/processing/runs", post(processing_controller::run))
        .route("/processing/missing", get(processing_controller::missing))
        .with_state(app_state)
}

fn transcription_record_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/transcription_records",
            get(transcription_record_controller::index),
        )
        .route(
            "/transcription_records/{contact_id}",
            get(transcription_record_controller::read),
        )
        .with_state(app_state)
}

// This will serve static files that we can use as a "fallback" for when the server panics
pub fn static_routes() -> Router {
    Router::new().nest_service("/", ServeDir::new("./"))
}
