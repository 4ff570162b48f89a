use log::{error, info};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Starting Call Insights API server");

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish results store connection: {e}");
            std::process::exit(1);
        }
    };

    let call_log_db = match service::init_call_log_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish call log source connection: {e}");
            std::process::exit(1);
        }
    };

    let service_state = service::AppState::new(config, &db, &call_log_db);

    let app_state = match web::AppState::new(service_state) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to initialize the transcription pipeline: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }
}
