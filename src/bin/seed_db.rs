use log::{error, info};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Seeding development call logs [{}]...",
        config.call_log_database_url()
    );

    let db = match service::init_call_log_database(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to establish call log database connection: {e}");
            std::process::exit(1);
        }
    };

    entity_api::seed_database(&db).await;
}
