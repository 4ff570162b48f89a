use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use domain::gateway::sftp::SftpFileStore;
use domain::orchestrator::Pipeline;
use domain::processing_lock::ProcessingLock;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::{ApiVersion, Config};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod controller;
pub mod error;
pub mod extractors;
pub mod params;
pub mod router;

pub use error::{Error, Result};

/// Application state shared by all request handlers: the infrastructure
/// state from `service` plus the long-lived transcription pipeline and its
/// process-local lock.
#[derive(Clone)]
pub struct AppState {
    service_state: service::AppState,
    pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Builds the web state, constructing the pipeline once at startup so
    /// configuration problems (missing engine key, missing SFTP credentials)
    /// fail the boot instead of the first batch run.
    pub fn new(service_state: service::AppState) -> std::result::Result<Self, domain::error::Error> {
        let file_store = SftpFileStore::from_config(&service_state.config)?;
        let lock = Arc::new(ProcessingLock::new());
        let pipeline = Pipeline::new(
            service_state.config.clone(),
            Arc::new(file_store),
            lock,
        )?;

        Ok(Self {
            service_state,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn call_log_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.call_log_conn_ref()
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = app_state.config();
    let host = config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_address = format!("{}:{}", host, config.port);

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(ApiVersion::field_name()),
        ])
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true);

    info!("Server starting on {listen_address}");

    let router = router::define_routes(app_state).layer(cors_layer);
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    axum::serve(listener, router).await
}
