//! HTTP surface of the redirect manager
//!
//! Admin endpoints live under `/api`; every other path goes through the
//! resolver, which answers with a redirect or a JSON 404.

pub mod config;
pub mod handlers;
pub mod models;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::lifecycle::{MemorySessionStore, SessionStore};
use crate::manager::{RedirectManager, RedirectScope, StaticLicense};
use crate::resolver::RedirectResolver;
use crate::site::{MemorySiteRepository, SiteRepository};
use crate::store::{MemoryDatabase, RedirectDatabase, SqliteDatabase};
use self::config::{ApiConfig, IN_MEMORY_DATABASE};

/// Everything the handlers share
pub struct AppState {
    pub config: ApiConfig,
    pub manager: Arc<RedirectManager>,
    pub resolver: Arc<RedirectResolver>,
    pub sessions: Arc<dyn SessionStore>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: ApiConfig, manager: Arc<RedirectManager>, sessions: Arc<dyn SessionStore>) -> Self {
        let resolver = RedirectResolver::new(manager.clone()).with_development(config.development);
        Self {
            config,
            manager,
            resolver: Arc::new(resolver),
            sessions,
            started: Instant::now(),
        }
    }

    /// Opens the database and site trees named by the configuration
    pub fn from_config(config: ApiConfig) -> Result<Self> {
        let db: Arc<dyn RedirectDatabase> = if config.database_path == IN_MEMORY_DATABASE {
            debug!("Keeping redirects in memory");
            Arc::new(MemoryDatabase::new())
        } else {
            Arc::new(SqliteDatabase::open(&config.database_path)?)
        };

        let sites: Arc<dyn SiteRepository> = match &config.sites_file {
            Some(path) => Arc::new(MemorySiteRepository::from_json_file(Path::new(path))?),
            None => {
                debug!("Serving {} configured project(s) without page trees", config.projects.len());
                Arc::new(MemorySiteRepository::with_projects(config.projects.clone()))
            }
        };

        let license = Arc::new(StaticLicense {
            licensed: config.licensed,
            store_url: config.license_store_url.clone(),
        });

        let scope = if config.global_scope {
            RedirectScope::Global
        } else {
            RedirectScope::Project
        };
        let manager = RedirectManager::new(db, sites, license).with_scope(scope);

        Ok(Self::new(config, Arc::new(manager), Arc::new(MemorySessionStore::new())))
    }
}

/// Registers the admin and health endpoints
///
/// The resolver is not part of this; mount [`handlers::resolve_handler`] as
/// the default service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/redirects")
            .route(web::get().to(handlers::list_redirects))
            .route(web::post().to(handlers::add_redirect)),
    )
    .service(web::resource("/api/redirects/batch").route(web::post().to(handlers::add_redirects)))
    .service(web::resource("/api/redirects/delete").route(web::post().to(handlers::delete_redirects)))
    .service(web::resource("/api/rewritten-url").route(web::get().to(handlers::rewritten_url)))
    .service(
        web::resource("/api/urls-to-process")
            .route(web::get().to(handlers::urls_to_process))
            .route(web::post().to(handlers::process_further_urls)),
    )
    .service(web::resource("/api/urls-to-process/queue").route(web::post().to(handlers::queue_urls)))
    .service(web::resource("/health").route(web::get().to(handlers::health_check)));
}

/// Starts the API server with the specified configuration
///
/// # Arguments
/// * `state` - Shared state built from the configuration
///
/// # Returns
/// * `Result<()>` - Success or an error
#[instrument(skip(state), fields(host = %state.config.host, port = state.config.port))]
pub async fn start_server(state: AppState) -> Result<()> {
    let host = state.config.host.clone();
    let port = state.config.port;
    let state = web::Data::new(state);

    info!("Starting HTTP server at {}:{}", host, port);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .default_service(web::to(handlers::resolve_handler))
    })
    .bind((host.as_str(), port))
    .map_err(|e| {
        error!("Failed to bind to {}:{}: {}", host, port, e);
        e
    })?
    .run()
    .await;

    if let Err(e) = server_result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
