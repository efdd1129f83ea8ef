use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::manager::{Actor, Permission};
use crate::site::Project;

/// Prefix of environment variables overriding the configuration
pub const ENV_PREFIX: &str = "REDIRECT";

/// Path of the database that keeps everything in memory
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Configuration for the API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind to
    pub host: String,

    pub port: u16,

    /// SQLite file holding the redirect tables, or `:memory:`
    pub database_path: String,

    /// JSON file with projects and page trees; `projects` is used when unset
    pub sites_file: Option<String>,

    /// Projects served when no sites file is given
    pub projects: Vec<Project>,

    /// Answer redirects with 302 instead of 301
    pub development: bool,

    /// Keep all redirects in one table keyed by the raw URL
    pub global_scope: bool,

    /// Whether the free redirect limit is lifted
    pub licensed: bool,

    /// Where a license can be bought
    pub license_store_url: Option<String>,

    /// Directory for log files
    pub log_dir: String,

    /// Users allowed to use the admin endpoints
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "data/redirects.sqlite".to_string(),
            sites_file: None,
            projects: vec![Project::new("default", "en")],
            development: false,
            global_scope: false,
            licensed: false,
            license_store_url: None,
            log_dir: "logs".to_string(),
            users: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Loads the configuration from an optional TOML file and `REDIRECT_*` variables
    ///
    /// Values missing from both fall back to [`ApiConfig::default`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// The actor for a user id, if the user is configured
    pub fn actor(&self, user_id: &str) -> Option<Actor> {
        let user = self.users.iter().find(|u| u.id == user_id)?;

        let mut actor = Actor::new(&user.id);
        actor.is_admin = user.admin;
        for permission in &user.permissions {
            actor = actor.with_permission(*permission);
        }
        Some(actor)
    }
}
