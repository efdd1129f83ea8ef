//! Turning unresolved requests into redirect responses

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::manager::RedirectManager;
use crate::site::Project;
use crate::url_parser::{build_redirect_location, get_query_string, prepare_internal_target_url};

/// Statuses the resolver reacts to: not found and see other
const HANDLED_STATUSES: [u16; 2] = [404, 303];

const STATUS_PERMANENT: u16 = 301;
const STATUS_TEMPORARY: u16 = 302;

/// Redirect to send instead of the original response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    pub status: u16,
    pub location: String,
}

pub struct RedirectResolver {
    manager: Arc<RedirectManager>,
    development: bool, // Answer with 302 so browsers do not cache redirects
}

impl RedirectResolver {
    pub fn new(manager: Arc<RedirectManager>) -> Self {
        Self {
            manager,
            development: false,
        }
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Finds the redirect for a request that ended with `status`
    ///
    /// # Arguments
    /// * `request_uri` - Path, query and fragment as requested
    /// * `status` - Status the request would otherwise be answered with
    /// * `project` - Project the request was made against
    ///
    /// # Returns
    /// * `Some(RedirectResponse)` when a redirect is stored for the request,
    ///   `None` otherwise. Lookup failures are logged and yield `None`.
    #[instrument(level = "debug", skip(self, project), fields(project = %project.name))]
    pub fn resolve(&self, request_uri: &str, status: u16, project: &Project) -> Option<RedirectResponse> {
        if !HANDLED_STATUSES.contains(&status) {
            return None;
        }

        let target = self.lookup(request_uri, project)?;
        let query = match get_query_string(request_uri) {
            Ok(query) => query,
            Err(e) => {
                warn!("Could not read query of {}: {:#}", request_uri, e);
                None
            }
        };

        let location = build_redirect_location(&target, query.as_deref(), project);
        let status = if self.development {
            STATUS_TEMPORARY
        } else {
            STATUS_PERMANENT
        };

        info!("Redirecting {} to {} ({})", request_uri, location, status);
        Some(RedirectResponse { status, location })
    }

    /// Looks up the full source first, then its path alone
    fn lookup(&self, request_uri: &str, project: &Project) -> Option<String> {
        match self.manager.get_redirect_for_url(request_uri, project) {
            Ok(Some(target)) => return Some(target),
            Ok(None) => {}
            Err(e) => {
                warn!("Redirect lookup for {} failed: {:#}", request_uri, e);
                return None;
            }
        }

        let path = prepare_internal_target_url(request_uri).ok()?;
        if path == request_uri {
            debug!("No redirect for {}", request_uri);
            return None;
        }

        match self.manager.get_redirect_for_url(&path, project) {
            Ok(target) => target,
            Err(e) => {
                warn!("Redirect lookup for {} failed: {:#}", path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{RedirectScope, StaticLicense};
    use crate::site::MemorySiteRepository;
    use crate::store::{MemoryDatabase, RedirectDatabase, RedirectEntry, TableName};
    use anyhow::{bail, Result};

    /// Database whose every call fails, as with a lost connection
    struct FailingDatabase;

    impl RedirectDatabase for FailingDatabase {
        fn replace(&self, _table: &TableName, _id: &str, _entry: &RedirectEntry) -> Result<()> {
            bail!("database is unavailable")
        }

        fn fetch(&self, _table: &TableName, _id: &str) -> Result<Option<RedirectEntry>> {
            bail!("database is unavailable")
        }

        fn delete(&self, _table: &TableName, _id: &str) -> Result<bool> {
            bail!("database is unavailable")
        }

        fn fetch_all(&self, _table: &TableName) -> Result<Vec<RedirectEntry>> {
            bail!("database is unavailable")
        }

        fn count(&self, _table: &TableName) -> Result<usize> {
            bail!("database is unavailable")
        }
    }

    fn resolver(project: &Project, development: bool) -> RedirectResolver {
        let manager = RedirectManager::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(MemorySiteRepository::with_projects([project.clone()])),
            Arc::new(StaticLicense::licensed()),
        );
        manager.add_redirect("/old", "/new", project).unwrap();
        manager.add_redirect("/offer?id=5", "https://shop.example/deal", project).unwrap();
        RedirectResolver::new(Arc::new(manager)).with_development(development)
    }

    #[test]
    fn test_redirect_keeps_query_and_prefixes_language() {
        let project = Project::new("main", "en");
        let response = resolver(&project, false).resolve("/old?x=1", 404, &project).unwrap();
        assert_eq!(
            response,
            RedirectResponse {
                status: 301,
                location: "/en/new?x=1".to_string()
            }
        );
    }

    #[test]
    fn test_development_uses_temporary_redirect() {
        let project = Project::new("main", "en");
        let response = resolver(&project, true).resolve("/en/old", 303, &project).unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.location, "/en/new");
    }

    #[test]
    fn test_vhost_project_is_not_prefixed() {
        let project = Project::new("main", "en").with_host("example.com");
        let response = resolver(&project, false).resolve("/old/", 404, &project).unwrap();
        assert_eq!(response.location, "/new");
    }

    #[test]
    fn test_exact_source_with_query() {
        let project = Project::new("main", "en");
        let response = resolver(&project, false).resolve("/offer?id=5", 404, &project).unwrap();
        assert_eq!(response.location, "https://shop.example/deal?id=5");
    }

    #[test]
    fn test_other_statuses_and_misses() {
        let project = Project::new("main", "en");
        let resolver = resolver(&project, false);
        assert!(resolver.resolve("/old", 200, &project).is_none());
        assert!(resolver.resolve("/old", 500, &project).is_none());
        assert!(resolver.resolve("/missing", 404, &project).is_none());
    }

    #[test]
    fn test_storage_failure_means_no_redirect() {
        let project = Project::new("main", "en");
        let manager = RedirectManager::new(
            Arc::new(FailingDatabase),
            Arc::new(MemorySiteRepository::with_projects([project.clone()])),
            Arc::new(StaticLicense::licensed()),
        );
        let resolver = RedirectResolver::new(Arc::new(manager));

        assert!(resolver.resolve("/old", 404, &project).is_none());
        assert!(resolver.resolve("/old?x=1", 404, &project).is_none());
    }

    #[test]
    fn test_global_scope_prefixes_language_once() {
        let project = Project::new("main", "en");
        let manager = RedirectManager::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(MemorySiteRepository::with_projects([project.clone()])),
            Arc::new(StaticLicense::licensed()),
        )
        .with_scope(RedirectScope::Global);
        manager.add_redirect("/en/old", "/en/new", &project).unwrap();

        let response = RedirectResolver::new(Arc::new(manager))
            .resolve("/en/old", 404, &project)
            .unwrap();
        assert_eq!(response.location, "/en/new");
    }

    #[test]
    fn test_protocol_relative_target() {
        let project = Project::new("main", "en");
        let resolver = resolver(&project, false);
        resolver.manager.add_redirect("/cdn", "//cdn.example/file", &project).unwrap();

        let response = resolver.resolve("/cdn", 404, &project).unwrap();
        assert_eq!(response.location, "//cdn.example/file");
    }
}
