//! Creating, looking up and removing redirects
//!
//! [`RedirectManager`] owns the rules for what gets stored: sources are
//! normalized before hashing, internal links are resolved to the pretty URL
//! of the page they point at, and the free-tier limit is enforced before
//! every write.

pub mod errors;
pub mod license;
pub mod permission;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::site::{Project, SiteRepository};
use crate::store::{redirect_key, ListQuery, RedirectDatabase, RedirectEntry, RedirectPage, TableName};
use crate::url_parser::{
    is_internal, is_protocol_relative, prepare_internal_target_url, InternalLink, RedirectUrl,
};

pub use errors::RedirectError;
pub use license::{LicenseCheck, StaticLicense, FREE_REDIRECTS};
pub use permission::{Actor, Permission};

/// Where redirects are kept and how rows are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectScope {
    /// One table per project, keyed by a hash of the normalized source
    #[default]
    Project,
    /// One table for the whole installation, keyed by the raw source URL
    Global,
}

/// Result of adding several redirects at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub added: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub struct RedirectManager {
    db: Arc<dyn RedirectDatabase>,
    sites: Arc<dyn SiteRepository>,
    license: Arc<dyn LicenseCheck>,
    scope: RedirectScope,
}

impl RedirectManager {
    pub fn new(
        db: Arc<dyn RedirectDatabase>,
        sites: Arc<dyn SiteRepository>,
        license: Arc<dyn LicenseCheck>,
    ) -> Self {
        Self {
            db,
            sites,
            license,
            scope: RedirectScope::Project,
        }
    }

    pub fn with_scope(mut self, scope: RedirectScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> RedirectScope {
        self.scope
    }

    pub fn sites(&self) -> &dyn SiteRepository {
        self.sites.as_ref()
    }

    fn table(&self, project: &Project) -> TableName {
        match self.scope {
            RedirectScope::Project => TableName::for_project(project),
            RedirectScope::Global => TableName::global(),
        }
    }

    /// Normalized source and row id for a source URL
    fn key(&self, source_url: &str) -> Result<(String, String), RedirectError> {
        if source_url.trim().is_empty() {
            return Err(RedirectError::InvalidUrl("source URL is empty".to_string()));
        }

        match self.scope {
            RedirectScope::Project => {
                let source = RedirectUrl::parse(source_url)
                    .map_err(|e| RedirectError::InvalidUrl(format!("{}: {:#}", source_url, e)))?
                    .source_key();
                let id = redirect_key(&source);
                Ok((source, id))
            }
            RedirectScope::Global => Ok((source_url.to_string(), source_url.to_string())),
        }
    }

    /// Adds (or replaces) the redirect for `source_url`
    ///
    /// # Arguments
    /// * `source_url` - URL to redirect from; normalized before storing
    /// * `target_url` - Absolute URL, path, or internal link (`index.php?id=...`)
    /// * `project` - Project whose table receives the redirect
    ///
    /// # Returns
    /// * `Err(RedirectError::NotLicensed)` when the free limit is reached without a license
    #[instrument(level = "debug", skip(self, project), fields(project = %project.name, lang = %project.lang))]
    pub fn add_redirect(
        &self,
        source_url: &str,
        target_url: &str,
        project: &Project,
    ) -> Result<(), RedirectError> {
        self.check_license()?;

        let (source, id) = self.key(source_url)?;
        let target = self.resolve_target(target_url, project)?;
        let entry = RedirectEntry::new(source, target);

        self.db
            .replace(&self.table(project), &id, &entry)
            .map_err(|e| {
                error!("Failed to store redirect {} -> {}: {:#}", entry.source_url, entry.target_url, e);
                RedirectError::Storage(e)
            })?;

        info!("Added redirect {} -> {}", entry.source_url, entry.target_url);
        Ok(())
    }

    /// Adds several redirects, continuing past individual failures
    ///
    /// Running into the license limit aborts the batch and is returned as an error.
    #[instrument(level = "debug", skip_all, fields(count = redirects.len()))]
    pub fn add_redirects(
        &self,
        redirects: &[RedirectEntry],
        project: &Project,
    ) -> Result<BatchOutcome, RedirectError> {
        let mut outcome = BatchOutcome::default();

        for redirect in redirects {
            match self.add_redirect(&redirect.source_url, &redirect.target_url, project) {
                Ok(()) => outcome.added += 1,
                Err(e) if e.is_not_licensed() => return Err(e),
                Err(e) => {
                    warn!("Could not add redirect for {}: {}", redirect.source_url, e);
                    outcome.failed += 1;
                }
            }
        }

        debug!("Batch finished: {} added, {} failed", outcome.added, outcome.failed);
        Ok(outcome)
    }

    /// Looks up the stored target for a source URL
    pub fn get_redirect_for_url(&self, source_url: &str, project: &Project) -> Result<Option<String>> {
        let (source, id) = self.key(source_url).map_err(anyhow::Error::new)?;
        let entry = self.db.fetch(&self.table(project), &id)?;

        if entry.is_none() {
            debug!("No redirect stored for {}", source);
        }
        Ok(entry.map(|e| e.target_url))
    }

    /// Removes the redirect for `source_url`
    ///
    /// Requires [`Permission::RedirectDelete`]. Returns whether a redirect was removed.
    #[instrument(level = "debug", skip(self, actor, project), fields(user = %actor.id))]
    pub fn delete_redirect(
        &self,
        actor: &Actor,
        source_url: &str,
        project: &Project,
    ) -> Result<bool, RedirectError> {
        Self::require(actor, Permission::RedirectDelete)?;

        let (source, id) = self.key(source_url)?;
        let removed = self.db.delete(&self.table(project), &id).map_err(|e| {
            error!("Failed to delete redirect {}: {:#}", source, e);
            RedirectError::Storage(e)
        })?;

        if removed {
            info!("Deleted redirect {}", source);
        } else {
            debug!("No redirect to delete for {}", source);
        }
        Ok(removed)
    }

    /// Removes several redirects; failures of single entries are logged and skipped
    pub fn delete_redirects(
        &self,
        actor: &Actor,
        source_urls: &[String],
        project: &Project,
    ) -> Result<usize, RedirectError> {
        Self::require(actor, Permission::RedirectDelete)?;

        let mut removed = 0;
        for source_url in source_urls {
            match self.delete_redirect(actor, source_url, project) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not delete redirect {}: {}", source_url, e),
            }
        }
        Ok(removed)
    }

    /// Lists the redirects of a project, filtered and windowed by `query`
    pub fn get_redirects(&self, project: &Project, query: &ListQuery) -> Result<RedirectPage> {
        let mut entries = self.db.fetch_all(&self.table(project))?;

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            entries.retain(|entry| entry.matches(search));
        }

        let total = entries.len();
        let entries = entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(RedirectPage { entries, total })
    }

    /// Number of redirects of one project, or of all projects when `project` is `None`
    pub fn redirect_count(&self, project: Option<&Project>) -> Result<usize> {
        if let Some(project) = project {
            return self.db.count(&self.table(project));
        }

        if self.scope == RedirectScope::Global {
            return self.db.count(&TableName::global());
        }

        let mut count = 0;
        for project in self.sites.projects()? {
            count += self.db.count(&self.table(&project))?;
        }
        Ok(count)
    }

    /// Resolves an internal link to the rewritten URL of its page
    pub fn rewritten_url_for_link(&self, link: &str, context: &Project) -> Result<String, RedirectError> {
        let page = self.page_for_link(link, context)?;
        Ok(page.url_rewritten)
    }

    fn page_for_link(&self, link: &str, context: &Project) -> Result<crate::site::Page, RedirectError> {
        let link = InternalLink::parse(link).map_err(|e| RedirectError::InvalidUrl(format!("{:#}", e)))?;

        let project = match (&link.project, &link.lang) {
            (Some(name), lang) => self
                .sites
                .project(name, lang.as_deref().unwrap_or(&context.lang))?
                .ok_or_else(|| RedirectError::UnknownTarget(format!("project {}", name)))?,
            (None, Some(lang)) if *lang != context.lang => self
                .sites
                .project(&context.name, lang)?
                .ok_or_else(|| RedirectError::UnknownTarget(format!("project {} ({})", context.name, lang)))?,
            _ => context.clone(),
        };

        self.sites
            .page(&project, link.page_id)
            .map_err(|e| RedirectError::UnknownTarget(format!("page {}: {:#}", link.page_id, e)))
    }

    /// Turns a requested target into the form that is stored
    ///
    /// Internal links become the page's path (same project) or its absolute
    /// URL (other project). Absolute and protocol-relative URLs are kept.
    /// Relative targets are normalized in either scope, so the language
    /// prefix added on redirect is never doubled.
    fn resolve_target(&self, target_url: &str, project: &Project) -> Result<String, RedirectError> {
        if target_url.trim().is_empty() {
            return Err(RedirectError::InvalidUrl("target URL is empty".to_string()));
        }

        if is_internal(target_url) {
            let page = self.page_for_link(target_url, project)?;

            return if page.project == *project {
                prepare_internal_target_url(&page.url_rewritten)
                    .map_err(|e| RedirectError::InvalidUrl(format!("{:#}", e)))
            } else {
                Ok(self.sites.url_rewritten_with_host(&page)?)
            };
        }

        if is_protocol_relative(target_url) || Url::parse(target_url).is_ok() {
            return Ok(target_url.to_string());
        }

        RedirectUrl::parse(target_url)
            .map(|url| url.source_key())
            .map_err(|e| RedirectError::InvalidUrl(format!("{}: {:#}", target_url, e)))
    }

    fn check_license(&self) -> Result<(), RedirectError> {
        let count = match self
            .redirect_count(None)
            .context("Failed to count redirects for the license check")
        {
            Ok(count) => count,
            Err(e) => {
                // Not being able to count must not block editors
                error!("{:#}", e);
                return Ok(());
            }
        };

        if count < FREE_REDIRECTS || self.license.has_license() {
            return Ok(());
        }

        warn!("Free redirect limit of {} reached without a license", FREE_REDIRECTS);
        Err(RedirectError::NotLicensed {
            free_redirects: FREE_REDIRECTS,
            store_url: self.license.store_url(),
        })
    }

    fn require(actor: &Actor, permission: Permission) -> Result<(), RedirectError> {
        if actor.has_permission(permission) {
            return Ok(());
        }

        warn!("User '{}' lacks permission '{}'", actor.id, permission.as_str());
        Err(RedirectError::PermissionDenied {
            user: actor.id.clone(),
            permission: permission.as_str().to_string(),
        })
    }
}
