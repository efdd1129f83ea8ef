//! The slice of the host CMS the redirect manager depends on
//!
//! Projects, their page trees and the rewritten URL of each page are reached
//! through [`SiteRepository`], so the manager can run against any CMS that
//! can answer those questions.

pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use memory::MemorySiteRepository;

/// Id of the page every project tree is rooted in
pub const ROOT_PAGE_ID: u64 = 1;

/// A CMS project in one language
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub lang: String,
    /// Virtual host the project is served from, if any
    #[serde(default)]
    pub host: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn has_vhost(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// A page of a project, as far as redirects are concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: u64,
    pub project: Project,
    pub parent_id: Option<u64>,
    pub active: bool,
    pub url_rewritten: String, // Pretty URL of the page, as the host would link it
}

/// Identifies a page without loading it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub project: Project,
    pub page_id: u64,
}

impl PageRef {
    pub fn new(project: &Project, page_id: u64) -> Self {
        Self {
            project: project.clone(),
            page_id,
        }
    }
}

/// Read access to the host's projects and page trees
pub trait SiteRepository: Send + Sync {
    /// All projects of the installation
    fn projects(&self) -> Result<Vec<Project>>;

    /// The project used when a caller names none
    fn default_project(&self) -> Result<Project>;

    /// Loads a page; fails if it does not exist
    fn page(&self, project: &Project, page_id: u64) -> Result<Page>;

    /// Ids of the direct children of a page, active or not
    fn children(&self, project: &Project, page_id: u64) -> Result<Vec<u64>>;

    /// The project with the given name and language, if it exists
    fn project(&self, name: &str, lang: &str) -> Result<Option<Project>> {
        Ok(self
            .projects()?
            .into_iter()
            .find(|p| p.name == name && (lang.is_empty() || p.lang == lang)))
    }

    /// The page's rewritten URL including scheme and host
    fn url_rewritten_with_host(&self, page: &Page) -> Result<String> {
        match &page.project.host {
            Some(host) if !host.is_empty() => {
                let host = host.trim_end_matches('/');
                if host.starts_with("http://") || host.starts_with("https://") {
                    Ok(format!("{}{}", host, page.url_rewritten))
                } else {
                    Ok(format!("https://{}{}", host, page.url_rewritten))
                }
            }
            _ => Ok(page.url_rewritten.clone()),
        }
    }
}

/// Resolves the project named by request parameters
///
/// An empty name selects the default project. Unknown projects yield `None`.
pub fn resolve_project(
    sites: &dyn SiteRepository,
    name: &str,
    lang: &str,
) -> Result<Option<Project>> {
    if name.is_empty() {
        trace!("No project named, using default project");
        return sites.default_project().map(Some);
    }

    let project = sites.project(name, lang)?;
    if project.is_none() {
        debug!("Unknown project requested: {} ({})", name, lang);
    }
    Ok(project)
}

/// Returns all (grand-)children of a page, parents before their children
///
/// Pages whose children cannot be listed are treated as leaves.
pub fn descendants(sites: &dyn SiteRepository, project: &Project, page_id: u64) -> Vec<Page> {
    let mut result = Vec::new();
    let mut pending = match sites.children(project, page_id) {
        Ok(children) => children,
        Err(e) => {
            debug!("Could not list children of page {}: {}", page_id, e);
            return result;
        }
    };
    pending.reverse();

    while let Some(child_id) = pending.pop() {
        let child = match sites.page(project, child_id) {
            Ok(child) => child,
            Err(e) => {
                debug!("Skipping child page {}: {}", child_id, e);
                continue;
            }
        };

        if let Ok(mut grand_children) = sites.children(project, child_id) {
            grand_children.reverse();
            pending.extend(grand_children);
        }

        result.push(child);
    }

    result
}

/// The project a frontend request was made against
///
/// A project whose virtual host matches `host` wins. Otherwise the default
/// project is used, switched to the language named by a leading two
/// character path segment when the project exists in that language.
pub fn project_for_request(sites: &dyn SiteRepository, host: &str, path: &str) -> Result<Project> {
    let host = host.split(':').next().unwrap_or_default();
    let projects = sites.projects()?;

    let by_host = projects.iter().find(|p| {
        p.host.as_deref().is_some_and(|h| {
            let h = h.trim_start_matches("https://").trim_start_matches("http://");
            h.trim_end_matches('/').eq_ignore_ascii_case(host)
        })
    });
    if let Some(project) = by_host {
        trace!("Request host {} belongs to project {}", host, project.name);
        return Ok(project.clone());
    }

    let default = sites.default_project()?;
    let lang = path.trim_start_matches('/').split(['/', '?', '#']).next().unwrap_or_default();
    if lang.chars().count() == 2 && lang != default.lang {
        if let Some(project) = projects
            .into_iter()
            .find(|p| p.name == default.name && p.lang == lang && !p.has_vhost())
        {
            return Ok(project);
        }
    }

    Ok(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_for_request() {
        let en = Project::new("main", "en");
        let de = Project::new("main", "de");
        let shop = Project::new("shop", "en").with_host("https://shop.example/");
        let sites = MemorySiteRepository::with_projects([en.clone(), de.clone(), shop.clone()]);

        assert_eq!(project_for_request(&sites, "shop.example:8080", "/cart").unwrap(), shop);
        assert_eq!(project_for_request(&sites, "localhost", "/de/alt").unwrap(), de);
        assert_eq!(project_for_request(&sites, "localhost", "/fr/old").unwrap(), en);
        assert_eq!(project_for_request(&sites, "localhost", "/old?x=1").unwrap(), en);
    }

    #[test]
    fn test_resolve_project_defaults() {
        let en = Project::new("main", "en");
        let sites = MemorySiteRepository::with_projects([en.clone()]);
        assert_eq!(resolve_project(&sites, "", "").unwrap(), Some(en.clone()));
        assert_eq!(resolve_project(&sites, "main", "").unwrap(), Some(en));
        assert_eq!(resolve_project(&sites, "other", "en").unwrap(), None);
    }
}
