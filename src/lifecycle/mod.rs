//! Redirects created from page lifecycle events
//!
//! The host calls these hooks around page moves, saves, deactivations and
//! deletions. Moves and saves add redirects from every old URL to the new
//! one; removals produce a [`RedirectProposal`] the editor can confirm
//! (or that is added right away when configured so).
//!
//! "Before" hooks must run while the page still has its old URL, and the
//! removal hooks while the page still exists.

pub mod scope;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter;
use tracing::{debug, error, info, instrument, warn};

use crate::manager::{RedirectError, RedirectManager};
use crate::site::{descendants, Page, PageRef, Project, SiteRepository, ROOT_PAGE_ID};
use crate::url_parser::{
    generate_child_source_url_from_parent_redirect_urls, make_children_redirects,
    prepare_internal_target_url, prepare_source_url, ChildRedirect,
};

pub use scope::{HookKind, HookScope};
pub use session::{DialogFlow, DialogStep, MemorySessionStore, SessionStore, KEY_URLS_TO_PROCESS};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleConfig {
    /// Add the redirects of deactivated and deleted pages without asking
    #[serde(default)]
    pub auto_redirect_removed_pages: bool,
}

/// Messages for the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    RedirectsAdded { count: usize },
    LicenseLimitReached { message: String, store_url: Option<String> },
}

/// Redirect suggested for a page that is going away
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectProposal {
    pub source_url: String,
    pub target_url: String, // The parent's path, empty if the page has no parent
    pub project: String,
    pub lang: String,
    pub children: Vec<ChildRedirect>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookOutcome {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
    pub proposal: Option<RedirectProposal>,
    pub notices: Vec<Notice>,
}

impl HookOutcome {
    /// Records a failed add; returns true when processing has to stop
    fn record_failure(&mut self, url: &str, error: RedirectError) -> bool {
        if let RedirectError::NotLicensed { store_url, .. } = &error {
            warn!("License limit reached while adding redirect for {}", url);
            self.notices.push(Notice::LicenseLimitReached {
                message: error.to_string(),
                store_url: store_url.clone(),
            });
            return true;
        }

        error!("Failed to add redirect for {}: {}", url, error);
        self.failed += 1;
        false
    }
}

pub struct LifecycleHooks<'a> {
    manager: &'a RedirectManager,
    config: LifecycleConfig,
}

impl<'a> LifecycleHooks<'a> {
    pub fn new(manager: &'a RedirectManager, config: LifecycleConfig) -> Self {
        Self { manager, config }
    }

    fn sites(&self) -> &dyn SiteRepository {
        self.manager.sites()
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_move_before(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        self.stage_urls(scope, HookKind::MoveBefore, page)
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_move_after(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        self.redirect_changed_urls(scope, HookKind::MoveAfter, page)
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_save_before(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        if page.page_id == ROOT_PAGE_ID {
            return HookOutcome::default();
        }
        self.stage_urls(scope, HookKind::SaveBefore, page)
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_save(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        if page.page_id == ROOT_PAGE_ID {
            return HookOutcome::default();
        }
        self.redirect_changed_urls(scope, HookKind::Save, page)
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_deactivate(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        self.propose_removal(scope, HookKind::Deactivate, page)
    }

    #[instrument(level = "debug", skip(self, scope, page), fields(page_id = page.page_id))]
    pub fn on_page_delete(&self, scope: &mut HookScope, page: &PageRef) -> HookOutcome {
        self.propose_removal(scope, HookKind::Delete, page)
    }

    /// Loads the page a hook fired for, if it is active and not handled yet
    fn active_page(&self, scope: &mut HookScope, kind: HookKind, page: &PageRef) -> Option<Page> {
        if !scope.mark_handled(kind, page) {
            debug!("Page {} already handled by {:?}", page.page_id, kind);
            return None;
        }

        match self.sites().page(&page.project, page.page_id) {
            Ok(loaded) if loaded.active => Some(loaded),
            Ok(_) => {
                debug!("Ignoring inactive page {}", page.page_id);
                None
            }
            Err(e) => {
                warn!("Could not load page {}: {:#}", page.page_id, e);
                None
            }
        }
    }

    fn stage_urls(&self, scope: &mut HookScope, kind: HookKind, page_ref: &PageRef) -> HookOutcome {
        let mut outcome = HookOutcome::default();
        let Some(page) = self.active_page(scope, kind, page_ref) else {
            return outcome;
        };

        let children = descendants(self.sites(), &page_ref.project, page.id);
        for page in iter::once(page).chain(children) {
            match prepare_source_url(&page.url_rewritten) {
                Ok(url) => scope.stage(&PageRef::new(&page_ref.project, page.id), url),
                Err(e) => {
                    warn!("Could not stage URL of page {}: {:#}", page.id, e);
                    outcome.failed += 1;
                }
            }
        }

        debug!("{} URL(s) staged", scope.staged_count());
        outcome
    }

    fn redirect_changed_urls(&self, scope: &mut HookScope, kind: HookKind, page_ref: &PageRef) -> HookOutcome {
        let mut outcome = HookOutcome::default();
        let Some(page) = self.active_page(scope, kind, page_ref) else {
            return outcome;
        };

        let project = &page_ref.project;
        let root_id = page.id;
        let children = descendants(self.sites(), project, page.id);

        // Old and new URL of every page processed so far, for children without a staged URL
        let mut changes: HashMap<u64, (String, String)> = HashMap::new();

        for page in iter::once(page).chain(children) {
            let current = PageRef::new(project, page.id);
            if page.id != root_id && !scope.mark_handled(kind, &current) {
                outcome.skipped += 1;
                continue;
            }

            let new_url = match prepare_internal_target_url(&page.url_rewritten) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Could not read new URL of page {}: {:#}", page.id, e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let old_url = scope.take(&current).or_else(|| {
                let (parent_old, parent_new) = changes.get(&page.parent_id?)?;
                generate_child_source_url_from_parent_redirect_urls(&new_url, parent_old, parent_new)
            });

            let Some(old_url) = old_url else {
                debug!("No previous URL known for page {}", page.id);
                outcome.skipped += 1;
                continue;
            };

            changes.insert(page.id, (old_url.clone(), new_url.clone()));

            if old_url == new_url {
                outcome.skipped += 1;
                continue;
            }

            match self.manager.add_redirect(&old_url, &new_url, project) {
                Ok(()) => outcome.added += 1,
                Err(e) => {
                    if outcome.record_failure(&old_url, e) {
                        return outcome;
                    }
                }
            }
        }

        if outcome.added > 0 {
            info!("Added {} redirect(s) for page {} and its children", outcome.added, root_id);
            outcome.notices.push(Notice::RedirectsAdded { count: outcome.added });
        }
        outcome
    }

    fn propose_removal(&self, scope: &mut HookScope, kind: HookKind, page_ref: &PageRef) -> HookOutcome {
        let mut outcome = HookOutcome::default();
        let Some(page) = self.active_page(scope, kind, page_ref) else {
            return outcome;
        };
        let project = &page_ref.project;

        let source_url = match prepare_source_url(&page.url_rewritten) {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not read URL of page {}: {:#}", page.id, e);
                outcome.failed += 1;
                return outcome;
            }
        };

        let target_url = page
            .parent_id
            .and_then(|parent_id| match self.sites().page(project, parent_id) {
                Ok(parent) => prepare_internal_target_url(&parent.url_rewritten).ok(),
                Err(e) => {
                    warn!("Could not load parent {} of page {}: {:#}", parent_id, page.id, e);
                    None
                }
            })
            .unwrap_or_default();

        let children_urls: Vec<String> = descendants(self.sites(), project, page.id)
            .iter()
            .filter_map(|child| prepare_source_url(&child.url_rewritten).ok())
            .collect();

        let proposal = RedirectProposal {
            children: make_children_redirects(&children_urls, &source_url, &target_url),
            source_url,
            target_url,
            project: project.name.clone(),
            lang: project.lang.clone(),
        };

        if self.config.auto_redirect_removed_pages {
            self.add_proposal(&proposal, &page_ref.project, &mut outcome);
        }

        outcome.proposal = Some(proposal);
        outcome
    }

    fn add_proposal(&self, proposal: &RedirectProposal, project: &Project, outcome: &mut HookOutcome) {
        if proposal.target_url.is_empty() {
            debug!("No target for {}, nothing added", proposal.source_url);
            return;
        }

        let redirects = iter::once((&proposal.source_url, &proposal.target_url))
            .chain(proposal.children.iter().map(|c| (&c.source, &c.target)));

        for (source, target) in redirects {
            if target.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            match self.manager.add_redirect(source, target, project) {
                Ok(()) => outcome.added += 1,
                Err(e) => {
                    if outcome.record_failure(source, e) {
                        return;
                    }
                }
            }
        }

        if outcome.added > 0 {
            outcome.notices.push(Notice::RedirectsAdded { count: outcome.added });
        }
    }
}
