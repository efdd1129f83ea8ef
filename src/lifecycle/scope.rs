use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::site::PageRef;

/// The page lifecycle events the hooks react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    MoveBefore,
    MoveAfter,
    SaveBefore,
    Save,
    Deactivate,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StagingKey {
    project: String,
    lang: String,
    page_id: u64,
}

impl From<&PageRef> for StagingKey {
    fn from(page: &PageRef) -> Self {
        Self {
            project: page.project.name.clone(),
            lang: page.project.lang.clone(),
            page_id: page.page_id,
        }
    }
}

/// Scratch space of one editor request
///
/// "Before" hooks stage the URLs pages had before an operation, the matching
/// "after" hooks consume them. The scope also remembers which page each hook
/// already handled, so a host firing the same event twice adds nothing twice.
/// Drop the scope (or call [`HookScope::finish`]) when the request ends.
#[derive(Debug)]
pub struct HookScope {
    id: Uuid,
    staged: HashMap<StagingKey, String>,
    handled: HashSet<(HookKind, StagingKey)>,
}

impl Default for HookScope {
    fn default() -> Self {
        Self::new()
    }
}

impl HookScope {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        trace!("Opened hook scope {}", id);
        Self {
            id,
            staged: HashMap::new(),
            handled: HashSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remembers the URL a page had before the pending operation
    pub fn stage(&mut self, page: &PageRef, url: String) {
        trace!("Staging {} for page {}", url, page.page_id);
        self.staged.insert(page.into(), url);
    }

    /// Removes and returns the staged URL of a page
    pub fn take(&mut self, page: &PageRef) -> Option<String> {
        self.staged.remove(&StagingKey::from(page))
    }

    pub fn staged(&self, page: &PageRef) -> Option<&str> {
        self.staged.get(&StagingKey::from(page)).map(String::as_str)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Marks a page as handled by `kind`; returns false if it already was
    pub fn mark_handled(&mut self, kind: HookKind, page: &PageRef) -> bool {
        self.handled.insert((kind, page.into()))
    }

    /// Ends the scope, returning how many staged URLs were never consumed
    pub fn finish(self) -> usize {
        let orphaned = self.staged.len();
        if orphaned > 0 {
            debug!("Hook scope {} dropped {} orphaned staging entries", self.id, orphaned);
        }
        orphaned
    }
}
