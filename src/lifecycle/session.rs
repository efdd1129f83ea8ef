use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::RedirectProposal;
use crate::manager::{RedirectError, RedirectManager};
use crate::site::Project;

/// Session key of the queue of URLs the editor still has to decide on
pub const KEY_URLS_TO_PROCESS: &str = "redirect_urls_to_process";

/// Per-session key/value storage of the host
pub trait SessionStore: Send + Sync {
    fn get(&self, session: &str, key: &str) -> Result<Option<String>>;
    fn set(&self, session: &str, key: &str, value: String) -> Result<()>;
    fn remove(&self, session: &str, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &str, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(&(session.to_string(), key.to_string())).cloned())
    }

    fn set(&self, session: &str, key: &str, value: String) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert((session.to_string(), key.to_string()), value);
        Ok(())
    }

    fn remove(&self, session: &str, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(&(session.to_string(), key.to_string()));
        Ok(())
    }
}

/// What the editor is asked next after answering one dialog
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DialogStep {
    pub added: usize,
    pub failed: usize,
    pub next_url: Option<String>, // URL to show the next dialog for
}

/// The multi-step "add redirects for these pages too?" dialog
///
/// The queue of pending URLs lives in the editor's session as a JSON array.
pub struct DialogFlow<'a> {
    manager: &'a RedirectManager,
    sessions: &'a dyn SessionStore,
    session_id: &'a str,
}

impl<'a> DialogFlow<'a> {
    pub fn new(manager: &'a RedirectManager, sessions: &'a dyn SessionStore, session_id: &'a str) -> Self {
        Self {
            manager,
            sessions,
            session_id,
        }
    }

    /// Queues the child pages of a proposal
    pub fn begin(&self, proposal: &RedirectProposal) -> Result<()> {
        let urls: Vec<String> = proposal.children.iter().map(|c| c.source.clone()).collect();
        self.queue(&urls)
    }

    /// Replaces the queue of URLs still to process
    pub fn queue(&self, urls: &[String]) -> Result<()> {
        debug!("Queueing {} URL(s) for session {}", urls.len(), self.session_id);
        let raw = serde_json::to_string(urls)?;
        self.sessions.set(self.session_id, KEY_URLS_TO_PROCESS, raw)
    }

    pub fn urls_to_process(&self) -> Result<Vec<String>> {
        match self.sessions.get(self.session_id, KEY_URLS_TO_PROCESS)? {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt URL queue in session {}", self.session_id)),
            _ => Ok(Vec::new()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.sessions.remove(self.session_id, KEY_URLS_TO_PROCESS)
    }

    /// Removes one URL from the queue and returns the remaining ones
    pub fn remove_url(&self, url: &str) -> Result<Vec<String>> {
        let mut urls = self.urls_to_process()?;
        if let Some(position) = urls.iter().position(|u| u == url) {
            urls.remove(position);
            self.queue(&urls)?;
        }
        Ok(urls)
    }

    /// Handles the editor's answer to the dialog for `source_url`
    ///
    /// With `skip_children` every queued URL is redirected to `target_url`
    /// (or dropped when there is no target) and the queue is cleared.
    /// Otherwise `source_url` leaves the queue and the next URL is returned.
    pub fn process_further_urls(
        &self,
        source_url: &str,
        target_url: Option<&str>,
        skip_children: bool,
        project: &Project,
    ) -> Result<DialogStep, RedirectError> {
        let mut step = DialogStep::default();

        if !skip_children {
            let remaining = self.remove_url(source_url)?;
            step.next_url = remaining.into_iter().next();
            return Ok(step);
        }

        let target_url = match target_url.filter(|t| !t.is_empty()) {
            Some(target_url) => target_url,
            None => {
                self.clear()?;
                return Ok(step);
            }
        };

        for url in self.urls_to_process()? {
            match self.manager.add_redirect(&url, target_url, project) {
                Ok(()) => step.added += 1,
                Err(e) if e.is_not_licensed() => {
                    self.clear()?;
                    return Err(e);
                }
                Err(e) => {
                    warn!("Could not add redirect for queued URL {}: {}", url, e);
                    step.failed += 1;
                }
            }
        }

        self.clear()?;
        Ok(step)
    }
}
