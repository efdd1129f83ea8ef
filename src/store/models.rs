use serde::{Deserialize, Serialize};

/// A stored redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub source_url: String, // Normalized source, the lookup key
    pub target_url: String, // Internal path or absolute URL
}

impl RedirectEntry {
    pub fn new(source_url: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            target_url: target_url.into(),
        }
    }

    /// Whether either column contains `needle`
    ///
    /// Columns are compared as stored and percent-decoded, so `über` finds
    /// a source stored as `/%C3%BCber`.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.source_url, &self.target_url]
            .into_iter()
            .any(|column| column.contains(needle) || decoded(column).contains(needle))
    }
}

// Invalid UTF-8 sequences become U+FFFD
fn decoded(column: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(column.as_bytes())).into_owned()
}


/// Filter and window for listing redirects
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>, // Substring matched against source and target
    pub offset: usize,
    pub limit: Option<usize>,   // No limit when unset
}

impl ListQuery {
    /// Window for a 1-based grid page
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            search: None,
            offset: page.saturating_sub(1).saturating_mul(per_page),
            limit: Some(per_page),
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.is_empty() { None } else { Some(search) };
        self
    }
}

/// One window of a redirect listing
#[derive(Debug, Clone, Serialize)]
pub struct RedirectPage {
    pub entries: Vec<RedirectEntry>,
    pub total: usize, // Number of entries matching the filter, across all windows
}
