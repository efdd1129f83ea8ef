use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::{debug, trace};
use url::{ParseError, Url};

/// Base used to resolve relative inputs like `/foo?x=1` or `index.php?id=3`
static RELATIVE_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("static base URL is valid"));

/// Length of a path segment that is treated as a language code
const LANGUAGE_SEGMENT_LENGTH: usize = 2;

/// A URL split into the parts the redirect tables care about
///
/// Absolute and relative inputs are both accepted. Relative inputs are
/// resolved against a fixed local base so that path, query and fragment
/// are extracted by the same rules in either case.
#[derive(Debug, Clone)]
pub struct RedirectUrl {
    original: String,        // The URL as it was handed in
    path: String,            // Raw path, always starting with '/'
    query: Option<String>,   // Non-empty query component
    fragment: Option<String>, // Non-empty fragment component
    has_path: bool,          // Whether the input carried any path at all
}

impl RedirectUrl {
    /// Parses an absolute or relative URL
    ///
    /// # Arguments
    /// * `url` - The URL to parse, e.g. `https://example.com/en/foo?x=1` or `/foo#bar`
    ///
    /// # Returns
    /// * `Result<RedirectUrl>` - The split URL, or an error if the input is not a URL
    ///
    /// An empty input has no path and reads as `/`.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(ParseError::RelativeUrlWithoutBase) => {
                trace!("Resolving relative URL against local base: {}", url);
                RELATIVE_BASE
                    .join(url)
                    .with_context(|| format!("Failed to resolve relative URL '{}'", url))?
            }
            Err(e) => {
                debug!("Rejected URL '{}': {}", url, e);
                return Err(e).with_context(|| format!("Failed to parse URL '{}'", url));
            }
        };

        let raw_path = parsed.path();
        let path = if raw_path.starts_with('/') {
            raw_path.to_string()
        } else {
            format!("/{}", raw_path)
        };

        Ok(RedirectUrl {
            original: url.to_string(),
            has_path: !path.trim_matches('/').is_empty(),
            path,
            query: parsed.query().filter(|q| !q.is_empty()).map(str::to_string),
            fragment: parsed.fragment().filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// The raw path, `/`-prefixed
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Canonical form used as the key of a redirect source
    ///
    /// Language-neutral path, then `?query`, then `#fragment`.
    pub fn source_key(&self) -> String {
        let mut key = strip_language_from_path(&self.path);

        if let Some(query) = &self.query {
            key.push('?');
            key.push_str(query);
        }

        if let Some(fragment) = &self.fragment {
            key.push('#');
            key.push_str(fragment);
        }

        key
    }

    /// Canonical form used for internal redirect targets: the language-neutral path only
    pub fn internal_target(&self) -> String {
        strip_language_from_path(&self.path)
    }

    /// `path?query#fragment` as given, or an empty string if the URL has none of them
    pub fn relevant_parts(&self) -> String {
        if !self.has_path && self.query.is_none() && self.fragment.is_none() {
            return String::new();
        }

        let mut parts = self.path.clone();
        if let Some(query) = &self.query {
            parts.push('?');
            parts.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            parts.push('#');
            parts.push_str(fragment);
        }
        parts
    }
}

/// Removes a leading two character language segment from a path
///
/// Slashes around the path are collapsed first. The first segment is treated
/// as a language code purely by its length; the result always starts with
/// exactly one `/`.
pub fn strip_language_from_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');

    let (first, rest) = match trimmed.split_once('/') {
        Some((first, rest)) => (first, rest),
        None => (trimmed, ""),
    };

    if first.chars().count() == LANGUAGE_SEGMENT_LENGTH {
        trace!("Stripping language segment '{}' from path '{}'", first, path);
        format!("/{}", rest.trim_start_matches('/'))
    } else {
        format!("/{}", trimmed)
    }
}

/// Prepares a URL for use as a redirect source
///
/// # Arguments
/// * `url` - Absolute or relative URL
///
/// # Returns
/// * `Result<String>` - The `/`-rooted, language-neutral path with query and fragment
pub fn prepare_source_url(url: &str) -> Result<String> {
    Ok(RedirectUrl::parse(url)?.source_key())
}

/// Prepares a URL for use as an internal redirect target (path only)
pub fn prepare_internal_target_url(url: &str) -> Result<String> {
    Ok(RedirectUrl::parse(url)?.internal_target())
}

/// Returns the path of a URL, always starting with `/`
pub fn get_path(url: &str) -> Result<String> {
    Ok(RedirectUrl::parse(url)?.path().to_string())
}

/// Returns the query component of a URL, if there is one
///
/// A `?` written after a `#` belongs to the fragment and is not returned.
pub fn get_query_string(url: &str) -> Result<Option<String>> {
    Ok(RedirectUrl::parse(url)?.query().map(str::to_string))
}

pub fn get_relevant_parts_from_url(url: &str) -> Result<String> {
    Ok(RedirectUrl::parse(url)?.relevant_parts())
}
