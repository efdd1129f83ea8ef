use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;
use url::Url;

const INTERNAL_LINK_PREFIX: &str = "index.php?id=";

/// Returns whether a URL uses the CMS's internal link form (`index.php?id=...`)
///
/// Leading and trailing slashes are ignored, so `/index.php?id=1` is internal
/// while `https://host/index.php?id=1` is not.
pub fn is_internal(url: &str) -> bool {
    url.trim_matches('/').starts_with(INTERNAL_LINK_PREFIX)
}

/// Returns whether a URL names a host without a scheme (`//cdn.example/file`)
pub fn is_protocol_relative(url: &str) -> bool {
    url.starts_with("//") && url.len() > 2
}

/// A parsed internal link: `index.php?id=<page>[&project=<name>][&lang=<code>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalLink {
    pub page_id: u64,
    pub project: Option<String>, // Project name, if the link names one
    pub lang: Option<String>,    // Project language, if the link names one
}

impl InternalLink {
    pub fn parse(link: &str) -> Result<Self> {
        if !is_internal(link) {
            bail!("'{}' is not an internal link", link);
        }

        let parsed = Url::parse("http://localhost/")
            .and_then(|base| base.join(link.trim_matches('/')))
            .with_context(|| format!("Failed to parse internal link '{}'", link))?;

        let mut page_id = None;
        let mut project = None;
        let mut lang = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "id" => {
                    page_id = Some(value.parse::<u64>().with_context(|| {
                        format!("Internal link '{}' has a non-numeric id", link)
                    })?)
                }
                "project" if !value.is_empty() => project = Some(value.into_owned()),
                "lang" if !value.is_empty() => lang = Some(value.into_owned()),
                _ => debug!("Ignoring parameter '{}' of internal link", key),
            }
        }

        let page_id = page_id.ok_or_else(|| anyhow!("Internal link '{}' has no id", link))?;

        Ok(InternalLink { page_id, project, lang })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal() {
        assert!(is_internal("index.php?id=123"));
        assert!(is_internal("/index.php?id=123"));
        assert!(!is_internal("https://foo.bar/index.php?id=123"));
        assert!(!is_internal("foo.bar/index.php?id=123"));
    }

    #[test]
    fn test_parse_internal_link() {
        let link = InternalLink::parse("index.php?id=12&project=shop&lang=de").unwrap();
        assert_eq!(link.page_id, 12);
        assert_eq!(link.project.as_deref(), Some("shop"));
        assert_eq!(link.lang.as_deref(), Some("de"));

        let link = InternalLink::parse("/index.php?id=7").unwrap();
        assert_eq!(link.page_id, 7);
        assert!(link.project.is_none());
    }

    #[test]
    fn test_parse_internal_link_rejects_bad_id() {
        assert!(InternalLink::parse("index.php?id=abc").is_err());
        assert!(InternalLink::parse("/some/page").is_err());
    }

    #[test]
    fn test_is_protocol_relative() {
        assert!(is_protocol_relative("//cdn.example/file"));
        assert!(!is_protocol_relative("/cdn.example/file"));
        assert!(!is_protocol_relative("//"));
        assert!(!is_protocol_relative("https://cdn.example/file"));
    }
}
