#[cfg(test)]
mod tests {
    use anyhow::Result;
    use redirect_manager::url_parser::{
        generate_child_source_url_from_parent_redirect_urls, get_relevant_parts_from_url, is_internal,
        make_children_redirects, prepare_source_url, strip_language_from_path, InternalLink, RedirectUrl,
    };

    #[tokio::test]
    async fn test_basic_url_parsing() -> Result<()> {
        let parsed = RedirectUrl::parse("https://example.com/en/path?query=value")?;

        assert_eq!(parsed.path(), "/en/path");
        assert_eq!(parsed.query(), Some("query=value"));
        assert_eq!(parsed.source_key(), "/path?query=value");
        assert_eq!(parsed.internal_target(), "/path");

        Ok(())
    }

    #[tokio::test]
    async fn test_language_is_only_stripped_once() -> Result<()> {
        assert_eq!(strip_language_from_path("/en/foo/bar"), strip_language_from_path("/foo/bar"));
        assert_eq!(strip_language_from_path("/en/de/foo"), "/de/foo");
        assert_eq!(prepare_source_url("/eng/foo")?, "/eng/foo");

        Ok(())
    }

    #[tokio::test]
    async fn test_query_after_fragment_stays_in_fragment() -> Result<()> {
        let url = "https://example.com/page#section?x=1";
        let parsed = RedirectUrl::parse(url)?;

        assert_eq!(parsed.query(), None);
        assert_eq!(parsed.fragment(), Some("section?x=1"));
        assert_eq!(prepare_source_url(url)?, "/page#section?x=1");

        Ok(())
    }

    #[tokio::test]
    async fn test_relevant_parts() -> Result<()> {
        assert_eq!(get_relevant_parts_from_url("https://example.com")?, "");
        assert_eq!(get_relevant_parts_from_url("https://example.com/en/a?b=c#d")?, "/en/a?b=c#d");

        Ok(())
    }

    #[tokio::test]
    async fn test_internal_links() -> Result<()> {
        assert!(is_internal("index.php?id=123"));
        assert!(is_internal("/index.php?id=123"));
        assert!(!is_internal("https://x/index.php?id=123"));

        let link = InternalLink::parse("index.php?id=12&project=shop&lang=de")?;
        assert_eq!(link.page_id, 12);
        assert_eq!(link.project.as_deref(), Some("shop"));
        assert_eq!(link.lang.as_deref(), Some("de"));

        assert!(InternalLink::parse("index.php?id=abc").is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_child_urls_follow_parent() -> Result<()> {
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/hi/world", "/hello", "/hi").as_deref(),
            Some("/hello/world")
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/hello/world", "/hi", "/hello").as_deref(),
            Some("/hi/world")
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/a/b/c/d", "/x/y", "/a/b").as_deref(),
            Some("/x/y/c/d")
        );

        let children = vec!["/old/a".to_string(), "/other/b".to_string()];
        let redirects = make_children_redirects(&children, "/old", "/");
        assert_eq!(redirects[0].target, "/a");
        assert_eq!(redirects[1].target, "");

        Ok(())
    }
}
