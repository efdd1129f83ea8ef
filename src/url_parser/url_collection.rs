use serde::{Deserialize, Serialize};
use tracing::trace;

/// A proposed redirect for a child page of a moved or removed page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRedirect {
    pub source: String, // The child's old URL
    pub target: String, // Suggested new URL, empty if none could be derived
}

/// Replaces `prefix` at the start of `url` with `replacement`
///
/// A bare `/` on either side is treated as an empty prefix, which avoids
/// producing `//` or gluing segments together.
fn replace_prefix(url: &str, prefix: &str, replacement: &str) -> Option<String> {
    let prefix = if prefix == "/" { "" } else { prefix };
    let replacement = if replacement == "/" { "" } else { replacement };

    // Only the beginning may be replaced; the prefix can occur again further down the path
    url.strip_prefix(prefix)
        .map(|rest| format!("{}{}", replacement, rest))
}

/// Derives redirect targets for children from their parent's redirect
///
/// Every child URL that starts with `parent_source` gets the same prefix
/// swapped for `parent_target`. Children that don't share the prefix, or all
/// children when the parent has no source or target, get an empty target.
///
/// # Arguments
/// * `children_urls` - Old URLs of the (grand-)children
/// * `parent_source` - Old URL of the parent
/// * `parent_target` - New URL of the parent
pub fn make_children_redirects(
    children_urls: &[String],
    parent_source: &str,
    parent_target: &str,
) -> Vec<ChildRedirect> {
    children_urls
        .iter()
        .map(|child_url| {
            let target = if parent_source.is_empty() || parent_target.is_empty() {
                String::new()
            } else {
                replace_prefix(child_url, parent_source, parent_target).unwrap_or_default()
            };

            trace!("Child redirect proposal: {} -> {:?}", child_url, target);
            ChildRedirect {
                source: child_url.clone(),
                target,
            }
        })
        .collect()
}

/// Reconstructs a child's old URL from its current URL and its parent's redirect
///
/// This is the inverse of [`make_children_redirects`]: `child_url` must start
/// with `parent_target`, which is swapped back for `parent_source`.
pub fn generate_child_source_url_from_parent_redirect_urls(
    child_url: &str,
    parent_source: &str,
    parent_target: &str,
) -> Option<String> {
    replace_prefix(child_url, parent_target, parent_source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_children_redirects() {
        let children = vec![
            "/foo/a".to_string(),
            "/foo/b/c".to_string(),
            "/foo/b/c/foo/d".to_string(),
        ];

        let redirects = make_children_redirects(&children, "/foo", "/bar");

        assert_eq!(redirects.len(), 3);
        assert!(redirects.contains(&ChildRedirect {
            source: "/foo/a".to_string(),
            target: "/bar/a".to_string(),
        }));
        assert!(redirects.contains(&ChildRedirect {
            source: "/foo/b/c".to_string(),
            target: "/bar/b/c".to_string(),
        }));
        assert!(redirects.contains(&ChildRedirect {
            source: "/foo/b/c/foo/d".to_string(),
            target: "/bar/b/c/foo/d".to_string(),
        }));
    }

    #[test]
    fn test_root_target_does_not_double_slash() {
        let children = vec!["/foo/a".to_string()];
        let redirects = make_children_redirects(&children, "/foo", "/");
        assert_eq!(redirects[0].target, "/a");
    }

    #[test]
    fn test_missing_parent_target_leaves_children_empty() {
        let children = vec!["/foo/a".to_string(), "/other".to_string()];
        let redirects = make_children_redirects(&children, "/foo", "");
        assert!(redirects.iter().all(|r| r.target.is_empty()));

        let redirects = make_children_redirects(&children, "/foo", "/bar");
        assert_eq!(redirects[1].target, "");
    }

    #[test]
    fn test_generate_child_source_url() {
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/hi/world", "/hello", "/hi"),
            Some("/hello/world".to_string())
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/hello/world", "/hi", "/hello"),
            Some("/hi/world".to_string())
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/a/b/c/d", "/x/y", "/a/b"),
            Some("/x/y/c/d".to_string())
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/world", "/hello", "/"),
            Some("/hello/world".to_string())
        );
        assert_eq!(
            generate_child_source_url_from_parent_redirect_urls("/elsewhere", "/hello", "/hi"),
            None
        );
    }
}
