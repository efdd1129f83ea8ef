use tracing::trace;

use super::url_validator::is_protocol_relative;
use crate::site::Project;

/// Builds the `Location` of a redirect from a stored target
///
/// The query string of the original request is carried over. Internal
/// targets get the project's language prefix when the project is not served
/// from its own virtual host; absolute and protocol-relative targets are
/// left untouched.
///
/// # Arguments
/// * `target` - The stored target URL (internal path or absolute URL)
/// * `query` - Query string of the incoming request, without the leading `?`
/// * `project` - The project the request was made against
pub fn build_redirect_location(target: &str, query: Option<&str>, project: &Project) -> String {
    let mut location = target.to_string();

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        location.push(if location.contains('?') { '&' } else { '?' });
        location.push_str(query);
    }

    if location.starts_with('/') && !is_protocol_relative(&location) && !project.has_vhost() {
        location = format!("/{}{}", project.lang, location);
    }

    trace!("Reconstructed redirect location: {} -> {}", target, location);
    location
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_prefix_without_vhost() {
        let project = Project::new("main", "en");
        assert_eq!(build_redirect_location("/new", Some("x=1"), &project), "/en/new?x=1");
        assert_eq!(build_redirect_location("/new", None, &project), "/en/new");
    }

    #[test]
    fn test_vhost_keeps_target() {
        let project = Project::new("main", "en").with_host("www.example.com");
        assert_eq!(build_redirect_location("/new", Some("x=1"), &project), "/new?x=1");
    }

    #[test]
    fn test_external_target_is_not_prefixed() {
        let project = Project::new("main", "de");
        assert_eq!(
            build_redirect_location("https://other.example/page?a=b", Some("x=1"), &project),
            "https://other.example/page?a=b&x=1"
        );
    }

    #[test]
    fn test_protocol_relative_target_is_not_prefixed() {
        let project = Project::new("main", "en");
        assert_eq!(
            build_redirect_location("//cdn.example/file", Some("x=1"), &project),
            "//cdn.example/file?x=1"
        );
    }
}
