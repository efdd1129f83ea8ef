//! URL normalization for redirect sources and targets
//!
//! Everything that ends up as a key or a target in a redirect table passes
//! through here first, so lookups and writes agree on one canonical form.

pub mod parser;
pub mod url_collection;
pub mod url_reconstructor;
pub mod url_validator;


pub use parser::{
    get_path, get_query_string, get_relevant_parts_from_url, prepare_internal_target_url,
    prepare_source_url, strip_language_from_path, RedirectUrl,
};
pub use url_collection::{
    generate_child_source_url_from_parent_redirect_urls, make_children_redirects, ChildRedirect,
};
pub use url_reconstructor::build_redirect_location;
pub use url_validator::{is_internal, is_protocol_relative, InternalLink};
