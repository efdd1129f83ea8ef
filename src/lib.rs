//! URL redirects for a CMS
//!
//! Editors map old URLs to new ones, page moves and renames add redirects on
//! their own, and requests that would end in a 404 are answered with a
//! redirect when one is stored.

pub mod api;
pub mod lifecycle;
pub mod manager;
pub mod resolver;
pub mod site;
pub mod store;
pub mod url_parser;
pub mod utils;
