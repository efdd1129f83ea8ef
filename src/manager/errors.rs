use thiserror::Error;

/// Failures of redirect operations that callers need to tell apart
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The free redirect allowance is used up and no license is present
    #[error("The free limit of {free_redirects} redirects is reached; a license is required to add more")]
    NotLicensed {
        free_redirects: usize,
        store_url: Option<String>, // Where a license can be bought
    },

    #[error("User '{user}' lacks the permission '{permission}'")]
    PermissionDenied { user: String, permission: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An internal link pointed at a page that could not be loaded
    #[error("Unknown redirect target: {0}")]
    UnknownTarget(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Redirect storage failed: {0:#}")]
    Storage(anyhow::Error),
}

impl RedirectError {
    pub fn is_not_licensed(&self) -> bool {
        matches!(self, RedirectError::NotLicensed { .. })
    }
}

impl From<anyhow::Error> for RedirectError {
    fn from(error: anyhow::Error) -> Self {
        RedirectError::Storage(error)
    }
}
