/// Number of redirects that can be created without a license, across all projects
pub const FREE_REDIRECTS: usize = 50;

/// Answers whether the installation holds a license for the redirect manager
pub trait LicenseCheck: Send + Sync {
    fn has_license(&self) -> bool;

    /// Where a license can be obtained, shown alongside the limit message
    fn store_url(&self) -> Option<String> {
        None
    }
}

/// License state fixed by configuration
#[derive(Debug, Clone, Default)]
pub struct StaticLicense {
    pub licensed: bool,
    pub store_url: Option<String>,
}

impl StaticLicense {
    pub fn licensed() -> Self {
        Self {
            licensed: true,
            store_url: None,
        }
    }

    pub fn unlicensed(store_url: Option<String>) -> Self {
        Self {
            licensed: false,
            store_url,
        }
    }
}

impl LicenseCheck for StaticLicense {
    fn has_license(&self) -> bool {
        self.licensed
    }

    fn store_url(&self) -> Option<String> {
        self.store_url.clone()
    }
}
