use serde::{Deserialize, Serialize};

use crate::store::RedirectEntry;

/// Request to add a single redirect
#[derive(Debug, Deserialize, Clone)]
pub struct AddRedirectRequest {
    pub source_url: String,
    pub target_url: String,
    #[serde(default)]
    pub project: Option<String>, // Default project when unset
    #[serde(default)]
    pub lang: Option<String>,
}

/// Request to add several redirects to one project
#[derive(Debug, Deserialize, Clone)]
pub struct AddRedirectsRequest {
    pub redirects: Vec<RedirectEntry>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Request to delete redirects by source URL
#[derive(Debug, Deserialize, Clone)]
pub struct DeleteRedirectsRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Query of the redirect listing
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ListRedirectsQuery {
    pub project: Option<String>,
    pub lang: Option<String>,
    pub page: Option<usize>,     // 1-based; everything when unset
    pub per_page: Option<usize>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewrittenUrlQuery {
    /// Internal link, e.g. `index.php?id=3&project=main&lang=en`
    pub url: String,
    pub project: Option<String>,
    pub lang: Option<String>,
}

/// Queue of URLs the editor is asked about one after another
#[derive(Debug, Deserialize, Clone)]
pub struct QueueUrlsRequest {
    pub urls: Vec<String>,
}

/// The editor's answer to one redirect dialog
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessUrlsRequest {
    pub source_url: String,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub skip_children: bool,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Outcome of a write operation
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub added: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewrittenUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlsToProcessResponse {
    pub urls: Vec<String>,
}

/// Sent with HTTP 402 when the free redirect limit is used up
#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub status: String,
    pub message: String,
    pub store_url: Option<String>,
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: healthy or degraded
    pub status: String,

    /// Number of stored redirects, if they could be counted
    pub redirects: Option<usize>,

    /// Server uptime in seconds
    pub uptime: u64,
}

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status indicator: error
    pub status: String,

    /// Error message details
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
