use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Permissions the redirect manager checks on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Removing redirects; granted separately from admin rights
    #[serde(rename = "redirect.delete")]
    RedirectDelete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::RedirectDelete => "redirect.delete",
        }
    }
}

/// The user an operation is performed for
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
    pub permissions: HashSet<Permission>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
