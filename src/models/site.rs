// Site Content Models
// Pages, authors and roles for the hosted site

use serde::{Deserialize, Serialize};

/// Capability required to qualify as an administrator author
pub const CAP_MANAGE_OPTIONS: &str = "manage_options";

/// Author role, ordered from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Editor,
    Author,
    Subscriber,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Subscriber => "subscriber",
        }
    }

    /// Whether this role grants the given capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        match self {
            Role::Administrator => matches!(
                capability,
                CAP_MANAGE_OPTIONS | "edit_pages" | "publish_pages" | "read"
            ),
            Role::Editor => matches!(capability, "edit_pages" | "publish_pages" | "read"),
            Role::Author => matches!(capability, "publish_pages" | "read"),
            Role::Subscriber => capability == "read",
        }
    }
}

/// A content page served by the site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Id of the authoring user, when attributed
    #[serde(default)]
    pub author: Option<String>,
}

/// A site author with a role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub slug: String,
    pub display_name: String,
    pub role: Role,
}

/// Everything the site serves, persisted as one JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub authors: Vec<Author>,
}

/// Page summary for the destination dropdown in the settings form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_administrators_manage_options() {
        assert!(Role::Administrator.has_capability(CAP_MANAGE_OPTIONS));
        assert!(!Role::Editor.has_capability(CAP_MANAGE_OPTIONS));
        assert!(!Role::Author.has_capability(CAP_MANAGE_OPTIONS));
        assert!(!Role::Subscriber.has_capability(CAP_MANAGE_OPTIONS));
    }

    #[test]
    fn test_every_role_can_read() {
        for role in [Role::Administrator, Role::Editor, Role::Author, Role::Subscriber] {
            assert!(role.has_capability("read"));
        }
    }
}
