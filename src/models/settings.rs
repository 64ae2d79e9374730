// Redirect Settings Model
// Configuration for the author page redirect behavior

use serde::{Deserialize, Serialize};

fn default_status() -> RedirectStatus {
    RedirectStatus::MovedPermanently
}

fn default_destination() -> String {
    String::new()
}

/// HTTP status used when redirecting away from an author page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedirectStatus {
    /// 301 Moved Permanently
    #[default]
    #[serde(rename = "301")]
    MovedPermanently,
    /// 307 Temporary Redirect
    #[serde(rename = "307")]
    TemporaryRedirect,
}

impl RedirectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectStatus::MovedPermanently => "301",
            RedirectStatus::TemporaryRedirect => "307",
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            RedirectStatus::MovedPermanently => 301,
            RedirectStatus::TemporaryRedirect => 307,
        }
    }

    /// Parse a stored status literal. Anything other than the two recognized
    /// literals yields None; callers decide whether that is a validation
    /// error (form layer) or a silent default (settings load).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "301" => Some(RedirectStatus::MovedPermanently),
            "307" => Some(RedirectStatus::TemporaryRedirect),
            _ => None,
        }
    }
}

/// Author page redirect settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectSettings {
    /// Master enable switch
    #[serde(default)]
    pub activate: bool,

    /// Page id to redirect to; empty means the site home
    #[serde(default = "default_destination")]
    pub destination: String,

    /// HTTP redirect status
    #[serde(default = "default_status")]
    pub status: RedirectStatus,

    /// Render author profile links as empty strings
    #[serde(default)]
    pub author_link_disabled: bool,

    /// Redirect 404s that carry an author query as well
    #[serde(default)]
    pub redirect_non_authors: bool,

    /// Only redirect when the viewed author is an administrator
    #[serde(default)]
    pub admin_only: bool,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            activate: false,
            destination: String::new(),
            status: RedirectStatus::MovedPermanently,
            author_link_disabled: false,
            redirect_non_authors: false,
            admin_only: false,
        }
    }
}
