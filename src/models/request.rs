// Request Classification Model
// What the router learned about the current page request

use serde::Serialize;

use crate::models::RedirectStatus;

/// Classification of an incoming page request, produced by the site
/// handlers before any content is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestClassification {
    /// The request matched no real content
    pub is_not_found: bool,
    /// The request is a live author archive view
    pub is_author_archive: bool,
    /// An author id or author-name query marker is present
    pub author_query_present: bool,
    /// Id of the author being viewed, when one resolved
    pub viewed_author: Option<String>,
}

impl RequestClassification {
    /// A live author archive view for a resolved author.
    pub fn author_archive(author_id: impl Into<String>) -> Self {
        Self {
            is_not_found: false,
            is_author_archive: true,
            author_query_present: true,
            viewed_author: Some(author_id.into()),
        }
    }

    /// A 404; `author_query_present` records whether the request still
    /// carried an author-identifying marker.
    pub fn not_found(author_query_present: bool) -> Self {
        Self {
            is_not_found: true,
            is_author_archive: false,
            author_query_present,
            viewed_author: None,
        }
    }

    /// An ordinary page view with nothing author-related about it.
    pub fn page() -> Self {
        Self {
            is_not_found: false,
            is_author_archive: false,
            author_query_present: false,
            viewed_author: None,
        }
    }
}

/// Outcome of the redirect decision: where to send the visitor and with
/// which status. Emitting this terminates rendering for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectInstruction {
    pub location: String,
    pub status: RedirectStatus,
}
