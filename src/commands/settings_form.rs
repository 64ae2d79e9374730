// Settings Form Commands
// Maps the admin form payload onto the typed settings record

use serde::Deserialize;
use thiserror::Error;

use crate::models::{RedirectSettings, RedirectStatus};
use crate::services::SiteContent;

/// Errors rejected at the form layer. The decision logic never validates
/// these; anything that gets past here is stored verbatim.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsFormError {
    #[error("Unsupported redirect status: {0}")]
    InvalidStatus(String),

    #[error("Destination page not found: {0}")]
    UnknownDestination(String),
}

/// The settings form as posted: checkboxes arrive as "1" when ticked and
/// are absent otherwise, the status select posts its literal value and the
/// destination posts a page id or an empty string.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub activate: Option<String>,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub status: Option<String>,
    pub authorlink: Option<String>,
    pub redirect_non_authors: Option<String>,
    pub adminonly: Option<String>,
}

fn checkbox(value: &Option<String>) -> bool {
    value.as_deref() == Some("1")
}

/// Check that a destination, when set, names a page that exists right now.
/// Shared by the form and the JSON save command so a stale id cannot be
/// stored in the first place.
pub fn validate_destination(
    destination: &str,
    site: &SiteContent,
) -> Result<(), SettingsFormError> {
    if !destination.is_empty()
        && site
            .page_summaries()
            .iter()
            .all(|page| page.id != destination)
    {
        return Err(SettingsFormError::UnknownDestination(destination.to_string()));
    }

    Ok(())
}

/// Validate a posted form and build the settings record it describes
pub fn settings_from_form(
    form: &SettingsForm,
    site: &SiteContent,
) -> Result<RedirectSettings, SettingsFormError> {
    let status = match form.status.as_deref() {
        None | Some("") => RedirectStatus::MovedPermanently,
        Some(value) => RedirectStatus::parse(value)
            .ok_or_else(|| SettingsFormError::InvalidStatus(value.to_string()))?,
    };

    let destination = form.destination.trim().to_string();
    validate_destination(&destination, site)?;

    Ok(RedirectSettings {
        activate: checkbox(&form.activate),
        destination,
        status,
        author_link_disabled: checkbox(&form.authorlink),
        redirect_non_authors: checkbox(&form.redirect_non_authors),
        admin_only: checkbox(&form.adminonly),
    })
}
