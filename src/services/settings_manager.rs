// SettingsManager Service
// Typed redirect settings over the generic option store

use std::sync::Arc;

use crate::models::{RedirectSettings, RedirectStatus};
use crate::services::OptionStore;

/// Common prefix for every option this service owns. The uninstall sweep
/// deletes the whole namespace in one pass.
pub const OPTION_PREFIX: &str = "author_pages_";

/// Activate option name
const ACTIVATE: &str = "author_pages_activate";

/// Destination option name
const DESTINATION: &str = "author_pages_destination";

/// Status option name
const STATUS: &str = "author_pages_status";

/// Author link option name
const AUTHOR_LINK: &str = "author_pages_authorlink";

/// Redirect non-authors option name
const REDIRECT_NON_AUTHORS: &str = "author_pages_redirect_non_authors";

/// Admin-only option name
const ADMIN_ONLY: &str = "author_pages_adminonly";

/// Parse a stored boolean option. Only the recognized true representations
/// count; anything else, including garbage values, reads as false.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn encode_bool(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Loads and saves the redirect settings under fixed option keys
pub struct SettingsManager {
    store: Arc<OptionStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<OptionStore>) -> Self {
        Self { store }
    }

    /// Load the settings, seeding the store with defaults on first read.
    /// Malformed stored values read permissively: unrecognized booleans are
    /// false and an unrecognized status is the 301 default.
    pub fn load(&self) -> Result<RedirectSettings, String> {
        if !self.store.contains(ACTIVATE) {
            let defaults = RedirectSettings::default();
            self.save(&defaults)?;
            return Ok(defaults);
        }

        Ok(RedirectSettings {
            activate: parse_bool(&self.store.get(ACTIVATE, "0")),
            destination: self.store.get(DESTINATION, ""),
            status: RedirectStatus::parse(&self.store.get(STATUS, "301"))
                .unwrap_or(RedirectStatus::MovedPermanently),
            author_link_disabled: parse_bool(&self.store.get(AUTHOR_LINK, "0")),
            redirect_non_authors: parse_bool(&self.store.get(REDIRECT_NON_AUTHORS, "0")),
            admin_only: parse_bool(&self.store.get(ADMIN_ONLY, "0")),
        })
    }

    /// Write all six fields verbatim under their fixed keys
    pub fn save(&self, settings: &RedirectSettings) -> Result<(), String> {
        self.store.set_many(&[
            (ACTIVATE.to_string(), encode_bool(settings.activate).to_string()),
            (DESTINATION.to_string(), settings.destination.clone()),
            (STATUS.to_string(), settings.status.as_str().to_string()),
            (
                AUTHOR_LINK.to_string(),
                encode_bool(settings.author_link_disabled).to_string(),
            ),
            (
                REDIRECT_NON_AUTHORS.to_string(),
                encode_bool(settings.redirect_non_authors).to_string(),
            ),
            (ADMIN_ONLY.to_string(), encode_bool(settings.admin_only).to_string()),
        ])
    }

    /// Remove every option under the namespace prefix. Idempotent; later
    /// loads observe the documented defaults again.
    pub fn uninstall(&self) -> Result<(), String> {
        self.store.delete_by_prefix(OPTION_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> SettingsManager {
        SettingsManager::new(Arc::new(OptionStore::new(dir.to_path_buf())))
    }

    #[test]
    fn test_first_load_seeds_defaults() {
        let temp = tempdir().unwrap();
        let manager = manager(temp.path());

        let settings = manager.load().unwrap();
        assert_eq!(settings, RedirectSettings::default());

        // The keys now exist in the store
        let store = OptionStore::new(temp.path().to_path_buf());
        assert_eq!(store.get(ACTIVATE, "missing"), "0");
        assert_eq!(store.get(STATUS, "missing"), "301");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp = tempdir().unwrap();
        let manager = manager(temp.path());

        let settings = RedirectSettings {
            activate: true,
            destination: "page-about".to_string(),
            status: RedirectStatus::TemporaryRedirect,
            author_link_disabled: true,
            redirect_non_authors: true,
            admin_only: false,
        };
        manager.save(&settings).unwrap();

        assert_eq!(manager.load().unwrap(), settings);
    }

    #[test]
    fn test_booleans_are_stored_as_numeric_strings() {
        let temp = tempdir().unwrap();
        let manager = manager(temp.path());

        let settings = RedirectSettings {
            activate: true,
            ..RedirectSettings::default()
        };
        manager.save(&settings).unwrap();

        let store = OptionStore::new(temp.path().to_path_buf());
        assert_eq!(store.get(ACTIVATE, ""), "1");
        assert_eq!(store.get(ADMIN_ONLY, ""), "0");
    }

    #[test]
    fn test_unrecognized_bool_values_read_as_false() {
        let temp = tempdir().unwrap();
        let store = Arc::new(OptionStore::new(temp.path().to_path_buf()));
        store.set(ACTIVATE, "definitely").unwrap();

        let manager = SettingsManager::new(store);
        assert!(!manager.load().unwrap().activate);
    }

    #[test]
    fn test_recognized_true_representations() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(value), "expected '{value}' to read as true");
        }
        for value in ["0", "false", "", "2", "enabled"] {
            assert!(!parse_bool(value), "expected '{value}' to read as false");
        }
    }

    #[test]
    fn test_malformed_status_reads_as_default() {
        let temp = tempdir().unwrap();
        let store = Arc::new(OptionStore::new(temp.path().to_path_buf()));
        store.set(ACTIVATE, "1").unwrap();
        store.set(STATUS, "418").unwrap();

        let manager = SettingsManager::new(store);
        assert_eq!(manager.load().unwrap().status, RedirectStatus::MovedPermanently);
    }

    #[test]
    fn test_uninstall_sweeps_namespace_and_restores_defaults() {
        let temp = tempdir().unwrap();
        let store = Arc::new(OptionStore::new(temp.path().to_path_buf()));
        store.set("unrelated_option", "kept").unwrap();

        let manager = SettingsManager::new(Arc::clone(&store));
        let settings = RedirectSettings {
            activate: true,
            destination: "page-home".to_string(),
            ..RedirectSettings::default()
        };
        manager.save(&settings).unwrap();

        manager.uninstall().unwrap();

        assert!(!store.contains(ACTIVATE));
        assert!(!store.contains(DESTINATION));
        assert_eq!(store.get("unrelated_option", ""), "kept");

        // First read after the sweep seeds defaults again
        assert_eq!(manager.load().unwrap(), RedirectSettings::default());
    }
}
