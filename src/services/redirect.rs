// Redirect Decision Service
// Decides whether a page request leaves the author pages or renders normally

use crate::models::{
    RedirectInstruction, RedirectSettings, RequestClassification, CAP_MANAGE_OPTIONS,
};

/// What the decision needs from the surrounding site: capability checks,
/// destination resolution and the home URL.
pub trait SiteLookup: Send + Sync {
    fn author_has_capability(&self, author_id: &str, capability: &str) -> bool;
    fn page_permalink(&self, page_id: &str) -> Option<String>;
    fn home_url(&self) -> String;
}

/// Decide whether the current request gets redirected away from an author
/// page. Pure: same classification, settings and site state always produce
/// the same decision. Returns None when rendering should proceed.
pub fn decide(
    classification: &RequestClassification,
    settings: &RedirectSettings,
    site: &dyn SiteLookup,
) -> Option<RedirectInstruction> {
    let author_like_404 = classification.is_not_found
        && classification.author_query_present
        && settings.redirect_non_authors;

    // A 404 without any author marker is none of our business
    if classification.is_not_found && !classification.author_query_present {
        return None;
    }

    if !(classification.is_author_archive || author_like_404) {
        return None;
    }

    if !settings.activate {
        return None;
    }

    // The administrator check only applies to live archive views; a 404 has
    // no resolvable author, so that branch stays false there and only the
    // redirect_non_authors branch can fire.
    let author_is_admin = settings.admin_only
        && !classification.is_not_found
        && classification
            .viewed_author
            .as_deref()
            .is_some_and(|author| site.author_has_capability(author, CAP_MANAGE_OPTIONS));

    let eligible = (settings.admin_only && author_is_admin)
        || (!settings.admin_only && !classification.is_not_found)
        || (classification.is_not_found && settings.redirect_non_authors);

    if !eligible {
        return None;
    }

    Some(RedirectInstruction {
        location: resolve_destination(settings, site),
        status: settings.status,
    })
}

/// Resolve the redirect target: the configured destination page when it
/// still resolves, otherwise the site home. Never fails.
fn resolve_destination(settings: &RedirectSettings, site: &dyn SiteLookup) -> String {
    if settings.destination.is_empty() {
        return site.home_url();
    }

    match site.page_permalink(&settings.destination) {
        Some(permalink) => permalink,
        None => {
            log::debug!(
                "Destination page '{}' no longer resolves, falling back to home",
                settings.destination
            );
            site.home_url()
        }
    }
}

/// Filter applied to author profile link URLs before rendering: blanked
/// when the author link is disabled, passed through unchanged otherwise.
pub fn filter_author_link(url: &str, settings: &RedirectSettings) -> String {
    if settings.author_link_disabled {
        return String::new();
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RedirectStatus;
    use std::collections::HashMap;

    struct FakeSite {
        admins: Vec<String>,
        permalinks: HashMap<String, String>,
    }

    impl FakeSite {
        fn new() -> Self {
            let mut permalinks = HashMap::new();
            permalinks.insert("page-about".to_string(), "/p/about/".to_string());
            Self {
                admins: vec!["admin".to_string()],
                permalinks,
            }
        }
    }

    impl SiteLookup for FakeSite {
        fn author_has_capability(&self, author_id: &str, capability: &str) -> bool {
            capability == CAP_MANAGE_OPTIONS && self.admins.iter().any(|a| a == author_id)
        }

        fn page_permalink(&self, page_id: &str) -> Option<String> {
            self.permalinks.get(page_id).cloned()
        }

        fn home_url(&self) -> String {
            "/".to_string()
        }
    }

    fn active_settings() -> RedirectSettings {
        RedirectSettings {
            activate: true,
            ..RedirectSettings::default()
        }
    }

    #[test]
    fn test_deactivated_never_redirects() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            activate: false,
            redirect_non_authors: true,
            ..RedirectSettings::default()
        };

        let classifications = [
            RequestClassification::author_archive("admin"),
            RequestClassification::author_archive("writer"),
            RequestClassification::not_found(true),
            RequestClassification::not_found(false),
            RequestClassification::page(),
        ];
        for classification in &classifications {
            assert_eq!(decide(classification, &settings, &site), None);
        }
    }

    #[test]
    fn test_live_archive_redirects_with_configured_status_and_destination() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            destination: "page-about".to_string(),
            status: RedirectStatus::TemporaryRedirect,
            ..active_settings()
        };

        let decision = decide(
            &RequestClassification::author_archive("writer"),
            &settings,
            &site,
        )
        .expect("live archive should redirect");

        assert_eq!(decision.location, "/p/about/");
        assert_eq!(decision.status, RedirectStatus::TemporaryRedirect);
    }

    #[test]
    fn test_empty_destination_redirects_home() {
        let site = FakeSite::new();
        let decision = decide(
            &RequestClassification::author_archive("writer"),
            &active_settings(),
            &site,
        )
        .unwrap();

        assert_eq!(decision.location, "/");
        assert_eq!(decision.status, RedirectStatus::MovedPermanently);
    }

    #[test]
    fn test_unresolvable_destination_falls_back_to_home() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            destination: "page-deleted".to_string(),
            ..active_settings()
        };

        let decision = decide(
            &RequestClassification::author_archive("writer"),
            &settings,
            &site,
        )
        .unwrap();

        assert_eq!(decision.location, "/");
    }

    #[test]
    fn test_not_found_without_author_query_is_ignored() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            redirect_non_authors: true,
            ..active_settings()
        };

        assert_eq!(
            decide(&RequestClassification::not_found(false), &settings, &site),
            None
        );
    }

    #[test]
    fn test_author_like_404_redirects_when_enabled() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            redirect_non_authors: true,
            ..active_settings()
        };

        let decision = decide(&RequestClassification::not_found(true), &settings, &site);
        assert!(decision.is_some());
    }

    #[test]
    fn test_author_like_404_ignored_when_disabled() {
        let site = FakeSite::new();
        assert_eq!(
            decide(
                &RequestClassification::not_found(true),
                &active_settings(),
                &site
            ),
            None
        );
    }

    #[test]
    fn test_admin_only_skips_regular_authors() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            admin_only: true,
            ..active_settings()
        };

        assert_eq!(
            decide(
                &RequestClassification::author_archive("writer"),
                &settings,
                &site
            ),
            None
        );
    }

    #[test]
    fn test_admin_only_redirects_administrator_archives() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            admin_only: true,
            ..active_settings()
        };

        assert!(decide(
            &RequestClassification::author_archive("admin"),
            &settings,
            &site
        )
        .is_some());
    }

    #[test]
    fn test_admin_only_404_only_fires_through_non_author_branch() {
        let site = FakeSite::new();

        // No author object resolves on a 404, so admin_only alone never fires
        let settings = RedirectSettings {
            admin_only: true,
            ..active_settings()
        };
        assert_eq!(
            decide(&RequestClassification::not_found(true), &settings, &site),
            None
        );

        // With redirect_non_authors the 404 branch qualifies regardless
        let settings = RedirectSettings {
            admin_only: true,
            redirect_non_authors: true,
            ..active_settings()
        };
        assert!(decide(&RequestClassification::not_found(true), &settings, &site).is_some());
    }

    #[test]
    fn test_ordinary_pages_are_never_redirected() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            redirect_non_authors: true,
            admin_only: false,
            ..active_settings()
        };

        assert_eq!(decide(&RequestClassification::page(), &settings, &site), None);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let site = FakeSite::new();
        let settings = RedirectSettings {
            destination: "page-about".to_string(),
            ..active_settings()
        };
        let classification = RequestClassification::author_archive("writer");

        let first = decide(&classification, &settings, &site);
        let second = decide(&classification, &settings, &site);
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_author_link_blanks_when_disabled() {
        let settings = RedirectSettings {
            author_link_disabled: true,
            ..RedirectSettings::default()
        };

        assert_eq!(filter_author_link("/author/writer/", &settings), "");
        assert_eq!(filter_author_link("", &settings), "");
    }

    #[test]
    fn test_filter_author_link_passes_through_when_enabled() {
        let settings = RedirectSettings::default();
        assert_eq!(
            filter_author_link("/author/writer/", &settings),
            "/author/writer/"
        );
    }
}
