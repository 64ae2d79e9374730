// SiteContent Service
// Loads and serves the site's pages and authors

use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::models::{Author, Page, PageSummary, Role, SiteData};
use crate::services::SiteLookup;

const SITE_FILE: &str = "site.json";

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid slug pattern"))
}

/// Whether a slug is usable in a permalink
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= 100 && slug_pattern().is_match(slug)
}

/// Serves site content from a JSON document in the data directory, seeding
/// a small default site on first run.
pub struct SiteContent {
    site_path: PathBuf,
    cache: RwLock<Option<SiteData>>,
}

impl SiteContent {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            site_path: data_dir.join(SITE_FILE),
            cache: RwLock::new(None),
        }
    }

    /// Load the site, or seed and return the default site if none exists
    pub fn load(&self) -> Result<SiteData, String> {
        if let Ok(cache) = self.cache.read() {
            if let Some(ref site) = *cache {
                return Ok(site.clone());
            }
        }

        let site = if self.site_path.exists() {
            let content = std::fs::read_to_string(&self.site_path)
                .map_err(|e| format!("Failed to read site file: {e}"))?;
            let mut site: SiteData = serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse site file: {e}"))?;
            sanitize_site(&mut site);
            site
        } else {
            let site = default_site();
            self.save_internal(&site)?;
            site
        };

        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(site.clone());
        }

        Ok(site)
    }

    pub fn find_page_by_slug(&self, slug: &str) -> Option<Page> {
        self.load()
            .ok()?
            .pages
            .into_iter()
            .find(|page| page.slug == slug)
    }

    pub fn find_author_by_slug(&self, slug: &str) -> Option<Author> {
        self.load()
            .ok()?
            .authors
            .into_iter()
            .find(|author| author.slug == slug)
    }

    pub fn find_author(&self, author_id: &str) -> Option<Author> {
        self.load()
            .ok()?
            .authors
            .into_iter()
            .find(|author| author.id == author_id)
    }

    /// Pages attributed to the given author, for the archive listing
    pub fn pages_by_author(&self, author_id: &str) -> Vec<Page> {
        self.load()
            .map(|site| {
                site.pages
                    .into_iter()
                    .filter(|page| page.author.as_deref() == Some(author_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Page summaries for the settings form's destination dropdown
    pub fn page_summaries(&self) -> Vec<PageSummary> {
        self.load()
            .map(|site| {
                site.pages
                    .into_iter()
                    .map(|page| PageSummary {
                        id: page.id,
                        slug: page.slug,
                        title: page.title,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Permalink for an author archive
    pub fn author_permalink(&self, slug: &str) -> String {
        format!("/author/{}/", urlencoding::encode(slug))
    }

    fn save_internal(&self, site: &SiteData) -> Result<(), String> {
        if let Some(parent) = self.site_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create site directory: {e}"))?;
        }

        let content = serde_json::to_string_pretty(site)
            .map_err(|e| format!("Failed to serialize site: {e}"))?;
        std::fs::write(&self.site_path, content)
            .map_err(|e| format!("Failed to write site file: {e}"))
    }
}

impl SiteLookup for SiteContent {
    fn author_has_capability(&self, author_id: &str, capability: &str) -> bool {
        self.find_author(author_id)
            .map(|author| author.role.has_capability(capability))
            .unwrap_or(false)
    }

    fn page_permalink(&self, page_id: &str) -> Option<String> {
        self.load()
            .ok()?
            .pages
            .into_iter()
            .find(|page| page.id == page_id)
            .map(|page| format!("/p/{}/", urlencoding::encode(&page.slug)))
    }

    fn home_url(&self) -> String {
        "/".to_string()
    }
}

/// Drop entries whose slugs cannot appear in a permalink
fn sanitize_site(site: &mut SiteData) {
    site.pages.retain(|page| {
        let ok = is_valid_slug(&page.slug);
        if !ok {
            log::warn!("Skipping page '{}' with invalid slug '{}'", page.id, page.slug);
        }
        ok
    });
    site.authors.retain(|author| {
        let ok = is_valid_slug(&author.slug);
        if !ok {
            log::warn!(
                "Skipping author '{}' with invalid slug '{}'",
                author.id,
                author.slug
            );
        }
        ok
    });
}

fn default_site() -> SiteData {
    SiteData {
        pages: vec![
            Page {
                id: "page-welcome".to_string(),
                slug: "welcome".to_string(),
                title: "Welcome".to_string(),
                body: "This site is served by Authorgate.".to_string(),
                author: Some("admin".to_string()),
            },
            Page {
                id: "page-about".to_string(),
                slug: "about".to_string(),
                title: "About".to_string(),
                body: "A small site with author archives.".to_string(),
                author: Some("writer".to_string()),
            },
        ],
        authors: vec![
            Author {
                id: "admin".to_string(),
                slug: "admin".to_string(),
                display_name: "Site Admin".to_string(),
                role: Role::Administrator,
            },
            Author {
                id: "writer".to_string(),
                slug: "writer".to_string(),
                display_name: "Staff Writer".to_string(),
                role: Role::Author,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CAP_MANAGE_OPTIONS;
    use tempfile::tempdir;

    #[test]
    fn test_first_load_seeds_default_site() {
        let temp = tempdir().unwrap();
        let content = SiteContent::new(temp.path().to_path_buf());

        let site = content.load().unwrap();
        assert!(!site.pages.is_empty());
        assert!(!site.authors.is_empty());
        assert!(temp.path().join(SITE_FILE).exists());
    }

    #[test]
    fn test_page_permalink_resolution() {
        let temp = tempdir().unwrap();
        let content = SiteContent::new(temp.path().to_path_buf());
        content.load().unwrap();

        assert_eq!(
            content.page_permalink("page-about"),
            Some("/p/about/".to_string())
        );
        assert_eq!(content.page_permalink("page-gone"), None);
    }

    #[test]
    fn test_capability_lookup_follows_roles() {
        let temp = tempdir().unwrap();
        let content = SiteContent::new(temp.path().to_path_buf());
        content.load().unwrap();

        assert!(content.author_has_capability("admin", CAP_MANAGE_OPTIONS));
        assert!(!content.author_has_capability("writer", CAP_MANAGE_OPTIONS));
        assert!(!content.author_has_capability("nobody", CAP_MANAGE_OPTIONS));
    }

    #[test]
    fn test_pages_by_author_filters_attribution() {
        let temp = tempdir().unwrap();
        let content = SiteContent::new(temp.path().to_path_buf());
        content.load().unwrap();

        let pages = content.pages_by_author("writer");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].slug, "about");
        assert!(content.pages_by_author("nobody").is_empty());
    }

    #[test]
    fn test_invalid_slugs_are_skipped_on_load() {
        let temp = tempdir().unwrap();
        let raw = serde_json::json!({
            "pages": [
                { "id": "p1", "slug": "fine", "title": "Fine", "body": "" },
                { "id": "p2", "slug": "../escape", "title": "Bad", "body": "" }
            ],
            "authors": [
                { "id": "a1", "slug": "UPPER", "displayName": "Bad", "role": "author" }
            ]
        });
        std::fs::write(temp.path().join(SITE_FILE), raw.to_string()).unwrap();

        let content = SiteContent::new(temp.path().to_path_buf());
        let site = content.load().unwrap();
        assert_eq!(site.pages.len(), 1);
        assert!(site.authors.is_empty());
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("writer"));
        assert!(is_valid_slug("jane-doe_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("has space"));
        assert!(!is_valid_slug("Päge"));
    }

    #[test]
    fn test_author_permalink_shape() {
        let temp = tempdir().unwrap();
        let content = SiteContent::new(temp.path().to_path_buf());
        assert_eq!(content.author_permalink("writer"), "/author/writer/");
    }
}
