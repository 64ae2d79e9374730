// OptionStore Service
// Generic key/value option persistence

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

const OPTIONS_FILE: &str = "options.json";

/// Stores string options under string keys, backed by a single JSON file.
/// Reads go through an in-process cache; writes replace the file atomically.
pub struct OptionStore {
    options_path: PathBuf,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl OptionStore {
    /// Create a new OptionStore rooted in the given data directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            options_path: data_dir.join(OPTIONS_FILE),
            cache: RwLock::new(None),
        }
    }

    /// Read an option, falling back to `default` when the key is absent or
    /// the store cannot be read. Option reads never fail a page request.
    pub fn get(&self, key: &str, default: &str) -> String {
        match self.load_map() {
            Ok(map) => map.get(key).cloned().unwrap_or_else(|| default.to_string()),
            Err(e) => {
                log::warn!("Option store unreadable, using default for '{key}': {e}");
                default.to_string()
            }
        }
    }

    /// Whether the key currently exists in the store
    pub fn contains(&self, key: &str) -> bool {
        self.load_map()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    /// Write a single option
    pub fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    /// Write several options in one pass, so a settings save lands as a
    /// single file replacement.
    pub fn set_many(&self, entries: &[(String, String)]) -> Result<(), String> {
        let mut map = self.load_map()?;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        self.save_map(&map)
    }

    /// Delete every key sharing the given prefix in one sweep
    pub fn delete_by_prefix(&self, prefix: &str) -> Result<(), String> {
        let mut map = self.load_map()?;
        let before = map.len();
        map.retain(|key, _| !key.starts_with(prefix));
        if map.len() == before {
            return Ok(());
        }
        self.save_map(&map)
    }

    /// Drop the cache so the next read hits the file again
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.write() {
            *cache = None;
        }
    }

    /// Watch the options file for external edits and invalidate the cache
    /// when one lands, so saves made outside this process become visible
    /// without a restart.
    pub fn start_watcher(self: &Arc<Self>) {
        let store = Arc::clone(self);
        let watch_dir = match self.options_path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => return,
        };
        thread::spawn(move || {
            let (tx, rx) = std::sync::mpsc::channel();
            let mut watcher = match notify::recommended_watcher(tx) {
                Ok(watcher) => watcher,
                Err(error) => {
                    log::warn!("Option watcher failed to start: {error}");
                    return;
                }
            };

            if let Err(error) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
                log::warn!("Failed to watch options directory: {error}");
                return;
            }

            let mut last_update = std::time::Instant::now();
            for event in rx {
                if event.is_err() {
                    continue;
                }

                // Debounce: invalidate at most once per second
                let now = std::time::Instant::now();
                if now.duration_since(last_update) < Duration::from_secs(1) {
                    continue;
                }
                last_update = now;

                store.invalidate();
                log::debug!("Options file changed on disk, cache invalidated");
            }
        });
    }

    fn load_map(&self) -> Result<HashMap<String, String>, String> {
        if let Ok(cache) = self.cache.read() {
            if let Some(ref map) = *cache {
                return Ok(map.clone());
            }
        }

        let map = if self.options_path.exists() {
            let content = std::fs::read_to_string(&self.options_path)
                .map_err(|e| format!("Failed to read options: {e}"))?;
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse options: {e}"))?
        } else {
            HashMap::new()
        };

        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(map.clone());
        }

        Ok(map)
    }

    fn save_map(&self, map: &HashMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.options_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create options directory: {e}"))?;
        }

        let content = serde_json::to_string_pretty(map)
            .map_err(|e| format!("Failed to serialize options: {e}"))?;

        let tmp = self.options_path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| format!("Failed to write temp options: {e}"))?;
        std::fs::rename(&tmp, &self.options_path)
            .map_err(|e| format!("Failed to replace options: {e}"))?;

        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(map.clone());
        }

        Ok(())
    }
}
