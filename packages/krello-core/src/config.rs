/// Configuration for the board core.
/// Reads config.json from ~/.config/krello/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DESK_TITLE: &str = "Main Desk";
pub const DEFAULT_COLUMN_TITLE: &str = "New Column";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrelloConfig {
    /// Quiet period before a remote write is sent.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_desk_title")]
    pub default_desk_title: String,
    #[serde(default = "default_column_title")]
    pub default_column_title: String,
    /// Seed the starter guide board on first boot instead of an empty desk.
    #[serde(default = "default_true")]
    pub seed_starter_board: bool,
    /// Directory for the file-backed local store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_debounce_ms() -> u64 {
    600
}

fn default_desk_title() -> String {
    DEFAULT_DESK_TITLE.to_string()
}

fn default_column_title() -> String {
    DEFAULT_COLUMN_TITLE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for KrelloConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            default_desk_title: default_desk_title(),
            default_column_title: default_column_title(),
            seed_starter_board: true,
            data_dir: None,
        }
    }
}

impl KrelloConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Default config path: ~/.config/krello/config.json
#[cfg(feature = "file-store")]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("krello")
        .join("config.json")
}

/// Default directory for the file-backed local store: ~/.local/share/krello
#[cfg(feature = "file-store")]
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("krello")
}

/// Load config from path. Returns defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> KrelloConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[krello.config] Failed to parse config {}: {}", path.display(), e);
            KrelloConfig::default()
        }),
        Err(_) => {
            log::info!("[krello.config] No config at {}, using defaults", path.display());
            KrelloConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/krello/config.json"));
        assert_eq!(config, KrelloConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(600));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{ "debounceMs": 700, "seedStarterBoard": false }}"#).unwrap();

        let config = load_config(tmp.path());
        assert_eq!(config.debounce_ms, 700);
        assert!(!config.seed_starter_board);
        assert_eq!(config.default_desk_title, "Main Desk");
        assert_eq!(config.default_column_title, "New Column");
    }

    #[test]
    fn test_invalid_config_gives_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "debounceMs = 700").unwrap();

        let config = load_config(tmp.path());
        assert_eq!(config, KrelloConfig::default());
    }

    #[cfg(feature = "file-store")]
    #[test]
    fn test_default_paths_are_namespaced() {
        assert!(default_config_path().ends_with("krello/config.json"));
        assert!(default_data_dir().ends_with("krello"));
    }
}
