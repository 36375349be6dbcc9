use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::engine::{DEFAULT_NEXT_WORD_DELAY, DEFAULT_WORDS_PER_SESSION};
use crate::orchestrator::GameSettings;

pub const DEFAULT_API_BASE_URL: &str = "https://typing-ec-wp.uw.r.appspot.com";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub category: Option<String>,
    pub words_per_session: u32,
    pub next_word_delay_ms: u64,
    pub words_file: Option<PathBuf>,
    pub sound: bool,
    pub record_history: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            category: None,
            words_per_session: DEFAULT_WORDS_PER_SESSION,
            next_word_delay_ms: DEFAULT_NEXT_WORD_DELAY.as_millis() as u64,
            words_file: None,
            sound: true,
            record_history: true,
        }
    }
}

impl From<&Config> for GameSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            words_per_session: cfg.words_per_session.max(1),
            // A zero pause would skip the completed-word highlight entirely
            next_word_delay: Duration::from_millis(cfg.next_word_delay_ms.max(1)),
            ..GameSettings::default()
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            api_base_url: "http://localhost:8080".into(),
            category: Some("programming".into()),
            words_per_session: 3,
            next_word_delay_ms: 500,
            words_file: Some(PathBuf::from("/tmp/words.json")),
            sound: false,
            record_history: false,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "words_per_session": 5 }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.words_per_session, 5);
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{{{").unwrap();

        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn game_settings_from_config() {
        let cfg = Config {
            words_per_session: 0,
            next_word_delay_ms: 0,
            ..Config::default()
        };
        let settings = GameSettings::from(&cfg);

        assert_eq!(settings.words_per_session, 1);
        assert!(settings.next_word_delay > Duration::ZERO);
        assert_eq!(settings.countdown_interval, Duration::from_secs(1));
    }

    #[test]
    fn default_delay_matches_game_default() {
        let settings = GameSettings::from(&Config::default());
        assert_eq!(settings, GameSettings::default());
    }
}
