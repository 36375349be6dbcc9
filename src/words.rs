use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::from_str;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

static WORDLIST_DIR: Dir = include_dir!("src/wordlists");

const BUILTIN_WORDLIST: &str = "words.json";

#[derive(Debug, Error)]
pub enum WordSourceError {
    #[error("failed to read word list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse word list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("built-in word list {0} is missing")]
    MissingBuiltin(&'static str),
    #[error("word list has no categories")]
    Empty,
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("no words available in category {0}")]
    NoWordsAvailable(String),
}

/// A named list of words to practice. Read-only once loaded.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct WordCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub words: Vec<String>,
}

impl WordCategory {
    /// Human readable name, falling back to the id for unnamed categories
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// All categories available to the game, in source order.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct WordBank {
    categories: Vec<WordCategory>,
}

impl WordBank {
    pub fn from_json(json: &str) -> Result<Self, WordSourceError> {
        let mut bank: WordBank = from_str(json)?;
        if bank.categories.is_empty() {
            return Err(WordSourceError::Empty);
        }
        for category in &mut bank.categories {
            category.words.retain(|w| !w.is_empty());
        }
        Ok(bank)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WordSourceError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| WordSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The word list compiled into the binary
    pub fn builtin() -> Result<Self, WordSourceError> {
        let file = WORDLIST_DIR
            .get_file(BUILTIN_WORDLIST)
            .ok_or(WordSourceError::MissingBuiltin(BUILTIN_WORDLIST))?;
        let json = file
            .contents_utf8()
            .ok_or(WordSourceError::MissingBuiltin(BUILTIN_WORDLIST))?;
        Self::from_json(json)
    }

    /// Last-resort single category used when nothing else could be loaded.
    pub fn minimal() -> Self {
        Self {
            categories: vec![WordCategory {
                id: "basic".to_string(),
                name: "Basic".to_string(),
                words: ["type", "word", "key", "game", "error"]
                    .iter()
                    .map(|w| w.to_string())
                    .collect(),
            }],
        }
    }

    /// Loads the configured word file, falling back to the built-in list and
    /// then to the minimal set. Never fails.
    pub fn load(words_file: Option<&Path>) -> Self {
        if let Some(path) = words_file {
            match Self::from_file(path) {
                Ok(bank) => {
                    debug!(
                        path = %path.display(),
                        categories = bank.categories.len(),
                        "loaded word list"
                    );
                    return bank;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "falling back to built-in word list")
                }
            }
        }

        match Self::builtin() {
            Ok(bank) => bank,
            Err(e) => {
                warn!(error = %e, "built-in word list unusable, using minimal word set");
                Self::minimal()
            }
        }
    }

    pub fn categories(&self) -> &[WordCategory] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&WordCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn first_id(&self) -> Option<&str> {
        self.categories.first().map(|c| c.id.as_str())
    }

    /// Resolves `id` to a known category id, or the first category otherwise
    pub fn resolve_id(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.category(id))
            .map(|c| c.id.as_str())
            .or_else(|| self.first_id())
    }

    /// Checks that a session can be started for `id`
    pub fn ensure_playable(&self, id: &str) -> Result<&WordCategory, WordSourceError> {
        let category = self
            .category(id)
            .ok_or_else(|| WordSourceError::UnknownCategory(id.to_string()))?;
        if category.words.is_empty() {
            return Err(WordSourceError::NoWordsAvailable(id.to_string()));
        }
        Ok(category)
    }

    /// Uniformly random word from the category
    pub fn pick_word<R: Rng + ?Sized>(
        &self,
        id: &str,
        rng: &mut R,
    ) -> Result<&str, WordSourceError> {
        let category = self.ensure_playable(id)?;
        category
            .words
            .choose(rng)
            .map(String::as_str)
            .ok_or_else(|| WordSourceError::NoWordsAvailable(id.to_string()))
    }

    /// Id of the category `step` positions away from `current`, wrapping around.
    pub fn cycle_id(&self, current: &str, step: isize) -> Option<&str> {
        let len = self.categories.len() as isize;
        if len == 0 {
            return None;
        }
        let idx = self
            .categories
            .iter()
            .position(|c| c.id == current)
            .unwrap_or(0) as isize;
        let next = (idx + step).rem_euclid(len) as usize;
        Some(self.categories[next].id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FRUIT: &str = r#"
    {
        "categories": [
            { "id": "fruit", "name": "Fruit", "words": ["apple", "banana"] },
            { "id": "empty", "name": "Empty", "words": [] }
        ]
    }
    "#;

    #[test]
    fn test_builtin_word_list() {
        let bank = WordBank::builtin().unwrap();

        assert!(!bank.categories().is_empty());
        assert_eq!(bank.first_id(), Some("basic"));
        for category in bank.categories() {
            assert!(!category.words.is_empty(), "{} has no words", category.id);
        }
    }

    #[test]
    fn test_from_json() {
        let bank = WordBank::from_json(FRUIT).unwrap();

        assert_eq!(bank.categories().len(), 2);
        let fruit = bank.category("fruit").unwrap();
        assert_eq!(fruit.display_name(), "Fruit");
        assert_eq!(fruit.words, vec!["apple", "banana"]);
    }

    #[test]
    fn test_missing_name_falls_back_to_id() {
        let bank =
            WordBank::from_json(r#"{ "categories": [ { "id": "basic", "words": ["error"] } ] }"#)
                .unwrap();

        assert_eq!(bank.category("basic").unwrap().display_name(), "basic");
    }

    #[test]
    fn test_blank_words_are_dropped() {
        let bank =
            WordBank::from_json(r#"{ "categories": [ { "id": "a", "words": ["", "ok", ""] } ] }"#)
                .unwrap();

        assert_eq!(bank.category("a").unwrap().words, vec!["ok"]);
    }

    #[test]
    fn test_no_categories_is_an_error() {
        let result = WordBank::from_json(r#"{ "categories": [] }"#);
        assert!(matches!(result, Err(WordSourceError::Empty)));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let result = WordBank::from_json("{ not json");
        assert!(matches!(result, Err(WordSourceError::Parse(_))));
    }

    #[test]
    fn test_seeded_pick_is_deterministic() {
        let bank = WordBank::from_json(FRUIT).unwrap();

        let first = bank
            .pick_word("fruit", &mut StdRng::seed_from_u64(7))
            .unwrap()
            .to_string();
        let second = bank
            .pick_word("fruit", &mut StdRng::seed_from_u64(7))
            .unwrap()
            .to_string();

        assert_eq!(first, second);
        assert!(first == "apple" || first == "banana");
    }

    #[test]
    fn test_pick_from_empty_category() {
        let bank = WordBank::from_json(FRUIT).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = bank.pick_word("empty", &mut rng);
        assert!(matches!(result, Err(WordSourceError::NoWordsAvailable(id)) if id == "empty"));
    }

    #[test]
    fn test_pick_from_unknown_category() {
        let bank = WordBank::from_json(FRUIT).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = bank.pick_word("vegetables", &mut rng);
        assert!(matches!(result, Err(WordSourceError::UnknownCategory(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FRUIT.as_bytes()).unwrap();

        let bank = WordBank::load(Some(file.path()));
        assert!(bank.category("fruit").is_some());
    }

    #[test]
    fn test_load_falls_back_to_builtin() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();

        let bank = WordBank::load(Some(file.path()));
        assert_eq!(bank, WordBank::builtin().unwrap());

        let bank = WordBank::load(Some(Path::new("/nonexistent/words.json")));
        assert_eq!(bank, WordBank::builtin().unwrap());
    }

    #[test]
    fn test_resolve_id() {
        let bank = WordBank::from_json(FRUIT).unwrap();

        assert_eq!(bank.resolve_id(Some("empty")), Some("empty"));
        assert_eq!(bank.resolve_id(Some("missing")), Some("fruit"));
        assert_eq!(bank.resolve_id(None), Some("fruit"));
    }

    #[test]
    fn test_cycle_id_wraps() {
        let bank = WordBank::from_json(FRUIT).unwrap();

        assert_eq!(bank.cycle_id("fruit", 1), Some("empty"));
        assert_eq!(bank.cycle_id("empty", 1), Some("fruit"));
        assert_eq!(bank.cycle_id("fruit", -1), Some("empty"));
        assert_eq!(bank.cycle_id("unknown", 1), Some("empty"));
    }
}
