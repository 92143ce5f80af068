//! # Subject Keywords
//!
//! Configurable mapping from a ticker symbol to the lowercase terms that count
//! as "the headline names the tracked subject" (company name, ticker, common
//! aliases). Loaded from TOML, with a built-in seed used as fallback when the
//! file is absent or unparseable.
//!
//! The effective set for a symbol always contains the lowercased symbol
//! itself, so an unknown ticker still matches headlines that spell it out.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::info;

pub const DEFAULT_KEYWORDS_CONFIG_PATH: &str = "config/keywords.toml";
pub const ENV_KEYWORDS_CONFIG_PATH: &str = "KEYWORDS_CONFIG_PATH";

/// Raw config shape (from TOML): `[subjects]` table of symbol → term list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordBook {
    #[serde(default)]
    pub subjects: HashMap<String, Vec<String>>,
}

/// The effective, lowercased term set for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl KeywordSet {
    /// True if the (already lowercased) title mentions any subject term.
    pub fn matches(&self, title_lower: &str) -> bool {
        self.terms.iter().any(|t| title_lower.contains(t.as_str()))
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl KeywordBook {
    /// Parse from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let book: KeywordBook = toml::from_str(toml_str)?;
        Ok(book)
    }

    /// Load from a TOML file. Falls back to `default_seed()` on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "keywords config unparseable, using seed"
                );
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Resolve the config path from the environment (or default) and load.
    pub fn load() -> Self {
        let path = config_path();
        Self::load_from_file(path)
    }

    /// Effective keyword set for a symbol: configured terms (lowercased) plus
    /// the lowercased symbol itself, deduplicated.
    pub fn for_symbol(&self, symbol: &str) -> KeywordSet {
        let sym = symbol.trim().to_lowercase();
        let mut terms: Vec<String> = self
            .subjects
            .get(&symbol.trim().to_uppercase())
            .map(|v| v.iter().map(|t| t.trim().to_lowercase()).collect())
            .unwrap_or_default();
        if !sym.is_empty() && !terms.contains(&sym) {
            terms.push(sym);
        }
        terms.retain(|t| !t.is_empty());
        terms.sort();
        terms.dedup();
        KeywordSet { terms }
    }

    /// Built-in seed for a handful of widely-queried tickers.
    pub fn default_seed() -> Self {
        let mut subjects = HashMap::new();
        for (sym, terms) in [
            ("AAPL", vec!["apple", "aapl", "iphone", "cupertino"]),
            ("MSFT", vec!["microsoft", "msft", "azure", "windows"]),
            ("GOOGL", vec!["google", "alphabet", "googl"]),
            ("AMZN", vec!["amazon", "amzn", "aws"]),
            ("META", vec!["meta", "facebook", "instagram"]),
            ("NVDA", vec!["nvidia", "nvda"]),
            ("TSLA", vec!["tesla", "tsla", "elon musk"]),
        ] {
            subjects.insert(
                sym.to_string(),
                terms.into_iter().map(String::from).collect(),
            );
        }
        Self { subjects }
    }
}

pub fn config_path() -> PathBuf {
    std::env::var(ENV_KEYWORDS_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_KEYWORDS_CONFIG_PATH))
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Threadsafe handle so the API can keep serving while the book is swapped.
/// Hot reload is dev-gated: KEYWORDS_HOT_RELOAD=1 AND a debug build or
/// APP_ENV in {local, development, dev}.
#[derive(Clone)]
pub struct KeywordsHandle {
    inner: Arc<RwLock<KeywordBook>>,
}

impl KeywordsHandle {
    pub fn new(book: KeywordBook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(book)),
        }
    }

    pub fn for_symbol(&self, symbol: &str) -> KeywordSet {
        match self.inner.read() {
            Ok(book) => book.for_symbol(symbol),
            Err(_) => KeywordBook::default().for_symbol(symbol),
        }
    }
}

fn hot_reload_enabled() -> bool {
    let want = std::env::var("KEYWORDS_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("APP_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Poll `path` mtime every 2s and swap the book on change. Std-only watcher.
pub fn start_hot_reload_thread(handle: KeywordsHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let changed = match last_mtime {
                        None => {
                            last_mtime = Some(mtime);
                            false
                        }
                        Some(prev) => mtime > prev,
                    };
                    if changed {
                        if let Ok(content) = fs::read_to_string(&path) {
                            if let Ok(fresh) = KeywordBook::from_toml_str(&content) {
                                if let Ok(mut guard) = handle.inner.write() {
                                    *guard = fresh;
                                    info!(target: "keywords", "keyword book reloaded");
                                }
                            }
                        }
                        last_mtime = Some(mtime);
                    }
                }
                Err(_) => {
                    // File missing or unreadable; keep trying.
                }
            }
            thread::sleep(poll);
        }
    });
}
