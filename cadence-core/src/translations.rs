//! Translation catalogs for user-visible strings.
//!
//! Catalogs are flat JSON objects mapping source text to translated text,
//! stored as `cadence.json` (fallback, plural forms in English) and
//! `cadence_<locale>.json` in the translations directory. Missing catalogs
//! are not an error: lookups then return the source text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::util;

const CATALOG_PREFIX: &str = "cadence";
const DEFAULT_LOCALE: &str = "en_US";

#[derive(Debug, Default)]
pub struct Translator {
    locale: String,
    fallback: HashMap<String, String>,
    localized: HashMap<String, String>,
}

impl Translator {
    /// Load the fallback catalog and the catalog for `locale` from `dir`.
    ///
    /// For a locale such as `de_AT` both `cadence_de_AT.json` and
    /// `cadence_de.json` are tried, in that order.
    pub fn load(dir: &Path, locale: &str) -> Self {
        let fallback_path = dir.join(format!("{}.json", CATALOG_PREFIX));
        let fallback = match read_catalog(&fallback_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                log::warn!("Failed to load fallback translation file: {}", e);
                HashMap::new()
            }
        };

        let mut localized = HashMap::new();
        for candidate in locale_candidates(locale) {
            let path = dir.join(format!("{}_{}.json", CATALOG_PREFIX, candidate));
            match read_catalog(&path) {
                Ok(catalog) => {
                    log::info!("Loaded translations for {} from {}", candidate, path.display());
                    localized = catalog;
                    break;
                }
                Err(e) => log::debug!("No translation catalog for {}: {}", candidate, e),
            }
        }

        Self {
            locale: locale.to_string(),
            fallback,
            localized,
        }
    }

    /// Load catalogs for the system locale from the default resource directory.
    pub fn load_system() -> Self {
        Self::load(&translations_dir(), &system_locale())
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn has_locale_catalog(&self) -> bool {
        !self.localized.is_empty()
    }

    pub fn tr<'a>(&'a self, text: &'a str) -> &'a str {
        self.localized
            .get(text)
            .or_else(|| self.fallback.get(text))
            .map(String::as_str)
            .unwrap_or(text)
    }
}

pub fn translations_dir() -> PathBuf {
    util::resource_dir().join("translations")
}

/// Locale name from `LC_ALL`, `LC_MESSAGES` or `LANG`, e.g. `de_AT`.
pub fn system_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| normalize_locale(&value))
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}

/// Strip encoding and modifier suffixes (`de_AT.UTF-8@euro` → `de_AT`).
/// `C` and `POSIX` carry no language and yield `None`.
fn normalize_locale(raw: &str) -> Option<String> {
    let name = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "C" | "POSIX" => None,
        _ => Some(name.replace('-', "_")),
    }
}

fn locale_candidates(locale: &str) -> Vec<String> {
    let mut candidates = vec![locale.to_string()];
    if let Some((language, _)) = locale.split_once('_') {
        if !language.is_empty() {
            candidates.push(language.to_string());
        }
    }
    candidates
}

fn read_catalog(path: &Path) -> Result<HashMap<String, String>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("{}: {}", path.display(), e))
}
