use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::instance::DEFAULT_IPC_PORT;
use crate::util;

/// Value of `ide.start_with_session` that reopens the most recent session.
pub const LAST_SESSION: &str = "last";

/// Application settings, persisted to `~/.config/cadence/settings.json`.
///
/// `#[serde(default)]` on every section fills in fields missing from an older
/// settings file, so new fields can be added without breaking existing files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub ide: IdeSettings,
    pub window: WindowSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeSettings {
    /// `"last"`, a session name, or empty for a fresh session.
    pub start_with_session: String,
    pub interpreter: InterpreterSettings,
    pub ipc_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSettings {
    pub auto_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: i32,
    pub height: i32,
    pub maximized: bool,
}

impl Default for IdeSettings {
    fn default() -> Self {
        IdeSettings {
            start_with_session: String::from(LAST_SESSION),
            interpreter: InterpreterSettings::default(),
            ipc_port: DEFAULT_IPC_PORT,
        }
    }
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        InterpreterSettings { auto_start: true }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        WindowSettings {
            width: 1200,
            height: 800,
            maximized: false,
        }
    }
}

impl Settings {
    /// Look up a value by `/`-separated key path, e.g. `"ide/interpreter/auto_start"`.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        let document = serde_json::to_value(self).ok()?;
        let pointer = format!("/{}", key.trim_matches('/'));
        document.pointer(&pointer).cloned()
    }

    pub fn load_from(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "Invalid settings at {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }
}

/// Default settings location, `~/.config/cadence/settings.json`.
pub fn settings_path() -> PathBuf {
    util::config_dir().join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_follows_key_path() {
        let settings = Settings::default();
        assert_eq!(
            settings.value("ide/interpreter/auto_start"),
            Some(serde_json::Value::Bool(true))
        );
        assert_eq!(
            settings.value("/ide/start_with_session/"),
            Some(serde_json::Value::String("last".into()))
        );
        assert_eq!(settings.value("ide/no_such_key"), None);
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"ide": {"start_with_session": "live"}}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.ide.start_with_session, "live");
        assert!(settings.ide.interpreter.auto_start);
        assert_eq!(settings.ide.ipc_port, DEFAULT_IPC_PORT);
        assert_eq!(settings.window, WindowSettings::default());
    }

    #[test]
    fn unknown_sections_are_ignored_and_not_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"editor": {"font_size": 14}, "window": {"maximized": true}}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.window.maximized);
        assert_eq!(settings.value("editor"), None);

        settings.save_to(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("editor"));
    }

    #[test]
    fn unreadable_or_invalid_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("missing.json")),
            Settings::default()
        );

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&broken), Settings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.ide.interpreter.auto_start = false;
        settings.window.maximized = true;
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }
}
