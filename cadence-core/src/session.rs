use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::documents::DocumentManager;
use crate::util;

const SESSION_EXTENSION: &str = "json";
const LAST_SESSION_FILE: &str = "last-session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub width: i32,
    pub height: i32,
    pub maximized: bool,
}

/// A named set of open documents. A session with an empty name is a fresh,
/// unsaved session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub name: String,
    pub documents: Vec<String>,
    pub window: Option<WindowGeometry>,
}

impl Session {
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Session operations the application shell depends on.
pub trait SessionStore: Send + Sync {
    fn last_session(&self) -> Option<String>;
    fn open_session(&self, name: &str) -> Result<(), String>;
    fn new_session(&self);
    fn current_session(&self) -> Option<Session>;
    fn save_session(&self) -> Result<(), String>;
}

/// File-backed sessions, one JSON file per session under a directory.
pub struct SessionManager {
    dir: PathBuf,
    documents: Arc<DocumentManager>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(dir: impl Into<PathBuf>, documents: Arc<DocumentManager>) -> Self {
        Self {
            dir: dir.into(),
            documents,
            current: RwLock::new(None),
        }
    }

    /// Sessions stored under `~/.config/cadence/sessions`.
    pub fn with_default_dir(documents: Arc<DocumentManager>) -> Self {
        Self::new(util::config_dir().join("sessions"), documents)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, name: &str) -> Result<PathBuf, String> {
        validate_session_name(name)?;
        Ok(self
            .dir
            .join(format!("{}.{}", name, SESSION_EXTENSION)))
    }

    /// Names of all saved sessions, sorted.
    pub fn available_sessions(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(SESSION_EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
            })
            .collect();
        names.sort();
        names
    }

    /// Name the current session `name` and save it.
    pub fn save_session_as(&self, name: &str) -> Result<(), String> {
        validate_session_name(name)?;
        {
            let mut current = self.current.write();
            let session = current.get_or_insert_with(Session::default);
            session.name = name.to_string();
        }
        self.save_session()
    }

    fn read_session(&self, name: &str) -> Result<Session, String> {
        let path = self.session_path(name)?;
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read session '{}': {}", name, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("Invalid session file {}: {}", path.display(), e))
    }

    fn write_session(&self, session: &Session) -> Result<(), String> {
        let path = self.session_path(&session.name)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create {}: {}", self.dir.display(), e))?;
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| format!("Failed to serialize session '{}': {}", session.name, e))?;
        std::fs::write(&path, json)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    fn record_last_session(&self, name: &str) {
        let path = self.dir.join(LAST_SESSION_FILE);
        let result = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, name));
        if let Err(e) = result {
            log::warn!("Failed to record last session in {}: {}", path.display(), e);
        }
    }
}

impl SessionStore for SessionManager {
    fn last_session(&self) -> Option<String> {
        let name = std::fs::read_to_string(self.dir.join(LAST_SESSION_FILE)).ok()?;
        let name = name.trim();
        let path = self.session_path(name).ok()?;
        path.is_file().then(|| name.to_string())
    }

    fn open_session(&self, name: &str) -> Result<(), String> {
        let mut session = self.read_session(name)?;
        session.name = name.to_string();

        for path in &session.documents {
            if Path::new(path).exists() {
                self.documents.open(path);
            } else {
                log::warn!("Session '{}': skipping missing document {}", name, path);
            }
        }

        log::info!(
            "Opened session '{}' ({} document(s))",
            name,
            session.documents.len()
        );
        *self.current.write() = Some(session);
        self.record_last_session(name);
        Ok(())
    }

    fn new_session(&self) {
        *self.current.write() = Some(Session::default());
        log::debug!("Started a new unnamed session");
    }

    fn current_session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Unnamed sessions are not persisted.
    fn save_session(&self) -> Result<(), String> {
        let session = {
            let mut current = self.current.write();
            match current.as_mut() {
                Some(session) if session.is_named() => {
                    session.documents = self.documents.open_paths();
                    session.clone()
                }
                _ => {
                    log::debug!("No named session to save");
                    return Ok(());
                }
            }
        };

        self.write_session(&session)?;
        self.record_last_session(&session.name);
        Ok(())
    }
}

fn validate_session_name(name: &str) -> Result<(), String> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(format!("Invalid session name '{}'", name));
    }
    Ok(())
}
