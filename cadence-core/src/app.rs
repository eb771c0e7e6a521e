//! The application shell: long-lived subsystems and the startup sequence of
//! the primary instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::documents::DocumentManager;
use crate::events::Subscribers;
use crate::platform::{self, KeyEvent, PlatformHook};
use crate::runtime::{LanguageRuntime, RuntimeResponse};
use crate::session::SessionStore;
use crate::settings::{Settings, LAST_SESSION};

/// The main window, as far as startup ordering is concerned.
pub trait MainWindow {
    fn show(&self);
    /// Restore saved geometry. Only reliable once the window is visible.
    fn restore_window_state(&self);
    /// Create editor tabs for the documents that are already open.
    fn restore_documents(&self);
}

/// Dockable panels and dialogs that lookup requests are forwarded to.
pub trait Panels: Send + Sync {
    fn goto_help_for(&self, symbol: &str);
    fn goto_help_for_method(&self, class_name: &str, method_name: &str);
    fn focus_help(&self);
    /// Run the definition lookup dialog, pre-filled with `query` if given.
    fn show_lookup(&self, query: Option<&str>);
    /// Run the references dialog, pre-filled with `query` if given.
    fn show_references(&self, query: Option<&str>);
    fn show_command_line(&self, text: &str);
    fn restore_override_cursor(&self);
}

/// Application-level events delivered by the windowing system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A file was dropped onto the application icon (macOS).
    FileOpen(PathBuf),
    MouseMove,
}

/// Process-wide context owned by the primary instance.
///
/// Constructed once at startup and passed explicitly to whatever needs
/// settings, sessions or documents.
pub struct AppContext {
    settings: RwLock<Settings>,
    settings_path: PathBuf,
    documents: Arc<DocumentManager>,
    sessions: Arc<dyn SessionStore>,
    runtime: Arc<dyn LanguageRuntime>,
    runtime_responses: Arc<Subscribers<RuntimeResponse>>,
    platform: Arc<dyn PlatformHook>,
    panels: Arc<dyn Panels>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        documents: Arc<DocumentManager>,
        sessions: Arc<dyn SessionStore>,
        runtime: Arc<dyn LanguageRuntime>,
        panels: Arc<dyn Panels>,
    ) -> Self {
        let runtime_responses = Arc::new(Subscribers::new());
        let docs = documents.clone();
        runtime_responses.subscribe(move |response: &RuntimeResponse| {
            docs.handle_runtime_message(response)
        });

        Self {
            settings: RwLock::new(settings),
            settings_path,
            documents,
            sessions,
            platform: platform::default_hook(runtime.clone()),
            runtime,
            runtime_responses,
            panels,
        }
    }

    pub fn with_platform_hook(mut self, hook: Arc<dyn PlatformHook>) -> Self {
        self.platform = hook;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings.write());
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn documents(&self) -> Arc<DocumentManager> {
        self.documents.clone()
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    /// Interpreter responses are published here; the document manager is
    /// subscribed from construction.
    pub fn runtime_responses(&self) -> Arc<Subscribers<RuntimeResponse>> {
        self.runtime_responses.clone()
    }

    pub fn handle_runtime_response(&self, response: &RuntimeResponse) {
        self.runtime_responses.emit(response);
    }

    /// Bring the application up after the main window has been created.
    ///
    /// The window is shown before anything touches its geometry, and the
    /// session is restored only once the GUI exists so it can react to the
    /// documents being opened.
    pub fn start(&self, window: &dyn MainWindow, args: &[PathBuf]) {
        window.show();

        let start_session = self
            .settings
            .read()
            .value("ide/start_with_session")
            .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            .unwrap_or_default();
        if start_session == LAST_SESSION {
            if let Some(last) = self.sessions.last_session() {
                self.open_session(&last);
            }
        } else if !start_session.is_empty() {
            self.open_session(&start_session);
        }

        if self.sessions.current_session().is_none() {
            window.restore_window_state();
            self.sessions.new_session();
        }

        for arg in args {
            self.documents.open(&arg.to_string_lossy());
        }

        window.restore_documents();

        let auto_start = self
            .settings
            .read()
            .value("ide/interpreter/auto_start")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if auto_start {
            self.runtime.start_language();
        }
    }

    fn open_session(&self, name: &str) {
        if let Err(e) = self.sessions.open_session(name) {
            log::warn!("Could not restore session '{}': {}", name, e);
        }
    }

    /// Save the session and settings, then stop the interpreter.
    pub fn quit(&self) {
        if let Err(e) = self.sessions.save_session() {
            log::warn!("Failed to save session: {}", e);
        }
        if let Err(e) = self.store_settings() {
            log::warn!("Failed to store settings: {}", e);
        }
        self.runtime.stop_language();
    }

    pub fn store_settings(&self) -> Result<(), String> {
        self.settings.read().save_to(&self.settings_path)
    }

    /// Returns `true` if the event was consumed.
    pub fn handle_event(&self, event: &AppEvent) -> bool {
        match event {
            AppEvent::FileOpen(path) => {
                self.documents.open(&path.to_string_lossy());
                true
            }
            AppEvent::MouseMove => {
                self.panels.restore_override_cursor();
                false
            }
        }
    }

    /// Offer a raw key event to the platform hook before shortcut dispatch.
    pub fn native_event_filter(&self, event: &KeyEvent) -> bool {
        self.platform.intercept_global_shortcut(event)
    }

    pub fn open_documentation(&self, text: &str) -> bool {
        let symbol = text.trim();
        if symbol.is_empty() {
            return false;
        }
        self.panels.goto_help_for(symbol);
        self.panels.focus_help();
        true
    }

    pub fn open_documentation_for_method(&self, class_name: &str, method_name: &str) -> bool {
        self.panels.goto_help_for_method(class_name, method_name);
        self.panels.focus_help();
        true
    }

    pub fn open_definition(&self, text: &str) {
        self.panels.show_lookup(non_empty(text));
    }

    pub fn find_references(&self, text: &str) {
        self.panels.show_references(non_empty(text));
    }

    pub fn open_command_line(&self, text: &str) {
        self.panels.show_command_line(text);
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
