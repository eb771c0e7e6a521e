use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cadence_core::app::{MainWindow, Panels};
use cadence_core::documents::{DocumentEvent, DocumentManager};
use cadence_core::settings::WindowSettings;
use cadence_core::translations::Translator;

/// Main window stand-in used when no GUI toolkit is attached.
///
/// Every request is reported through the log, so the startup sequence and
/// forwarded requests can be followed with `RUST_LOG=info`.
pub struct HeadlessWindow {
    translator: Arc<Translator>,
    documents: Arc<DocumentManager>,
    geometry: WindowSettings,
    visible: AtomicBool,
}

impl HeadlessWindow {
    pub fn new(
        translator: Arc<Translator>,
        documents: Arc<DocumentManager>,
        geometry: WindowSettings,
    ) -> Self {
        let tr = translator.clone();
        documents.subscribe(move |event| match event {
            DocumentEvent::Opened(doc) => log::info!("{} {}", tr.tr("Opened"), doc.path),
            DocumentEvent::Activated(doc) => log::info!("{} {}", tr.tr("Activated"), doc.path),
            DocumentEvent::Closed(doc) => log::info!("{} {}", tr.tr("Closed"), doc.path),
        });

        Self {
            translator,
            documents,
            geometry,
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

impl MainWindow for HeadlessWindow {
    fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);
        log::info!("{}", self.translator.tr("Cadence IDE"));
    }

    fn restore_window_state(&self) {
        if !self.is_visible() {
            log::warn!("Restoring window state before the window is shown");
        }
        log::debug!(
            "Window geometry {}x{} (maximized: {})",
            self.geometry.width,
            self.geometry.height,
            self.geometry.maximized
        );
    }

    fn restore_documents(&self) {
        let documents = self.documents.documents();
        log::info!(
            "{}: {}",
            self.translator.tr("Open documents"),
            documents.len()
        );
        for doc in documents {
            log::debug!("  [{}] {}", doc.id, doc.path);
        }
    }
}

impl Panels for HeadlessWindow {
    fn goto_help_for(&self, symbol: &str) {
        log::info!("{}: {}", self.translator.tr("Help"), symbol);
    }

    fn goto_help_for_method(&self, class_name: &str, method_name: &str) {
        log::info!(
            "{}: {}:{}",
            self.translator.tr("Help"),
            class_name,
            method_name
        );
    }

    fn focus_help(&self) {
        log::debug!("Help panel focused");
    }

    fn show_lookup(&self, query: Option<&str>) {
        log::info!(
            "{}: {}",
            self.translator.tr("Look Up Definitions"),
            query.unwrap_or_default()
        );
    }

    fn show_references(&self, query: Option<&str>) {
        log::info!(
            "{}: {}",
            self.translator.tr("Find References"),
            query.unwrap_or_default()
        );
    }

    fn show_command_line(&self, text: &str) {
        log::info!("{}: {}", self.translator.tr("Command Line"), text);
    }

    fn restore_override_cursor(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_marks_window_visible() {
        let window = HeadlessWindow::new(
            Arc::new(Translator::default()),
            Arc::new(DocumentManager::new()),
            WindowSettings::default(),
        );
        assert!(!window.is_visible());
        window.show();
        assert!(window.is_visible());
    }
}
