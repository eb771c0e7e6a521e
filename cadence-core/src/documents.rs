use std::path::Path;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::events::{SubscriptionId, Subscribers};
use crate::runtime::RuntimeResponse;
use crate::util;

/// Anything that can open a document by path.
///
/// Opening a path that is already open must not fail; implementations
/// typically just bring the existing document forward.
pub trait DocumentOpener: Send + Sync {
    fn open(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Opened(Document),
    /// An already open document was requested again.
    Activated(Document),
    Closed(Document),
}

/// Registry of open documents, kept in opening order.
pub struct DocumentManager {
    documents: RwLock<Vec<Document>>,
    events: Subscribers<DocumentEvent>,
}

impl Default for DocumentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentManager {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            events: Subscribers::new(),
        }
    }

    /// Open `path`, or activate it if it is already open.
    ///
    /// Paths are canonicalized first so the same file reached through
    /// different spellings maps to one document. Returns `None` for an empty
    /// path.
    pub fn open(&self, path: &str) -> Option<Document> {
        if path.is_empty() {
            log::warn!("Ignoring request to open an empty path");
            return None;
        }
        let canonical = util::canonical_path_string(Path::new(path));

        let event = {
            let mut documents = self.documents.write();
            match documents.iter().find(|d| d.path == canonical) {
                Some(existing) => DocumentEvent::Activated(existing.clone()),
                None => {
                    let document = Document {
                        id: Uuid::new_v4().to_string(),
                        path: canonical,
                    };
                    documents.push(document.clone());
                    DocumentEvent::Opened(document)
                }
            }
        };

        let document = match &event {
            DocumentEvent::Opened(d) => {
                log::info!("Opened document {}", d.path);
                d.clone()
            }
            DocumentEvent::Activated(d) | DocumentEvent::Closed(d) => d.clone(),
        };
        self.events.emit(&event);
        Some(document)
    }

    /// Returns `false` if `path` was not open.
    pub fn close(&self, path: &str) -> bool {
        let canonical = util::canonical_path_string(Path::new(path));
        let removed = {
            let mut documents = self.documents.write();
            documents
                .iter()
                .position(|d| d.path == canonical)
                .map(|index| documents.remove(index))
        };

        match removed {
            Some(document) => {
                log::info!("Closed document {}", document.path);
                self.events.emit(&DocumentEvent::Closed(document));
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, path: &str) -> bool {
        let canonical = util::canonical_path_string(Path::new(path));
        self.documents.read().iter().any(|d| d.path == canonical)
    }

    pub fn open_paths(&self) -> Vec<String> {
        self.documents.read().iter().map(|d| d.path.clone()).collect()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.read().clone()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&DocumentEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// React to a request from the interpreter.
    pub fn handle_runtime_message(&self, response: &RuntimeResponse) {
        match response.selector.as_str() {
            "openFile" => {
                self.open(&response.data);
            }
            "closeDocument" => {
                if !self.close(&response.data) {
                    log::debug!("Interpreter closed unknown document {}", response.data);
                }
            }
            other => {
                log::debug!("Unhandled interpreter message: {}", other);
            }
        }
    }
}

impl DocumentOpener for DocumentManager {
    fn open(&self, path: &str) {
        DocumentManager::open(self, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::IpcMessage;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn write_file(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, "").unwrap();
        std::fs::canonicalize(path)
            .unwrap()
            .to_string_lossy()
            .to_string()
    }

    #[test]
    fn opening_twice_keeps_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.scd");
        let manager = DocumentManager::new();

        let first = manager.open(&path).unwrap();
        let second = manager.open(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.open_paths(), vec![path]);
    }

    #[test]
    fn different_spellings_resolve_to_same_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let path = write_file(dir.path(), "a.scd");
        let manager = DocumentManager::new();

        manager.open(&path);
        let indirect = dir.path().join("sub").join("..").join("a.scd");
        manager.open(&indirect.to_string_lossy());
        assert_eq!(manager.documents().len(), 1);
        assert!(manager.is_open(&indirect.to_string_lossy()));
    }

    #[test]
    fn empty_path_is_ignored() {
        let manager = DocumentManager::new();
        assert!(manager.open("").is_none());
        assert!(manager.documents().is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let padded = write_file(dir.path(), "song.scd ");
        write_file(dir.path(), "song.scd");
        let manager = DocumentManager::new();

        let message = IpcMessage::open(vec![padded.clone()]);
        crate::instance::dispatch(&message, &manager);

        assert_eq!(manager.open_paths(), vec![padded.clone()]);
        assert!(manager.is_open(&padded));
        assert!(manager.close(&padded));
    }

    #[test]
    fn events_report_open_activate_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.scd");
        let manager = DocumentManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        manager.subscribe(move |event| {
            let tag = match event {
                DocumentEvent::Opened(_) => "opened",
                DocumentEvent::Activated(_) => "activated",
                DocumentEvent::Closed(_) => "closed",
            };
            sink.lock().push(tag);
        });

        manager.open(&path);
        manager.open(&path);
        assert!(manager.close(&path));
        assert!(!manager.close(&path));

        assert_eq!(*seen.lock(), vec!["opened", "activated", "closed"]);
    }

    #[test]
    fn open_order_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let b = write_file(dir.path(), "b.scd");
        let a = write_file(dir.path(), "a.scd");
        let manager = DocumentManager::new();

        manager.open(&b);
        manager.open(&a);
        assert_eq!(manager.open_paths(), vec![b, a]);
    }

    #[test]
    fn runtime_messages_open_and_close_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "from-interpreter.scd");
        let manager = DocumentManager::new();

        manager.handle_runtime_message(&RuntimeResponse::new("openFile", path.clone()));
        assert!(manager.is_open(&path));

        manager.handle_runtime_message(&RuntimeResponse::new("postText", "hello"));
        assert_eq!(manager.documents().len(), 1);

        manager.handle_runtime_message(&RuntimeResponse::new("closeDocument", path.clone()));
        assert!(!manager.is_open(&path));
    }

    #[test]
    fn works_as_a_shared_opener() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "shared.scd");
        let manager = Arc::new(DocumentManager::new());
        let opener: Arc<dyn DocumentOpener> = manager.clone();

        opener.open(&path);
        assert!(manager.is_open(&path));
    }
}
