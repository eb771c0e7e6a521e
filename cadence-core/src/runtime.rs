/// Handle to the language runtime (interpreter) process.
///
/// Process management lives outside this crate; the shell only needs to start
/// and stop the interpreter and to interrupt the code it is running.
pub trait LanguageRuntime: Send + Sync {
    fn start_language(&self);
    fn stop_language(&self);
    /// Stop everything currently running without quitting the interpreter.
    fn stop_main(&self);
}

/// A request sent by the running interpreter to the IDE, e.g. to open a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeResponse {
    pub selector: String,
    pub data: String,
}

impl RuntimeResponse {
    pub fn new(selector: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            data: data.into(),
        }
    }
}
