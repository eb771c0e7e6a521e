use std::sync::atomic::{AtomicBool, Ordering};

use cadence_core::runtime::LanguageRuntime;

/// Interpreter handle for an interpreter that is launched and supervised
/// outside the IDE. It only tracks whether the IDE asked for it to run.
#[derive(Debug, Default)]
pub struct ExternalInterpreter {
    requested: AtomicBool,
}

impl ExternalInterpreter {
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl LanguageRuntime for ExternalInterpreter {
    fn start_language(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            log::info!("Interpreter start requested");
        }
    }

    fn stop_language(&self) {
        if self.requested.swap(false, Ordering::SeqCst) {
            log::info!("Interpreter stop requested");
        }
    }

    fn stop_main(&self) {
        log::info!("Stop requested for running code");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop_toggle_request() {
        let interpreter = ExternalInterpreter::default();
        interpreter.start_language();
        interpreter.start_language();
        assert!(interpreter.is_requested());
        interpreter.stop_language();
        assert!(!interpreter.is_requested());
    }
}
