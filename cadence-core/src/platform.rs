//! Platform hooks for keys that must be handled before normal shortcut
//! dispatch, such as Cmd+Period on macOS, which stops the interpreter even
//! while a modal dialog or another widget has keyboard focus.

use std::sync::Arc;

use crate::runtime::LanguageRuntime;

/// Accelerator intercepted on macOS to stop all running code.
pub const STOP_ACCEL: &str = "<Super>period";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Cmd on macOS, the Windows/Super key elsewhere.
    pub super_: bool,
}

/// A raw key event as delivered by the windowing system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub modifiers: Modifiers,
    /// Key name, e.g. `"period"`, `"s"`, `"F5"`.
    pub key: String,
}

impl KeyEvent {
    pub fn press(modifiers: Modifiers, key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Press,
            modifiers,
            key: key.into(),
        }
    }

    pub fn release(modifiers: Modifiers, key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Release,
            modifiers,
            key: key.into(),
        }
    }
}

/// Parsed representation of an accelerator for matching key events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAccel {
    pub modifiers: Modifiers,
    /// The lowercase key name (e.g. "g", "period", "f11")
    pub key_lower: String,
}

impl ParsedAccel {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.modifiers == self.modifiers && event.key.to_lowercase() == self.key_lower
    }
}

/// Parse an accel string like `"<Ctrl><Shift>g"` into a `ParsedAccel`.
pub fn parse_accel(accel: &str) -> Option<ParsedAccel> {
    let mut modifiers = Modifiers::default();
    let mut remaining = accel;

    while remaining.starts_with('<') {
        if let Some(end) = remaining.find('>') {
            let modifier = &remaining[1..end];
            match modifier.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" => modifiers.alt = true,
                "super" | "cmd" | "meta" => modifiers.super_ = true,
                _ => return None,
            }
            remaining = &remaining[end + 1..];
        } else {
            return None;
        }
    }

    if remaining.is_empty() {
        return None;
    }

    Some(ParsedAccel {
        modifiers,
        key_lower: remaining.to_lowercase(),
    })
}

/// Hook consulted for every raw key event before regular shortcut handling.
pub trait PlatformHook: Send + Sync {
    /// Returns `true` if the event was consumed.
    fn intercept_global_shortcut(&self, event: &KeyEvent) -> bool;
}

/// Hook for platforms where no key needs early interception.
#[derive(Debug, Default)]
pub struct NoopHook;

impl PlatformHook for NoopHook {
    fn intercept_global_shortcut(&self, _event: &KeyEvent) -> bool {
        false
    }
}

/// Stops the interpreter on Cmd+Period, bypassing normal shortcut handling.
///
/// Both press and release are consumed so the key never reaches the focused
/// widget.
pub struct CmdPeriodHook {
    accel: Option<ParsedAccel>,
    runtime: Arc<dyn LanguageRuntime>,
}

impl CmdPeriodHook {
    pub fn new(runtime: Arc<dyn LanguageRuntime>) -> Self {
        Self::with_accel(STOP_ACCEL, runtime)
    }

    /// Hook bound to `accel`. An accelerator that does not parse disables
    /// the hook.
    pub fn with_accel(accel: &str, runtime: Arc<dyn LanguageRuntime>) -> Self {
        let parsed = parse_accel(accel);
        if parsed.is_none() {
            log::warn!("Invalid stop accelerator '{}', interception disabled", accel);
        }
        Self {
            accel: parsed,
            runtime,
        }
    }
}

impl PlatformHook for CmdPeriodHook {
    fn intercept_global_shortcut(&self, event: &KeyEvent) -> bool {
        match &self.accel {
            Some(accel) if accel.matches(event) => {}
            _ => return false,
        }
        if event.kind == KeyEventKind::Press {
            log::debug!("Cmd+Period: stopping interpreter");
            self.runtime.stop_main();
        }
        true
    }
}

/// The hook appropriate for the target platform.
pub fn default_hook(runtime: Arc<dyn LanguageRuntime>) -> Arc<dyn PlatformHook> {
    if cfg!(target_os = "macos") {
        Arc::new(CmdPeriodHook::new(runtime))
    } else {
        Arc::new(NoopHook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRuntime {
        stops: AtomicUsize,
    }

    impl LanguageRuntime for CountingRuntime {
        fn start_language(&self) {}
        fn stop_language(&self) {}
        fn stop_main(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cmd() -> Modifiers {
        Modifiers {
            super_: true,
            ..Modifiers::default()
        }
    }

    #[test]
    fn parse_accel_reads_modifiers_and_key() {
        let parsed = parse_accel("<Ctrl><Shift>G").unwrap();
        assert!(parsed.modifiers.ctrl);
        assert!(parsed.modifiers.shift);
        assert!(!parsed.modifiers.alt);
        assert_eq!(parsed.key_lower, "g");
    }

    #[test]
    fn parse_accel_rejects_bad_input() {
        assert!(parse_accel("").is_none());
        assert!(parse_accel("<Ctrl>").is_none());
        assert!(parse_accel("<Hyper>x").is_none());
        assert!(parse_accel("<Ctrl").is_none());
    }

    #[test]
    fn stop_accel_matches_cmd_period_only() {
        let parsed = parse_accel(STOP_ACCEL).unwrap();
        assert!(parsed.matches(&KeyEvent::press(cmd(), "Period")));
        assert!(!parsed.matches(&KeyEvent::press(Modifiers::default(), "period")));

        let cmd_shift = Modifiers {
            shift: true,
            ..cmd()
        };
        assert!(!parsed.matches(&KeyEvent::press(cmd_shift, "period")));
    }

    #[test]
    fn cmd_period_press_stops_interpreter() {
        let runtime = Arc::new(CountingRuntime::default());
        let hook = CmdPeriodHook::new(runtime.clone());

        assert!(hook.intercept_global_shortcut(&KeyEvent::press(cmd(), "period")));
        assert!(hook.intercept_global_shortcut(&KeyEvent::release(cmd(), "period")));
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_keys_pass_through() {
        let runtime = Arc::new(CountingRuntime::default());
        let hook = CmdPeriodHook::new(runtime.clone());

        assert!(!hook.intercept_global_shortcut(&KeyEvent::press(cmd(), "comma")));
        assert!(!hook.intercept_global_shortcut(&KeyEvent::press(Modifiers::default(), "period")));
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_accel_replaces_cmd_period() {
        let runtime = Arc::new(CountingRuntime::default());
        let hook = CmdPeriodHook::with_accel("<Ctrl>period", runtime.clone());
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };

        assert!(hook.intercept_global_shortcut(&KeyEvent::press(ctrl, "period")));
        assert!(!hook.intercept_global_shortcut(&KeyEvent::press(cmd(), "period")));
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unparsable_accel_disables_hook() {
        let runtime = Arc::new(CountingRuntime::default());
        let hook = CmdPeriodHook::with_accel("<Hyper>period", runtime.clone());

        assert!(!hook.intercept_global_shortcut(&KeyEvent::press(cmd(), "period")));
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn noop_hook_never_intercepts() {
        assert!(!NoopHook.intercept_global_shortcut(&KeyEvent::press(cmd(), "period")));
    }
}
