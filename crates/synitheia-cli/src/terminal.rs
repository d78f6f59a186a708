//! Terminal stand-ins for the notification and exclusive-display capabilities.

use std::sync::atomic::{AtomicBool, Ordering};

use synitheia_core::focus::{ExclusiveDisplay, Notifier};
use synitheia_core::Result;

/// Prints notifications to stderr. Permission is granted when notifications
/// are enabled in the config.
pub struct TerminalNotifier {
    enabled: bool,
}

impl TerminalNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for TerminalNotifier {
    fn request_permission(&self) -> bool {
        self.enabled
    }

    fn send(&self, title: &str, body: &str, delay_minutes: u32) {
        if delay_minutes > 0 {
            eprintln!("[notification in {delay_minutes} min] {title} {body}");
        } else {
            eprintln!("[notification] {title} {body}");
        }
    }
}

/// A terminal has no fullscreen; this one is toggled by the `enter` and
/// `leave` commands of the focus prompt.
#[derive(Default)]
pub struct SimulatedDisplay {
    active: AtomicBool,
}

impl SimulatedDisplay {
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ExclusiveDisplay for SimulatedDisplay {
    fn request(&self) -> Result<()> {
        self.set_active(true);
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        self.set_active(false);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
