//! Emergency kill switch: an atomic shutdown flag shared between the
//! process entry point's signal handler and the dispatch loop. Narrowed to
//! the two transitions this core actually drives: an orderly SIGINT
//! shutdown and the risk manager's emergency condition. A `Paused` state
//! and `signal_hook`-based SIGTERM/SIGUSR1/SIGUSR2 handling have no
//! counterpart here; a single `ctrlc` SIGINT handler (wired in the binary
//! crate) is the process's only signal surface.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KillSwitchState {
    Running = 0,
    ShuttingDown = 1,
    EmergencyStop = 2,
}

impl From<u8> for KillSwitchState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::ShuttingDown,
            2 => Self::EmergencyStop,
            _ => Self::Running,
        }
    }
}

/// Thread-safe shutdown coordination flag. Cheap to clone; clones share the
/// same underlying atomic.
#[derive(Clone)]
pub struct KillSwitch {
    state: Arc<AtomicU8>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self { state: Arc::new(AtomicU8::new(KillSwitchState::Running as u8)) }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        matches!(self.state(), KillSwitchState::ShuttingDown | KillSwitchState::EmergencyStop)
    }

    pub fn state(&self) -> KillSwitchState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Orderly shutdown: cancel all, emit a session summary, exit 0.
    pub fn shutdown(&self) {
        self.state.store(KillSwitchState::ShuttingDown as u8, Ordering::Release);
    }

    /// Risk-manager-triggered emergency condition: cancel all, suppress
    /// further placements, never resumes on its own.
    pub fn emergency_stop(&self) {
        self.state.store(KillSwitchState::EmergencyStop as u8, Ordering::Release);
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let ks = KillSwitch::new();
        assert!(!ks.should_stop());
        assert_eq!(ks.state(), KillSwitchState::Running);
    }

    #[test]
    fn shutdown_and_emergency_both_stop() {
        let ks = KillSwitch::new();
        ks.shutdown();
        assert!(ks.should_stop());

        let ks2 = KillSwitch::new();
        ks2.emergency_stop();
        assert!(ks2.should_stop());
        assert_eq!(ks2.state(), KillSwitchState::EmergencyStop);
    }

    #[test]
    fn clone_shares_state() {
        let ks = KillSwitch::new();
        let clone = ks.clone();
        clone.shutdown();
        assert!(ks.should_stop());
    }
}
