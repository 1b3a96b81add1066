//! Termination signals for the coordinator
//!
//! The handler only stores to an atomic flag. The coordinator's threads see
//! the flag through [`crate::coordinator::StopToken::watching`] at their next
//! cycle boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use tracing::{debug, info};

/// Set once any handled signal arrives
pub static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

const HANDLED: [Signal; 4] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT, Signal::SIGHUP];

extern "C" fn on_signal(_signal: nix::libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT, SIGTERM, SIGQUIT and SIGHUP to [`STOP_REQUESTED`]
pub fn install() -> nix::Result<()> {
    debug!("signals::install: called");
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::SA_RESTART, SigSet::empty());
    for signal in HANDLED {
        // SAFETY: the handler only performs an atomic store
        unsafe { sigaction(signal, &action) }?;
    }
    info!(signals = ?HANDLED, "signals::install: handlers installed");
    Ok(())
}
