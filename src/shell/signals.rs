use log::warn;
use nix::sys::signal::{signal, SigHandler, Signal};

const INTERACTIVE_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

/// Keeps keyboard interrupts aimed at a running command from also killing
/// the interactive interpreter.
pub fn ignore_interactive_signals() {
    for sig in INTERACTIVE_SIGNALS {
        // SAFETY: SIG_IGN installs no handler code.
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            warn!("unable to ignore {:?}: {}", sig, e);
        }
    }
}

/// Puts the default dispositions back in a forked child, since ignored
/// signals stay ignored across exec. SIGPIPE is ignored by the Rust runtime
/// itself.
pub fn restore_default_signals() {
    for sig in INTERACTIVE_SIGNALS.into_iter().chain([Signal::SIGPIPE]) {
        // SAFETY: SIG_DFL installs no handler code.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}
