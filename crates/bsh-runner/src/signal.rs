// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signal names and delivery.

pub use nix::sys::signal::Signal;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Symbolic name of signal number `signo`, e.g. `15` -> `"SIGTERM"`.
///
/// Unknown numbers render as `SIG<n>`.
pub fn signal_name(signo: i32) -> String {
    match Signal::try_from(signo) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => format!("SIG{signo}"),
    }
}

/// Deliver `sig` to process `pid`.
pub fn send_signal(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    let pid = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    kill(Pid::from_raw(pid), sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_signals_have_names() {
        assert_eq!(signal_name(15), "SIGTERM");
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(2), "SIGINT");
    }

    #[test]
    fn unknown_signal_renders_number() {
        assert_eq!(signal_name(999), "SIG999");
    }

    #[test]
    fn oversized_pid_is_rejected() {
        assert_eq!(send_signal(u32::MAX, Signal::SIGTERM), Err(nix::Error::EINVAL));
    }
}
