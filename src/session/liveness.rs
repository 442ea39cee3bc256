use crate::environment::Runtime;
use crate::error::{DenvError, Result};

/// Check whether a process with `pid` exists.
///
/// Uses `kill(pid, 0)`, which probes for the process without signalling it.
/// `EPERM` means the process exists but belongs to someone else.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
	use nix::errno::Errno;
	use nix::sys::signal::kill;
	use nix::unistd::Pid;

	if pid == 0 {
		return false;
	}
	let Ok(raw) = i32::try_from(pid) else {
		return false;
	};
	match kill(Pid::from_raw(raw), None) {
		Ok(()) => true,
		Err(Errno::EPERM) => true,
		Err(_) => false,
	}
}

/// Without a process probe, assume every recorded process is alive so that
/// nothing is cleaned up or deleted on a guess.
#[cfg(not(unix))]
pub fn process_exists(pid: u32) -> bool {
	pid != 0
}

/// Ask a running process to terminate with `SIGTERM`.
///
/// Returns `Ok(false)` if no such process exists.
#[cfg(unix)]
pub fn terminate_process(pid: u32) -> Result<bool> {
	use nix::sys::signal::{Signal, kill};
	use nix::unistd::Pid;

	if !process_exists(pid) {
		return Ok(false);
	}
	let raw = i32::try_from(pid).map_err(|_| DenvError::SignalError {
		pid,
		source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
	})?;
	kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| DenvError::SignalError {
		pid,
		source: std::io::Error::from(errno),
	})?;
	tracing::info!(pid, "sent SIGTERM");
	Ok(true)
}

#[cfg(not(unix))]
pub fn terminate_process(pid: u32) -> Result<bool> {
	Err(DenvError::SignalError {
		pid,
		source: std::io::Error::from(std::io::ErrorKind::Unsupported),
	})
}

/// Number of sessions in `runtime` whose process is still running.
pub fn active_session_count(runtime: &Runtime) -> usize {
	runtime
		.sessions
		.values()
		.filter(|session| process_exists(session.pid))
		.count()
}
