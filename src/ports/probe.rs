use rand::Rng;
use std::collections::HashSet;
use std::net::TcpListener;

/// Random draws attempted before falling back to a linear scan.
pub const RANDOM_ATTEMPTS: usize = 1000;

/// Whether a TCP listener can currently be bound to `port` on all interfaces.
///
/// The probe listener is closed immediately.
pub fn is_port_available(port: u16) -> bool {
	if port == 0 {
		return false;
	}
	TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// Find a bindable port in `[min, max]` that is not in `reserved`.
///
/// Tries random draws in `[min, max)` first, then scans the whole range in
/// ascending order. Returns `0` when every port is taken.
pub fn find_free_port(min: u16, max: u16, reserved: &HashSet<u16>) -> u16 {
	let usable = |port: u16| !reserved.contains(&port) && is_port_available(port);

	if min < max {
		let mut rng = rand::thread_rng();
		for _ in 0..RANDOM_ATTEMPTS {
			let port = rng.gen_range(min..max);
			if usable(port) {
				return port;
			}
		}
	}

	(min..=max).find(|&port| usable(port)).unwrap_or(0)
}
