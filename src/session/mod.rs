//! Session tracking for denv.
//!
//! This module handles:
//! - Exclusive per-session lock files
//! - Process liveness checks
//! - Session creation, listing, ending and orphan cleanup

pub mod liveness;
pub mod lock;
pub mod registry;

pub use liveness::{active_session_count, process_exists, terminate_process};
pub use lock::{AdvisoryLock, ExclusiveCreateLock, SessionLock, platform_lock};
pub use registry::{
	MAX_LOCK_ATTEMPTS, SESSIONS_DIR, SessionHandle, SessionRegistry, generate_session_id,
	validate_session_id,
};
