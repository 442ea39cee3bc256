use crate::environment::{Runtime, Session, load_runtime, save_runtime};
use crate::error::{DenvError, Result};
use crate::session::liveness::{process_exists, terminate_process};
use crate::session::lock::{SessionLock, platform_lock, remove_lock_file};
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;

/// Subdirectory of an environment holding session lock files.
pub const SESSIONS_DIR: &str = "sessions";

/// Identifiers tried before giving up on creating a session.
pub const MAX_LOCK_ATTEMPTS: usize = 10;

const LOCK_EXTENSION: &str = "lock";

/// A live session: its identifier, owning PID and held lock.
///
/// Dropping the handle releases the lock; use [`SessionHandle::detach`] to
/// hand the session over to a longer-lived process.
#[derive(Debug)]
pub struct SessionHandle {
	pub id: String,
	pub pid: u32,
	lock: Box<dyn SessionLock>,
}

impl SessionHandle {
	/// Release the lock and delete its file. Safe to call more than once.
	pub fn release(&mut self) -> Result<()> {
		if self.lock.is_held() {
			tracing::debug!(
				session = %self.id,
				path = %self.lock.path().display(),
				"releasing session lock"
			);
		}
		self.lock.release()
	}

	pub fn is_held(&self) -> bool {
		self.lock.is_held()
	}

	/// Record for the runtime file.
	pub fn record(&self) -> Session {
		Session {
			id: self.id.clone(),
			pid: self.pid,
			started: Utc::now(),
			tty: None,
		}
	}

	/// Give up the lock handle without deleting the lock file.
	///
	/// The session then lives on through its PID; it is ended with
	/// [`SessionRegistry::end_session`] or swept by
	/// [`SessionRegistry::cleanup_orphaned`].
	pub fn detach(mut self) -> Session {
		self.lock.detach();
		self.record()
	}
}

impl Drop for SessionHandle {
	fn drop(&mut self) {
		if let Err(e) = self.release() {
			tracing::warn!(session = %self.id, error = %e, "failed to release session lock");
		}
	}
}

/// Sessions of one environment directory.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
	env_dir: PathBuf,
}

impl SessionRegistry {
	pub fn new(env_dir: impl Into<PathBuf>) -> Self {
		SessionRegistry {
			env_dir: env_dir.into(),
		}
	}

	pub fn sessions_dir(&self) -> PathBuf {
		self.env_dir.join(SESSIONS_DIR)
	}

	pub fn lock_path(&self, id: &str) -> PathBuf {
		self.sessions_dir().join(format!("{}.{}", id, LOCK_EXTENSION))
	}

	/// Create a session for `pid`, optionally prefixing its id with `label`.
	///
	/// A taken identifier is replaced by a fresh one, up to
	/// [`MAX_LOCK_ATTEMPTS`] identifiers in total.
	pub fn create_session(&self, label: Option<&str>, pid: u32) -> Result<SessionHandle> {
		self.create_session_with(label, pid, generate_session_id)
	}

	fn create_session_with(
		&self,
		label: Option<&str>,
		pid: u32,
		mut next_id: impl FnMut() -> String,
	) -> Result<SessionHandle> {
		if let Some(label) = label.filter(|l| !l.is_empty()) {
			validate_session_id(label)?;
		}

		let sessions_dir = self.sessions_dir();
		std::fs::create_dir_all(&sessions_dir).map_err(|source| DenvError::CreateDirError {
			path: sessions_dir.clone(),
			source,
		})?;

		for attempt in 1..=MAX_LOCK_ATTEMPTS {
			let id = match label {
				Some(label) if !label.is_empty() => format!("{}-{}", label, next_id()),
				_ => next_id(),
			};

			let mut lock = platform_lock(self.lock_path(&id));
			if lock.try_acquire()? {
				tracing::info!(session = %id, pid, "session created");
				return Ok(SessionHandle { id, pid, lock });
			}
			tracing::debug!(session = %id, attempt, "session lock contended, retrying");
		}

		Err(DenvError::LockContention {
			attempts: MAX_LOCK_ATTEMPTS,
		})
	}

	/// Session ids that have a lock file on disk.
	pub fn list_sessions(&self) -> Vec<String> {
		let Ok(entries) = std::fs::read_dir(self.sessions_dir()) else {
			return Vec::new();
		};

		let mut ids: Vec<String> = entries
			.filter_map(|entry| entry.ok())
			.map(|entry| entry.path())
			.filter(|path| path.extension().is_some_and(|ext| ext == LOCK_EXTENSION))
			.filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
			.collect();
		ids.sort();
		ids
	}

	/// Drop every session whose process is gone, along with its lock file.
	///
	/// The runtime record is only rewritten if something was removed.
	/// Returns the number of sessions removed.
	pub fn cleanup_orphaned(&self) -> Result<usize> {
		let Some(mut runtime) = load_runtime(&self.env_dir)? else {
			return Ok(0);
		};

		let dead: Vec<String> = runtime
			.sessions
			.iter()
			.filter(|(_, session)| !process_exists(session.pid))
			.map(|(id, _)| id.clone())
			.collect();

		for id in &dead {
			runtime.sessions.remove(id);
			if let Err(e) = remove_lock_file(&self.lock_path(id)) {
				tracing::warn!(session = %id, error = %e, "could not delete orphaned lock file");
			}
			tracing::info!(session = %id, "removed orphaned session");
		}

		if !dead.is_empty() {
			save_runtime(&self.env_dir, &runtime)?;
		}
		Ok(dead.len())
	}

	/// Send `SIGTERM` to every session whose process is alive. Returns the
	/// signalled sessions.
	///
	/// Records are left in place; they are swept by
	/// [`SessionRegistry::cleanup_orphaned`] once the processes exit.
	pub fn terminate_sessions(&self) -> Result<Vec<Session>> {
		let Some(runtime) = load_runtime(&self.env_dir)? else {
			return Ok(Vec::new());
		};

		let mut signalled = Vec::new();
		for session in runtime.sessions.into_values() {
			if terminate_process(session.pid)? {
				tracing::info!(session = %session.id, pid = session.pid, "terminated session");
				signalled.push(session);
			}
		}
		Ok(signalled)
	}

	/// Record a session in the environment's runtime record.
	pub fn register(&self, runtime: &mut Runtime, session: Session) {
		runtime.sessions.insert(session.id.clone(), session);
	}

	/// End a session: release its lock, delete its lock file and remove it
	/// from the runtime record.
	pub fn end_session(&self, mut handle: SessionHandle) -> Result<()> {
		handle.release()?;
		self.end_session_by_id(&handle.id)
	}

	/// End a detached session known only by id.
	pub fn end_session_by_id(&self, id: &str) -> Result<()> {
		validate_session_id(id)?;
		remove_lock_file(&self.lock_path(id))?;

		if let Some(mut runtime) = load_runtime(&self.env_dir)?
			&& runtime.sessions.remove(id).is_some()
		{
			save_runtime(&self.env_dir, &runtime)?;
		}
		tracing::info!(session = %id, "session ended");
		Ok(())
	}
}

/// Reject ids and labels that could name a file outside `sessions/`.
pub fn validate_session_id(id: &str) -> Result<()> {
	let invalid = id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']);
	if invalid {
		return Err(DenvError::InvalidSessionId { id: id.to_string() });
	}
	Ok(())
}

/// Random session identifier: 6 random bytes, hex encoded.
pub fn generate_session_id() -> String {
	let mut bytes = [0u8; 6];
	rand::thread_rng().fill(&mut bytes);
	hex::encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::lock::AdvisoryLock;

	fn session(id: &str, pid: u32) -> Session {
		Session {
			id: id.to_string(),
			pid,
			started: Utc::now(),
			tty: None,
		}
	}

	#[test]
	fn test_generate_session_id() {
		let id = generate_session_id();
		assert_eq!(id.len(), 12);
		assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(id, generate_session_id());
	}

	#[test]
	fn test_create_session() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());

		let mut handle = registry.create_session(Some("test"), std::process::id()).unwrap();
		assert!(handle.id.starts_with("test-"));
		assert_eq!(handle.pid, std::process::id());
		assert!(handle.is_held());
		assert!(registry.lock_path(&handle.id).exists());

		handle.release().unwrap();
		assert!(!registry.lock_path(&handle.id).exists());
		handle.release().unwrap();
	}

	#[test]
	fn test_sessions_get_distinct_ids() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());

		let s1 = registry.create_session(Some("shell"), 1).unwrap();
		let s2 = registry.create_session(Some("shell"), 1).unwrap();
		assert_ne!(s1.id, s2.id);

		let listed = registry.list_sessions();
		assert_eq!(listed.len(), 2);
		assert!(listed.contains(&s1.id));
		assert!(listed.contains(&s2.id));
	}

	#[test]
	fn test_drop_releases_lock() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());

		let handle = registry.create_session(None, 1).unwrap();
		let path = registry.lock_path(&handle.id);
		drop(handle);
		assert!(!path.exists());
		assert!(registry.list_sessions().is_empty());
	}

	#[test]
	fn test_contended_id_is_regenerated() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		std::fs::create_dir_all(registry.sessions_dir()).unwrap();

		let mut holder = AdvisoryLock::new(registry.lock_path("taken"));
		assert!(holder.try_acquire().unwrap());

		let mut ids = vec!["fresh", "taken"];
		let handle = registry
			.create_session_with(None, 1, || ids.pop().unwrap().to_string())
			.unwrap();
		assert_eq!(handle.id, "fresh");

		holder.release().unwrap();
	}

	#[test]
	fn test_exhausted_attempts_fail() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		std::fs::create_dir_all(registry.sessions_dir()).unwrap();

		let mut holder = AdvisoryLock::new(registry.lock_path("taken"));
		assert!(holder.try_acquire().unwrap());

		let result = registry.create_session_with(None, 1, || "taken".to_string());
		match result {
			Err(DenvError::LockContention { attempts }) => assert_eq!(attempts, MAX_LOCK_ATTEMPTS),
			other => panic!("Expected LockContention, got {other:?}"),
		}

		holder.release().unwrap();
	}

	#[test]
	fn test_detach_keeps_lock_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());

		let handle = registry.create_session(None, 4242).unwrap();
		let path = registry.lock_path(&handle.id);
		let record = handle.detach();

		assert_eq!(record.pid, 4242);
		assert!(path.exists());
		assert_eq!(registry.list_sessions(), vec![record.id]);
	}

	#[cfg(unix)]
	#[test]
	fn test_cleanup_orphaned() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		std::fs::create_dir_all(registry.sessions_dir()).unwrap();

		let mut runtime = Runtime::new("p", "e");
		registry.register(&mut runtime, session("alive-session", std::process::id()));
		registry.register(&mut runtime, session("dead-session", 999_999_999));
		save_runtime(temp_dir.path(), &runtime).unwrap();
		std::fs::write(registry.lock_path("dead-session"), "").unwrap();

		assert_eq!(registry.cleanup_orphaned().unwrap(), 1);

		let reloaded = load_runtime(temp_dir.path()).unwrap().unwrap();
		assert_eq!(reloaded.sessions.len(), 1);
		assert!(reloaded.sessions.contains_key("alive-session"));
		assert!(!registry.lock_path("dead-session").exists());

		assert_eq!(registry.cleanup_orphaned().unwrap(), 0);
	}

	#[cfg(unix)]
	#[test]
	fn test_cleanup_saves_even_if_a_lock_file_cannot_be_removed() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		std::fs::create_dir_all(registry.sessions_dir()).unwrap();

		let mut runtime = Runtime::new("p", "e");
		registry.register(&mut runtime, session("aaa-stuck", 999_999_998));
		registry.register(&mut runtime, session("bbb-dead", 999_999_999));
		save_runtime(temp_dir.path(), &runtime).unwrap();

		// A directory in place of the lock file cannot be removed as a file.
		let stuck = registry.lock_path("aaa-stuck");
		std::fs::create_dir_all(stuck.join("inner")).unwrap();
		std::fs::write(registry.lock_path("bbb-dead"), "").unwrap();

		assert_eq!(registry.cleanup_orphaned().unwrap(), 2);

		let reloaded = load_runtime(temp_dir.path()).unwrap().unwrap();
		assert!(reloaded.sessions.is_empty());
		assert!(!registry.lock_path("bbb-dead").exists());
	}

	#[test]
	fn test_validate_session_id() {
		assert!(validate_session_id("a1b2c3").is_ok());
		assert!(validate_session_id("shell-a1b2c3").is_ok());
		for bad in ["", ".", "..", "../x", "a/b", "a\\b"] {
			assert!(
				matches!(validate_session_id(bad), Err(DenvError::InvalidSessionId { .. })),
				"{bad:?} should be rejected"
			);
		}
	}

	#[test]
	fn test_label_with_separator_is_rejected() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path().join("env"));

		let result = registry.create_session(Some("../../escape"), 1);
		assert!(matches!(result, Err(DenvError::InvalidSessionId { .. })));
		assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
	}

	#[test]
	fn test_end_session_rejects_traversal() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path().join("env"));
		std::fs::create_dir_all(registry.sessions_dir()).unwrap();
		let outside = temp_dir.path().join("victim.lock");
		std::fs::write(&outside, "").unwrap();

		let result = registry.end_session_by_id("../../victim");
		assert!(matches!(result, Err(DenvError::InvalidSessionId { .. })));
		assert!(outside.exists());
	}

	#[cfg(unix)]
	#[test]
	fn test_terminate_sessions_signals_live_processes() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();

		let mut runtime = Runtime::new("p", "e");
		registry.register(&mut runtime, session("target", child.id()));
		registry.register(&mut runtime, session("dead", 999_999_999));
		save_runtime(temp_dir.path(), &runtime).unwrap();

		let signalled = registry.terminate_sessions().unwrap();
		assert_eq!(signalled.len(), 1);
		assert_eq!(signalled[0].id, "target");

		assert!(!child.wait().unwrap().success());
		assert_eq!(load_runtime(temp_dir.path()).unwrap().unwrap().sessions.len(), 2);
	}

	#[test]
	fn test_cleanup_without_runtime() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		assert_eq!(registry.cleanup_orphaned().unwrap(), 0);
	}

	#[test]
	fn test_end_session_updates_runtime() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());

		let handle = registry.create_session(None, std::process::id()).unwrap();
		let id = handle.id.clone();
		let mut runtime = Runtime::new("p", "e");
		registry.register(&mut runtime, handle.record());
		save_runtime(temp_dir.path(), &runtime).unwrap();

		registry.end_session(handle).unwrap();

		let reloaded = load_runtime(temp_dir.path()).unwrap().unwrap();
		assert!(reloaded.sessions.is_empty());
		assert!(!registry.lock_path(&id).exists());
	}
}
