use crate::error::{DenvError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive, non-blocking lock on a session lock file.
///
/// `try_acquire` never waits: a contended lock reports `Ok(false)`.
/// `release` is idempotent and removes the lock file.
pub trait SessionLock: std::fmt::Debug + Send {
	fn try_acquire(&mut self) -> Result<bool>;

	fn release(&mut self) -> Result<()>;

	/// Close the handle but leave the lock file for a later cleanup.
	fn detach(&mut self);

	fn is_held(&self) -> bool;

	fn path(&self) -> &Path;
}

/// Kernel advisory lock (`flock` on Unix). Released automatically if the
/// holder dies.
#[derive(Debug)]
pub struct AdvisoryLock {
	path: PathBuf,
	file: Option<File>,
}

impl AdvisoryLock {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		AdvisoryLock {
			path: path.into(),
			file: None,
		}
	}
}

impl SessionLock for AdvisoryLock {
	fn try_acquire(&mut self) -> Result<bool> {
		if self.file.is_some() {
			return Ok(true);
		}

		let file = OpenOptions::new()
			.create(true)
			.read(true)
			.write(true)
			.truncate(false)
			.open(&self.path)
			.map_err(|source| DenvError::LockError {
				path: self.path.clone(),
				source,
			})?;

		match FileExt::try_lock_exclusive(&file) {
			Ok(()) => {
				self.file = Some(file);
				Ok(true)
			}
			Err(e) if is_contended(&e) => Ok(false),
			Err(source) => Err(DenvError::LockError {
				path: self.path.clone(),
				source,
			}),
		}
	}

	fn release(&mut self) -> Result<()> {
		let Some(file) = self.file.take() else {
			return Ok(());
		};
		if let Err(e) = FileExt::unlock(&file) {
			tracing::debug!(path = %self.path.display(), error = %e, "unlock failed, closing anyway");
		}
		drop(file);
		remove_lock_file(&self.path)
	}

	fn detach(&mut self) {
		self.file = None;
	}

	fn is_held(&self) -> bool {
		self.file.is_some()
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

/// Lock by exclusive file creation, for platforms without advisory locks.
///
/// A crashed holder leaves its lock file behind; staleness then has to be
/// judged from the session's PID rather than from the lock.
#[derive(Debug)]
pub struct ExclusiveCreateLock {
	path: PathBuf,
	file: Option<File>,
}

impl ExclusiveCreateLock {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		ExclusiveCreateLock {
			path: path.into(),
			file: None,
		}
	}
}

impl SessionLock for ExclusiveCreateLock {
	fn try_acquire(&mut self) -> Result<bool> {
		if self.file.is_some() {
			return Ok(true);
		}

		match OpenOptions::new().write(true).create_new(true).open(&self.path) {
			Ok(file) => {
				self.file = Some(file);
				Ok(true)
			}
			Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
			Err(source) => Err(DenvError::LockError {
				path: self.path.clone(),
				source,
			}),
		}
	}

	fn release(&mut self) -> Result<()> {
		if self.file.take().is_none() {
			return Ok(());
		}
		remove_lock_file(&self.path)
	}

	fn detach(&mut self) {
		self.file = None;
	}

	fn is_held(&self) -> bool {
		self.file.is_some()
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

/// The platform's preferred lock for `path`.
pub fn platform_lock(path: impl Into<PathBuf>) -> Box<dyn SessionLock> {
	if cfg!(unix) {
		Box::new(AdvisoryLock::new(path))
	} else {
		Box::new(ExclusiveCreateLock::new(path))
	}
}

fn is_contended(err: &std::io::Error) -> bool {
	err.kind() == std::io::ErrorKind::WouldBlock
		|| err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Remove a lock file; a file that is already gone is not an error.
pub fn remove_lock_file(path: &Path) -> Result<()> {
	match std::fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(source) => Err(DenvError::LockError {
			path: path.to_path_buf(),
			source,
		}),
	}
}
