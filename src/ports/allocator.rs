use crate::error::{DenvError, Result};
use crate::ports::probe::{find_free_port, is_port_available};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Original port -> allocated port for one environment.
pub type PortTable = BTreeMap<u16, u16>;

/// Name of the allocator's sidecar file inside an environment directory.
pub const PORTS_FILE: &str = "ports.json";

pub const DEFAULT_MIN_PORT: u16 = 30000;
pub const DEFAULT_MAX_PORT: u16 = 39999;

/// Assigns collision-free ports and remembers them in `ports.json`.
///
/// Allocation calls within one process are serialized by an internal mutex.
/// Across processes the sidecar is a plain load/modify/store cycle and the
/// last writer wins.
#[derive(Debug)]
pub struct PortAllocator {
	file: PathBuf,
	min_port: u16,
	max_port: u16,
	mappings: Mutex<PortTable>,
}

impl PortAllocator {
	/// Open the allocator for an environment directory, loading any saved
	/// mappings.
	pub fn open(env_dir: &Path) -> Self {
		let file = env_dir.join(PORTS_FILE);
		let mappings = match load_port_table(&file) {
			Ok(table) => table,
			Err(e) => {
				tracing::warn!(path = %file.display(), error = %e, "ignoring unreadable port table");
				PortTable::new()
			}
		};

		PortAllocator {
			file,
			min_port: DEFAULT_MIN_PORT,
			max_port: DEFAULT_MAX_PORT,
			mappings: Mutex::new(mappings),
		}
	}

	/// Reconfigure the allocation bounds (inclusive).
	pub fn set_range(&mut self, min: u16, max: u16) {
		self.min_port = min;
		self.max_port = max;
	}

	/// Snapshot of the current mappings.
	pub fn mappings(&self) -> PortTable {
		self.lock().clone()
	}

	/// Return the port mapped to `original`, allocating a new one if there is
	/// no mapping yet or the mapped port is no longer bindable.
	pub fn get_port(&self, original: u16) -> Result<u16> {
		let mut mappings = self.lock();

		let reserved: HashSet<u16> = mappings
			.iter()
			.filter(|(orig, _)| **orig != original)
			.map(|(_, allocated)| *allocated)
			.collect();

		if let Some(&mapped) = mappings.get(&original) {
			if !reserved.contains(&mapped) && is_port_available(mapped) {
				tracing::debug!(original, mapped, "reusing port mapping");
				return Ok(mapped);
			}
			tracing::info!(original, mapped, "mapped port unavailable, reallocating");
		}

		let port = find_free_port(self.min_port, self.max_port, &reserved);
		if port == 0 {
			tracing::warn!(original, min = self.min_port, max = self.max_port, "port range exhausted");
			return Err(DenvError::AllocationExhausted {
				min: self.min_port,
				max: self.max_port,
			});
		}

		mappings.insert(original, port);
		save_port_table(&self.file, &mappings)?;
		tracing::info!(original, allocated = port, "allocated port");
		Ok(port)
	}

	/// Merge `seed` into the in-memory table without replacing existing
	/// entries, then persist the result.
	pub fn initialize_with_ports(&self, seed: &PortTable) -> Result<()> {
		let mut mappings = self.lock();
		for (&original, &allocated) in seed {
			mappings.entry(original).or_insert(allocated);
		}
		save_port_table(&self.file, &mappings)
	}

	fn lock(&self) -> MutexGuard<'_, PortTable> {
		self.mappings
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Read a port table; a missing file is an empty table.
pub fn load_port_table(path: &Path) -> Result<PortTable> {
	let content = match std::fs::read_to_string(path) {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PortTable::new()),
		Err(source) => {
			return Err(DenvError::StateReadError {
				path: path.to_path_buf(),
				source,
			});
		}
	};
	serde_json::from_str(&content).map_err(|source| DenvError::StateParseError {
		path: path.to_path_buf(),
		source,
	})
}

/// Write a port table as a JSON object of decimal strings to numbers.
pub fn save_port_table(path: &Path, table: &PortTable) -> Result<()> {
	let data = serde_json::to_string_pretty(table).map_err(|source| DenvError::StateSerializeError {
		path: path.to_path_buf(),
		source,
	})?;
	std::fs::write(path, data).map_err(|source| DenvError::WriteError {
		path: path.to_path_buf(),
		source,
	})
}
