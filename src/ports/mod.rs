//! Port allocation for denv.
//!
//! This module handles:
//! - Probing whether a TCP port is bindable
//! - Allocating stable, collision-free replacement ports per environment
//! - Persisting the port table as `ports.json`

pub mod allocator;
pub mod probe;

pub use allocator::{
	DEFAULT_MAX_PORT, DEFAULT_MIN_PORT, PORTS_FILE, PortAllocator, PortTable, load_port_table,
	save_port_table,
};
pub use probe::{find_free_port, is_port_available};
