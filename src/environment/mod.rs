//! Environment state for denv.
//!
//! This module handles:
//! - The persisted runtime record (`runtime.json`)
//! - Entering an environment: ports, session and rule application
//! - Listing and guarded removal of environment directories
//! - Export script rendering
//! - Status views of ports, overrides and sessions

pub mod export;
pub mod lifecycle;
pub mod prepare;
pub mod runtime;
pub mod status;

pub use export::{escape_shell_value, render_exports};
pub use lifecycle::{EnvironmentEntry, list_environments, remove_environment, remove_inactive};
pub use prepare::{PrepareRequest, Prepared, core_variables, port_variables, prepare};
pub use runtime::{Override, RUNTIME_FILE, Runtime, Session, load_runtime, save_runtime};
pub use status::{EnvironmentStatus, PortMapping, SessionStatus, environment_status};
