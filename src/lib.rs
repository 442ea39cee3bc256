//! denv - isolated development environments for concurrent working copies.
//!
//! This library provides the core functionality for denv, including:
//! - Pattern rules that remap ports, rewrite local URLs and isolate paths
//! - A persistent, collision-avoiding TCP port allocator
//! - Session tracking with exclusive lock files and PID liveness checks
//! - Guarded cleanup of environment state
//!
//! # Example
//!
//! ```no_run
//! use denv_cli::config::default_config;
//! use denv_cli::environment::{PrepareRequest, prepare};
//! use denv_cli::paths::Paths;
//! use denv_cli::rules::EnvSnapshot;
//!
//! let paths = Paths::new("/tmp/denv");
//! let config = default_config();
//! let env: EnvSnapshot = std::env::vars().collect();
//!
//! let prepared = prepare(&PrepareRequest {
//!     paths: &paths,
//!     config: &config,
//!     project: "myapp",
//!     env_name: "dev",
//!     env: &env,
//!     pid: std::process::id(),
//!     label: None,
//! })
//! .unwrap();
//!
//! for (original, mapped) in &prepared.ports {
//!     println!("{original} -> {mapped}");
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod logging;
pub mod paths;
pub mod ports;
pub mod rules;
pub mod session;

pub use error::{DenvError, Result};
