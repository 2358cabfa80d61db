//! Eclipse Che charm.
//!
//! Installs Che into a container on a single host, waits for it to come
//! up, and exposes it through the orchestration framework:
//!
//! - `charm`: flag-driven dispatch and the install driver
//! - `service`: trampoline start, readiness polling, teardown
//! - `stack`: legacy template copy and stack registration
//! - `runtime` / `host`: seams over the container CLI and hook tools
//! - `state`: persisted flags such as `che.available`

pub mod charm;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod outcome;
pub mod runtime;
pub mod service;
pub mod stack;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::CharmConfig;
pub use error::{InstallError, Result};
