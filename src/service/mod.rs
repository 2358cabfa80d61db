//! Lifecycle of the Che service container.
//!
//! Che is started through its launcher image, which is a *startup
//! trampoline*: it boots the real server containers through the mounted
//! runtime socket, then lingers. The charm therefore:
//! - Launches the trampoline detached
//! - Polls the local HTTP endpoint until it answers 200
//! - Stops and removes the trampoline; Che keeps running
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                             CheService                                │
//! │                                                                       │
//! │   start()                                                             │
//! │      │                                                                │
//! │      ▼                                                                │
//! │   ┌──────────────┐     ┌──────────────┐     ┌──────────────────────┐  │
//! │   │ run -id      │────▶│ GET / until  │────▶│ stop (may fail)      │  │
//! │   │ start --fast │     │ 200          │     │ rm   (must succeed)  │  │
//! │   └──────────────┘     └──────────────┘     └──────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod manager;
pub mod probe;

pub use config::{ServiceConfig, ServiceEndpoint};
pub use manager::{CheService, StartReport, TeardownReport};
pub use probe::{ProbeOutcome, ReadinessProbe};
