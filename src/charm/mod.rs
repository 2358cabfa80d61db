//! Charm lifecycle: flag-driven dispatch and the install driver.
//!
//! A two-state machine, `NotInstalled → Installed`, with no way back:
//!
//! ```text
//!   docker.available ∧ ¬che.available ──▶ Install ──▶ che.available
//!   editor.available ∧ che.available  ──▶ ConfigureEditorRelation
//! ```

pub mod dispatch;
pub mod installer;

pub use dispatch::{Action, DispatchReport, FlagSet, dispatch, flags_for_hook, plan};
pub use installer::{EDITOR_RELATION, InstallReport, Installer};
