//! Flag evaluation and action dispatch.
//!
//! Replaces trigger decorators with an explicit function from the current
//! flags to the actions that should run. The runner re-plans after every
//! action, so an install that sets `che.available` can be followed by the
//! relation configuration within the same hook.

use std::collections::BTreeSet;

use crate::charm::installer::{InstallReport, Installer};
use crate::error::Result;
use crate::state::{StateStore, flags};

/// Something the charm should do given the current flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No runtime yet and nothing installed: report waiting.
    AwaitRuntime,
    /// Runtime ready, Che not installed.
    Install,
    /// Che installed and an editor relation is present.
    ConfigureEditorRelation,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitRuntime => "await-runtime",
            Self::Install => "install",
            Self::ConfigureEditorRelation => "configure-editor-relation",
        }
    }
}

/// Flags visible to the planner: persisted plus per-invocation ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(BTreeSet<String>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: &dyn StateStore) -> Self {
        Self(state.flags().into_iter().collect())
    }

    pub fn with(mut self, flag: &str) -> Self {
        self.0.insert(flag.to_string());
        self
    }

    pub fn extend<'a>(mut self, other: impl IntoIterator<Item = &'a str>) -> Self {
        self.0.extend(other.into_iter().map(str::to_string));
        self
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }
}

/// Decide which actions the current flags call for, in execution order.
pub fn plan(flags: &FlagSet) -> Vec<Action> {
    let runtime = flags.contains(flags::DOCKER_AVAILABLE);
    let installed = flags.contains(flags::CHE_AVAILABLE);
    let editor = flags.contains(flags::EDITOR_AVAILABLE);

    let mut actions = Vec::new();
    match (runtime, installed) {
        (true, false) => actions.push(Action::Install),
        (false, false) => actions.push(Action::AwaitRuntime),
        (_, true) => {}
    }
    if editor && installed {
        actions.push(Action::ConfigureEditorRelation);
    }
    actions
}

/// Flags implied by the hook being run.
pub fn flags_for_hook(hook: &str) -> Vec<&'static str> {
    match hook {
        "editor-relation-joined" | "editor-relation-changed" => vec![flags::EDITOR_AVAILABLE],
        _ => Vec::new(),
    }
}

/// What one dispatch pass did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub executed: Vec<Action>,
    pub install: Option<InstallReport>,
}

/// Plan and execute until no new action is called for.
///
/// A failing action leaves the unit blocked and ends the pass.
/// `transient` carries flags that only hold for this invocation (runtime
/// detection, relation hooks). Each action runs at most once per call.
pub async fn dispatch(
    installer: &Installer,
    state: &mut dyn StateStore,
    transient: &FlagSet,
) -> Result<DispatchReport> {
    let mut report = DispatchReport::default();

    loop {
        let current = FlagSet::from_state(state).extend(transient.0.iter().map(String::as_str));
        let Some(action) = plan(&current)
            .into_iter()
            .find(|a| !report.executed.contains(a))
        else {
            break;
        };

        tracing::info!("Running action: {}", action.as_str());
        let result = match action {
            Action::AwaitRuntime => installer.await_runtime().await,
            Action::Install => installer
                .install(state)
                .await
                .map(|install| report.install = install),
            Action::ConfigureEditorRelation => installer.configure_editor_relation().await,
        };
        if let Err(e) = result {
            installer.report_blocked(action, &e).await;
            return Err(e);
        }
        report.executed.push(action);
    }

    if report.executed.is_empty() {
        tracing::debug!("Nothing to do");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_ready_not_installed_installs() {
        let flags = FlagSet::new().with(flags::DOCKER_AVAILABLE);
        assert_eq!(plan(&flags), vec![Action::Install]);
    }

    #[test]
    fn test_installed_is_noop() {
        let flags = FlagSet::new()
            .with(flags::DOCKER_AVAILABLE)
            .with(flags::CHE_AVAILABLE);
        assert!(plan(&flags).is_empty());

        // Even with the runtime gone.
        assert!(plan(&FlagSet::new().with(flags::CHE_AVAILABLE)).is_empty());
    }

    #[test]
    fn test_no_runtime_waits() {
        assert_eq!(plan(&FlagSet::new()), vec![Action::AwaitRuntime]);
    }

    #[test]
    fn test_editor_needs_install() {
        let before = FlagSet::new()
            .with(flags::DOCKER_AVAILABLE)
            .with(flags::EDITOR_AVAILABLE);
        assert_eq!(plan(&before), vec![Action::Install]);

        let after = before.with(flags::CHE_AVAILABLE);
        assert_eq!(plan(&after), vec![Action::ConfigureEditorRelation]);
    }

    #[test]
    fn test_hook_flags() {
        assert_eq!(
            flags_for_hook("editor-relation-joined"),
            vec![flags::EDITOR_AVAILABLE]
        );
        assert_eq!(
            flags_for_hook("editor-relation-changed"),
            vec![flags::EDITOR_AVAILABLE]
        );
        assert!(flags_for_hook("editor-relation-departed").is_empty());
        assert!(flags_for_hook("install").is_empty());
    }
}
