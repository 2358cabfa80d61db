//! Result of a non-fatal install step.
//!
//! Fatal failures travel as `Err(InstallError)`. Steps whose failure must
//! not abort the hook report one of these instead, so callers and tests can
//! see exactly which path was taken.

/// What happened to a step that is allowed to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T = ()> {
    /// The step did its job.
    Done(T),
    /// The step failed, was logged, and the flow carried on.
    Recovered { reason: String },
    /// The step was not attempted.
    Skipped { reason: String },
}

impl<T> StepOutcome<T> {
    pub fn recovered(reason: impl Into<String>) -> Self {
        Self::Recovered {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done(_) => "done",
            Self::Recovered { .. } => "recovered",
            Self::Skipped { .. } => "skipped",
        }
    }
}
