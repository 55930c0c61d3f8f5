use strum::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    /// The process exited and its output was classified.
    Completed,
    /// Cancelled while running, no result was delivered.
    Cancelled,
    /// The process could not be spawned or read.
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// How a single run ended, as seen by whoever waits on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(crate::analyze::AnalysisResult),
    Failed(crate::analyze::AnalysisResult),
    Cancelled,
}

impl RunOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            RunOutcome::Completed(_) => TaskState::Completed,
            RunOutcome::Failed(_) => TaskState::Failed,
            RunOutcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn result(&self) -> Option<&crate::analyze::AnalysisResult> {
        match self {
            RunOutcome::Completed(result) | RunOutcome::Failed(result) => Some(result),
            RunOutcome::Cancelled => None,
        }
    }

    pub fn to_exit_code(&self) -> i32 {
        match self.result() {
            Some(result) => result.to_exit_code(),
            None => 130,
        }
    }
}
