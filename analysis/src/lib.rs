pub mod analyze;
pub mod shared;
pub mod task;

pub mod prelude {
    pub use crate::analyze::prelude::*;
    pub use crate::shared::prelude::*;
    pub use crate::task::{
        AnalysisTask, ConsolePresenter, Notification, NotificationKind, ResultPresenter,
        RunHandle, RunOutcome, TaskError, TaskState,
    };
}
