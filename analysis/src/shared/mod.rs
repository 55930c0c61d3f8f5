mod capture;
mod config_load;
mod logging;
mod platform;

pub const PROJECT_DIR_ENV_VAR: &str = "GRADLE_ANALYSIS_PROJECT_DIR";
pub const RUN_ID_ENV_VAR: &str = "GRADLE_ANALYSIS_RUN_ID";

pub mod prelude {
    pub use super::capture::{
        CaptureError, CaptureOpts, CaptureStatus, CapturedLine, DefaultExecutionProvider,
        ExecutionProvider, MockExecutionProvider, NoProgress, OutputCapture, OutputCaptureBuilder,
        OutputStream, ProgressSink, RunningProcess,
    };
    pub use super::config_load::{ConfigOptions, FoundConfig};
    pub use super::logging::{LoggingOpts, LoggingProgress, spinner_style};
    pub use super::platform::{ANALYSIS_TASK_NAME, OsFamily, analysis_command};
    pub use super::{PROJECT_DIR_ENV_VAR, RUN_ID_ENV_VAR};
}
