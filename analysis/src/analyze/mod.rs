mod classify;
mod cli;
mod error;
mod status;

pub use classify::classify;
pub use status::{AnalysisResult, UNDETERMINED_REASON};

pub mod prelude {
    pub use super::classify::classify;
    pub use super::cli::{AnalyzeArgs, ClassifyArgs, analyze_root, classify_root};
    pub use super::error::AnalyzeError;
    pub use super::status::{AnalysisResult, UNDETERMINED_REASON};
}
