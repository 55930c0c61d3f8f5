use serde::Serialize;
use std::fmt;
use url::Url;

/// Reason given when the output carries no usable verdict marker.
pub const UNDETERMINED_REASON: &str = "Can't detect analysis result";

/// Verdict of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AnalysisResult {
    Passed,
    /// The analysis ran and found issues.
    FailedWithCount {
        descriptor: String,
        report_location: Option<Url>,
    },
    /// Output was produced but no verdict could be found in it.
    Undetermined { reason: String },
    /// The tool could not run the analysis, or the process could not be run at all.
    TransportError { message: String },
}

impl AnalysisResult {
    pub fn undetermined() -> Self {
        AnalysisResult::Undetermined {
            reason: UNDETERMINED_REASON.to_string(),
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        AnalysisResult::TransportError {
            message: message.into(),
        }
    }

    pub fn to_exit_code(&self) -> i32 {
        match self {
            AnalysisResult::Passed => 0,
            AnalysisResult::FailedWithCount { .. } => 1,
            AnalysisResult::TransportError { .. } => 2,
            AnalysisResult::Undetermined { .. } => 3,
        }
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisResult::Passed => write!(f, "Overall: PASSED"),
            AnalysisResult::FailedWithCount { descriptor, .. } => {
                write!(f, "Analysis failed: {}", descriptor)
            }
            AnalysisResult::Undetermined { reason } => write!(f, "{}", reason),
            AnalysisResult::TransportError { message } => write!(f, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let results = [
            AnalysisResult::Passed,
            AnalysisResult::FailedWithCount {
                descriptor: "1 issue".to_string(),
                report_location: None,
            },
            AnalysisResult::transport_error("boom"),
            AnalysisResult::undetermined(),
        ];

        let codes: Vec<_> = results.iter().map(|r| r.to_exit_code()).collect();
        assert_eq!(vec![0, 1, 2, 3], codes);
    }

    #[test]
    fn test_serializes_with_tag() {
        let result = AnalysisResult::FailedWithCount {
            descriptor: "3 issues".to_string(),
            report_location: Some(Url::parse("file:///tmp/report/full_report.html").unwrap()),
        };

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            serde_json::json!({
                "result": "failed_with_count",
                "descriptor": "3 issues",
                "report_location": "file:///tmp/report/full_report.html",
            }),
            json
        );
        assert_eq!(
            serde_json::json!({"result": "passed"}),
            serde_json::to_value(AnalysisResult::Passed).unwrap()
        );
    }
}
