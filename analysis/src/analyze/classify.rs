use super::status::AnalysisResult;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use url::Url;

const PASSED_MARKER: &str = "Overall: PASSED";
const FAILED_MARKER: &str = "Overall: FAILED";
const DESCRIPTOR_OPENING: &str = "Overall: FAILED (";
const TOOL_FAILURE_PREFIXES: [&str; 2] = ["Error", "FAILURE"];

lazy_static! {
    static ref REPORT_LOCATION_REGEX: Regex =
        Regex::new(r#"file:[^\s"'<>]*full_report\.html"#).unwrap();
}

/// Turns the complete output of an analysis run into its verdict.
///
/// Pure and deterministic, the same text always gives the same result.
pub fn classify(output: &str) -> AnalysisResult {
    if TOOL_FAILURE_PREFIXES
        .iter()
        .any(|prefix| output.starts_with(prefix))
    {
        debug!("Output starts with a tool failure marker");
        return AnalysisResult::transport_error(output);
    }

    if output.contains(PASSED_MARKER) {
        return AnalysisResult::Passed;
    }

    if !output.contains(FAILED_MARKER) {
        debug!("No verdict marker found in output");
        return AnalysisResult::undetermined();
    }

    match extract_descriptor(output) {
        Some(descriptor) => AnalysisResult::FailedWithCount {
            descriptor,
            report_location: extract_report_location(output),
        },
        None => {
            debug!("Found {} without a parsable descriptor", FAILED_MARKER);
            AnalysisResult::undetermined()
        }
    }
}

fn extract_descriptor(output: &str) -> Option<String> {
    output
        .match_indices(DESCRIPTOR_OPENING)
        .find_map(|(start, opening)| balanced_descriptor(&output[start + opening.len()..]))
}

/// Text up to the parenthesis that closes the one opened right before `rest`.
/// Anything after it (colour reset sequences included) is ignored. The
/// descriptor has to close on the same line and can't be empty.
fn balanced_descriptor(rest: &str) -> Option<String> {
    let mut depth = 0usize;
    for (index, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return (index > 0).then(|| rest[..index].to_string()),
            ')' => depth -= 1,
            '\r' | '\n' => return None,
            _ => {}
        }
    }
    None
}

fn extract_report_location(output: &str) -> Option<Url> {
    let found = REPORT_LOCATION_REGEX.find(output)?;
    match Url::parse(found.as_str()) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!("Ignoring malformed report location {}: {}", found.as_str(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(descriptor: &str, location: Option<&str>) -> AnalysisResult {
        AnalysisResult::FailedWithCount {
            descriptor: descriptor.to_string(),
            report_location: location.map(|l| Url::parse(l).unwrap()),
        }
    }

    #[test]
    fn test_passed() {
        assert_eq!(AnalysisResult::Passed, classify("Overall: PASSED\n"));
    }

    #[test]
    fn test_failed_without_report() {
        assert_eq!(
            failed("12 issues", None),
            classify("Overall: FAILED (12 issues)\n")
        );
    }

    #[test]
    fn test_failed_with_report() {
        assert_eq!(
            failed("3 issues", Some("file:///tmp/report/full_report.html")),
            classify("Overall: FAILED (3 issues)\nfile:///tmp/report/full_report.html\n")
        );
    }

    #[test]
    fn test_no_marker_is_undetermined() {
        assert_eq!(AnalysisResult::undetermined(), classify("Building...\n"));
        assert_eq!(AnalysisResult::undetermined(), classify(""));
    }

    #[test]
    fn test_tool_failure_is_transport_error() {
        let output = "FAILURE: Build failed with an exception.\n";
        assert_eq!(AnalysisResult::transport_error(output), classify(output));

        let output = "Error: Could not find or load main class org.gradle.wrapper.GradleWrapperMain\n";
        assert_eq!(AnalysisResult::transport_error(output), classify(output));
    }

    #[test]
    fn test_tool_failure_wins_over_verdicts() {
        let output = "FAILURE: something\nOverall: PASSED\nOverall: FAILED (1 issue)\n";
        assert_eq!(AnalysisResult::transport_error(output), classify(output));
    }

    #[test]
    fn test_tool_failure_only_at_start() {
        let output = "> Task :lint\nFAILURE: something\nOverall: PASSED\n";
        assert_eq!(AnalysisResult::Passed, classify(output));
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("overall: passed\nfailure\n")
        );
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("error: lowercase is not a tool failure\n")
        );
    }

    #[test]
    fn test_passed_checked_before_failed() {
        let output = "Overall: PASSED\nOverall: FAILED (2 issues)\n";
        assert_eq!(AnalysisResult::Passed, classify(output));
    }

    #[test]
    fn test_failed_without_descriptor_is_undetermined() {
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("Overall: FAILED\n")
        );
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("Overall: FAILED ()\n")
        );
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("Overall: FAILED (unterminated\n)\n")
        );
    }

    #[test]
    fn test_descriptor_followed_by_escape_sequence() {
        assert_eq!(
            failed("7 issues", None),
            classify("\u{1b}[31mOverall: FAILED (7 issues)\u{1b}[0m\n")
        );
    }

    #[test]
    fn test_descriptor_with_nested_parentheses() {
        assert_eq!(
            failed("4 issues (2 new)", None),
            classify("Overall: FAILED (4 issues (2 new))\n")
        );
    }

    #[test]
    fn test_descriptor_with_deeply_nested_parentheses() {
        assert_eq!(
            failed("a (b (c))", None),
            classify("Overall: FAILED (a (b (c)))\n")
        );
        assert_eq!(
            AnalysisResult::undetermined(),
            classify("Overall: FAILED (a (b (c))\n")
        );
    }

    #[test]
    fn test_first_failure_marker_wins() {
        let output = "Overall: FAILED (1 issue)\nOverall: FAILED (9 issues)\n";
        assert_eq!(failed("1 issue", None), classify(output));
    }

    #[test]
    fn test_report_location_must_be_file_scheme() {
        let output = "Overall: FAILED (2 issues)\nhttp://example.com/full_report.html\n";
        assert_eq!(failed("2 issues", None), classify(output));
    }

    #[test]
    fn test_report_location_before_marker() {
        let output = "Report: file:///C:/work/build/reports/full_report.html\nOverall: FAILED (5 issues)\n";
        assert_eq!(
            failed("5 issues", Some("file:///C:/work/build/reports/full_report.html")),
            classify(output)
        );
    }

    #[test]
    fn test_classification_is_repeatable() {
        let output = "Overall: FAILED (3 issues)\nfile:///tmp/report/full_report.html\n";
        assert_eq!(classify(output), classify(output));
    }
}
