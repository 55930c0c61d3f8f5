use strum::Display;

/// Name of the Gradle task that performs the static analysis.
pub const ANALYSIS_TASK_NAME: &str = "staticAnalys";

/// Operating system family used to pick the Gradle wrapper invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Unix,
}

impl OsFamily {
    pub fn current() -> Self {
        Self::from_family_name(std::env::consts::FAMILY)
    }

    /// Anything that is not windows-family is treated like unix, the wrapper
    /// script is invoked directly there.
    pub fn from_family_name(name: &str) -> Self {
        if name.starts_with("windows") {
            OsFamily::Windows
        } else {
            OsFamily::Unix
        }
    }
}

/// The command line that runs the analysis task through the project's Gradle wrapper.
pub fn analysis_command(family: OsFamily) -> Vec<String> {
    let args: &[&str] = match family {
        OsFamily::Windows => &["cmd", "/c", "gradlew.bat", ANALYSIS_TASK_NAME],
        OsFamily::Unix => &["./gradlew", ANALYSIS_TASK_NAME],
    };

    args.iter().map(|x| x.to_string()).collect()
}
