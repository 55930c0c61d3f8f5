use crate::shared::{PROJECT_DIR_ENV_VAR, RUN_ID_ENV_VAR};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Root of the Gradle project to analyze. Defaults to the current directory.
    #[arg(long, short = 'C', global(true), env = PROJECT_DIR_ENV_VAR)]
    working_dir: Option<String>,

    /// When outputting logs, the run-id is the unique value that will define where these go.
    /// In the case that the run-id is re-used, the old values will be overwritten.
    #[arg(long, global(true), env = RUN_ID_ENV_VAR)]
    run_id: Option<String>,
}

impl ConfigOptions {
    pub fn generate_run_id() -> String {
        let id = nanoid::nanoid!(4, &nanoid::alphabet::SAFE);
        let now = chrono::Local::now();
        let current_time = now.format("%Y%m%d");
        format!("{}-{}", current_time, id)
    }

    pub fn get_run_id(&self) -> String {
        self.run_id.clone().unwrap_or_else(Self::generate_run_id)
    }

    pub fn load_config(&self) -> Result<FoundConfig> {
        let current_dir = std::env::current_dir();
        let working_dir = match (current_dir, &self.working_dir) {
            (_, Some(dir)) => PathBuf::from(dir),
            (Ok(cwd), None) => cwd,
            _ => {
                error!(target: "user", "Unable to get a working dir");
                return Err(anyhow!("Unable to get a working dir"));
            }
        };

        if !working_dir.is_dir() {
            return Err(anyhow!(
                "Project directory {} does not exist",
                working_dir.display()
            ));
        }

        let found_config = FoundConfig { working_dir };
        debug!("Loaded config {:?}", found_config);

        Ok(found_config)
    }
}

#[derive(Debug, Clone)]
pub struct FoundConfig {
    pub working_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[clap(flatten)]
        config: ConfigOptions,
    }

    #[test]
    fn test_explicit_working_dir_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().display().to_string();
        let opts = TestCli::parse_from(["test", "-C", &path, "--run-id", "abc"]).config;

        let config = opts.load_config().unwrap();

        assert_eq!(dir.path(), config.working_dir);
        assert_eq!("abc", opts.get_run_id());
    }

    #[test]
    fn test_missing_working_dir_is_rejected() {
        let opts = TestCli::parse_from(["test", "-C", "/does/not/exist/anywhere"]).config;

        assert!(opts.load_config().is_err());
    }

    #[test]
    fn test_generated_run_id_has_date_prefix() {
        let run_id = ConfigOptions::generate_run_id();
        let (date, id) = run_id.split_once('-').unwrap();

        assert_eq!(8, date.len());
        assert_eq!(4, id.len());
    }
}
