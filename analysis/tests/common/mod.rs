use assert_cmd::Command;
use assert_cmd::assert::Assert;
use assert_fs::TempDir;
use assert_fs::prelude::PathCopy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn setup_working_dir(dir_name: &str) -> TempDir {
    let file_path = PathBuf::from(format!(
        "{}/tests/test-cases/{}",
        env!("CARGO_MANIFEST_DIR"),
        dir_name
    ));

    let temp = TempDir::new().unwrap();
    temp.copy_from(file_path, &["*", "**/*"]).unwrap();

    temp
}

pub struct AnalysisTestHelper<'a> {
    pub work_dir: TempDir,
    name: &'a str,
    counter: AtomicUsize,
}

impl<'a> AnalysisTestHelper<'a> {
    pub fn new(name: &'a str, test_dir: &'a str) -> Self {
        Self {
            work_dir: setup_working_dir(test_dir),
            name,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn run_command(&self, args: &[&str]) -> Assert {
        self.command(args).assert()
    }

    pub fn run_command_with_stdin(&self, args: &[&str], stdin: &str) -> Assert {
        self.command(args).write_stdin(stdin.to_string()).assert()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("gradle-analysis").unwrap();
        cmd.current_dir(self.work_dir.path())
            .env(
                "GRADLE_ANALYSIS_RUN_ID",
                format!(
                    "{}-{}",
                    self.name,
                    self.counter.fetch_add(1, Ordering::Relaxed)
                ),
            )
            .env("GRADLE_ANALYSIS_OUTPUT_PROGRESS", "plain")
            .env("NO_COLOR", "1")
            .args(args);
        cmd
    }

    pub fn analysis_run(&self, args: Option<&[&str]>) -> Assert {
        let mut run_command = vec!["run"];

        if let Some(extra) = args {
            for entry in extra {
                run_command.push(entry)
            }
        }

        self.run_command(&run_command)
    }

    pub fn clean_work_dir(self) {
        self.work_dir.close().unwrap();
    }
}
