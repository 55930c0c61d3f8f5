use crate::analyze::{AnalysisResult, classify};
use crate::shared::prelude::{CaptureOpts, ExecutionProvider, OsFamily, analysis_command};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod presenter;
mod state;

pub use presenter::{
    ConsolePresenter, MockResultPresenter, NOTIFICATION_TITLE, Notification, NotificationKind,
    PresenterProgress, ResultPresenter,
};
pub use state::{RunOutcome, TaskState};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    #[error("Static analysis is already running")]
    AlreadyRunning,
}

#[derive(Default)]
struct ActiveRun {
    state: TaskState,
    cancel: Option<CancellationToken>,
}

fn lock(active: &Mutex<ActiveRun>) -> MutexGuard<'_, ActiveRun> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the static analysis of a project, one run at a time.
///
/// The run itself happens on a tokio task, so [`AnalysisTask::start`] returns
/// right away and must be called from within a tokio runtime. Output lines go
/// to the presenter while the run is active; its result is presented once the
/// process exits. Cancelled runs present nothing.
pub struct AnalysisTask {
    exec: Arc<dyn ExecutionProvider>,
    presenter: Arc<dyn ResultPresenter>,
    os_family: OsFamily,
    running: Arc<AtomicBool>,
    active: Arc<Mutex<ActiveRun>>,
}

impl AnalysisTask {
    pub fn new(exec: Arc<dyn ExecutionProvider>, presenter: Arc<dyn ResultPresenter>) -> Self {
        Self {
            exec,
            presenter,
            os_family: OsFamily::current(),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(ActiveRun::default())),
        }
    }

    pub fn with_os_family(mut self, os_family: OsFamily) -> Self {
        self.os_family = os_family;
        self
    }

    /// Safe to poll from any thread, e.g. to disable a trigger while a run is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TaskState {
        lock(&self.active).state
    }

    pub fn start(&self, project_root: &Path) -> Result<RunHandle, TaskError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(target: "user", "Static analysis is already running, ignoring the new request");
            return Err(TaskError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        {
            let mut active = lock(&self.active);
            active.state = TaskState::Running;
            active.cancel = Some(cancel.clone());
        }

        debug!("Using the {} command line", self.os_family);
        let mut opts = CaptureOpts::new(project_root, analysis_command(self.os_family));
        opts.progress = Arc::new(PresenterProgress(self.presenter.clone()));
        opts.cancel = cancel.clone();

        let run = Run {
            exec: self.exec.clone(),
            presenter: self.presenter.clone(),
            cancel,
            guard: RunGuard {
                active: self.active.clone(),
                running: self.running.clone(),
            },
        };

        Ok(RunHandle {
            join: tokio::spawn(run.execute(opts)),
        })
    }

    /// Requests termination of the active run. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let active = lock(&self.active);
        match (active.state, &active.cancel) {
            (TaskState::Running, Some(token)) => {
                info!(target: "user", "Cancelling static analysis");
                token.cancel();
                true
            }
            _ => {
                debug!("Nothing to cancel, task is {}", active.state);
                false
            }
        }
    }
}

/// Waits for the end of a run started by [`AnalysisTask::start`].
pub struct RunHandle {
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub async fn wait(self) -> RunOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed(AnalysisResult::transport_error(format!(
                "Exception: {}",
                e
            ))),
        }
    }
}

/// Clears the running flag once the run is over, whichever way it ended.
struct RunGuard {
    active: Arc<Mutex<ActiveRun>>,
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        {
            let mut active = lock(&self.active);
            if !active.state.is_terminal() {
                active.state = TaskState::Failed;
            }
            active.cancel = None;
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

struct Run {
    exec: Arc<dyn ExecutionProvider>,
    presenter: Arc<dyn ResultPresenter>,
    cancel: CancellationToken,
    guard: RunGuard,
}

impl Run {
    async fn execute(self, opts: CaptureOpts) -> RunOutcome {
        info!(target: "user", "Running `{}` in {}", opts.command(), opts.working_dir.display());

        let outcome = match self.exec.run_command(opts).await {
            Ok(capture) if capture.is_cancelled() || self.cancel.is_cancelled() => {
                RunOutcome::Cancelled
            }
            Ok(capture) => {
                debug!("Process exited with {:?}", capture.exit_code);
                RunOutcome::Completed(classify(&capture.generate_user_output()))
            }
            Err(_) if self.cancel.is_cancelled() => RunOutcome::Cancelled,
            Err(e) => {
                warn!("Unable to run static analysis: {:?}", e);
                RunOutcome::Failed(AnalysisResult::transport_error(format!(
                    "Exception: {}",
                    e
                )))
            }
        };

        // cancel() only acts on a running state, so once the final state is
        // stored here a late cancel can no longer suppress the result.
        let outcome = {
            let mut active = lock(&self.guard.active);
            let outcome = if self.cancel.is_cancelled() {
                RunOutcome::Cancelled
            } else {
                outcome
            };
            active.state = outcome.state();
            outcome
        };

        match outcome.result() {
            Some(result) => self.presenter.present(result),
            None => info!(target: "user", "Static analysis was cancelled"),
        }

        outcome
    }
}
