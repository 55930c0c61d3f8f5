use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use mockall::automock;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use which::which_in;

/// Which pipe of the child a line was read from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputStream {
    StandardOut,
    StandardErr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub time: DateTime<Utc>,
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// The process closed its output and exited on its own.
    #[default]
    Completed,
    /// The run was cancelled, the output only holds what arrived before that.
    Cancelled,
}

#[derive(Clone, Default, Builder, Debug)]
#[builder(setter(into))]
pub struct OutputCapture {
    #[builder(default)]
    pub working_dir: PathBuf,
    #[builder(default)]
    lines: Vec<CapturedLine>,
    #[builder(default)]
    pub exit_code: Option<i32>,
    #[builder(default)]
    pub status: CaptureStatus,
    #[builder(default)]
    pub start_time: DateTime<Utc>,
    #[builder(default)]
    pub end_time: DateTime<Utc>,
    #[builder(default)]
    pub command: String,
}

impl OutputCapture {
    #[instrument(skip_all)]
    pub async fn capture_output(opts: CaptureOpts) -> Result<Self, CaptureError> {
        let process = RunningProcess::start(&opts)?;
        process
            .stream_lines(opts.progress.as_ref(), &opts.cancel)
            .await
    }

    pub fn lines(&self) -> &[CapturedLine] {
        &self.lines
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == CaptureStatus::Cancelled
    }

    /// Merged output in arrival order, every line terminated by `\n`.
    pub fn generate_user_output(&self) -> String {
        let mut output = String::new();
        for line in &self.lines {
            output.push_str(&line.text);
            output.push('\n');
        }
        output
    }
}

/// Receives every output line of a running command, in arrival order.
pub trait ProgressSink: Send + Sync {
    fn on_line(&self, line: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_line(&self, line: &str) {
        self(line)
    }
}

#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_line(&self, _line: &str) {}
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unable to read process output. {error}")]
    IoError {
        #[from]
        error: std::io::Error,
    },
    #[error("{name} was not executable or it did not exist.")]
    MissingExec { name: String },
    #[error("The {name} pipe of the process was not available.")]
    MissingPipe { name: &'static str },
}

#[automock]
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    async fn run_command(&self, opts: CaptureOpts) -> Result<OutputCapture, CaptureError>;
}

#[derive(Default, Debug)]
pub struct DefaultExecutionProvider {}

#[async_trait]
impl ExecutionProvider for DefaultExecutionProvider {
    async fn run_command(&self, opts: CaptureOpts) -> Result<OutputCapture, CaptureError> {
        OutputCapture::capture_output(opts).await
    }
}

pub struct CaptureOpts {
    pub working_dir: PathBuf,
    /// Added on top of the inherited environment.
    pub env_vars: BTreeMap<String, String>,
    /// Search path used to resolve the executable.
    pub path: String,
    pub args: Vec<String>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl CaptureOpts {
    pub fn new(working_dir: &Path, args: Vec<String>) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            env_vars: BTreeMap::new(),
            path: std::env::var("PATH").unwrap_or_default(),
            args,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn command(&self) -> String {
        self.args.join(" ")
    }
}

type LineEvent = Result<(OutputStream, String), std::io::Error>;

struct StreamCapture<R: io::AsyncRead + Unpin> {
    reader: R,
    stream: OutputStream,
    sender: mpsc::UnboundedSender<LineEvent>,
}

impl<R: io::AsyncRead + Unpin> StreamCapture<R> {
    async fn forward_lines(self) {
        let mut reader = BufReader::new(self.reader);
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            let event = match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => return,
                Ok(_) => Ok((self.stream, strip_line_terminator(&buffer))),
                Err(e) => Err(e),
            };
            let failed = event.is_err();

            // receiver is gone once the run was cancelled
            if self.sender.send(event).is_err() || failed {
                return;
            }
        }
    }
}

fn strip_line_terminator(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).to_string()
}

/// A spawned command whose stdout and stderr are read as one stream.
pub struct RunningProcess {
    child: Child,
    receiver: mpsc::UnboundedReceiver<LineEvent>,
    readers: Vec<JoinHandle<()>>,
    working_dir: PathBuf,
    command: String,
    start_time: DateTime<Utc>,
}

impl RunningProcess {
    pub fn start(opts: &CaptureOpts) -> Result<Self, CaptureError> {
        let program = resolve_program(opts)?;
        let args = opts.args.iter().skip(1);

        debug!("Executing {} {:?}", program.display(), opts.args);

        let start_time = Utc::now();
        let mut child = tokio::process::Command::new(&program)
            .args(args)
            .envs(&opts.env_vars)
            .current_dir(&opts.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or(CaptureError::MissingPipe { name: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(CaptureError::MissingPipe { name: "stderr" })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let readers = vec![
            tokio::spawn(
                StreamCapture {
                    reader: stdout,
                    stream: OutputStream::StandardOut,
                    sender: sender.clone(),
                }
                .forward_lines(),
            ),
            tokio::spawn(
                StreamCapture {
                    reader: stderr,
                    stream: OutputStream::StandardErr,
                    sender,
                }
                .forward_lines(),
            ),
        ];

        Ok(Self {
            child,
            receiver,
            readers,
            working_dir: opts.working_dir.clone(),
            command: opts.command(),
            start_time,
        })
    }

    /// Reads lines until the process closes its output or `cancel` fires.
    ///
    /// Every line goes to `progress` before it is recorded. On cancellation the
    /// process is killed and the lines read so far are returned, tagged as
    /// [`CaptureStatus::Cancelled`].
    pub async fn stream_lines(
        mut self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<OutputCapture, CaptureError> {
        let mut lines = Vec::new();
        let mut status = CaptureStatus::Completed;

        loop {
            if cancel.is_cancelled() {
                status = CaptureStatus::Cancelled;
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    status = CaptureStatus::Cancelled;
                    break;
                }
                event = self.receiver.recv() => match event {
                    Some(Ok((stream, text))) => {
                        progress.on_line(&text);
                        lines.push(CapturedLine {
                            time: Utc::now(),
                            stream,
                            text,
                        });
                    }
                    Some(Err(e)) => {
                        self.terminate().await;
                        return Err(e.into());
                    }
                    None => break,
                },
            }
        }

        let exit_code = match status {
            CaptureStatus::Cancelled => {
                debug!("Run cancelled, terminating {}", self.command);
                self.terminate().await
            }
            CaptureStatus::Completed => {
                // output is closed, but the process may keep running without it
                let exited = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    exit = self.child.wait() => Some(exit?),
                };
                match exited {
                    Some(exit) => exit.code(),
                    None => {
                        debug!("Run cancelled after output closed, terminating {}", self.command);
                        status = CaptureStatus::Cancelled;
                        self.terminate().await
                    }
                }
            }
        };
        let end_time = Utc::now();
        debug!(
            "{} finished with {:?} after {}",
            self.command,
            exit_code,
            end_time - self.start_time
        );

        Ok(OutputCapture {
            working_dir: self.working_dir,
            lines,
            exit_code,
            status,
            start_time: self.start_time,
            end_time,
            command: self.command,
        })
    }

    async fn terminate(&mut self) -> Option<i32> {
        for reader in &self.readers {
            reader.abort();
        }

        if let Err(e) = self.child.start_kill() {
            debug!("Unable to kill process, it likely exited already. {:?}", e);
        }

        match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Unable to reap process {}. {:?}", self.command, e);
                None
            }
        }
    }
}

fn resolve_program(opts: &CaptureOpts) -> Result<PathBuf, CaptureError> {
    let command = opts.command();
    let program = match opts.args.first() {
        None => return Err(CaptureError::MissingExec { name: command }),
        Some(program) => program,
    };

    match which_in(program, Some(OsString::from(&opts.path)), &opts.working_dir) {
        Ok(path) => Ok(path),
        Err(e) => {
            debug!("Unable to find binary {:?}", e);
            Err(CaptureError::MissingExec {
                name: program.to_string(),
            })
        }
    }
}
