use crate::analyze::AnalysisResult;
use crate::shared::prelude::{ProgressSink, spinner_style};
use colored::Colorize;
use mockall::automock;
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Span, error, info, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use url::Url;

pub const NOTIFICATION_TITLE: &str = "Static Analysis";

/// Receives what a run produces: every output line while it runs, then at
/// most one result.
#[automock]
pub trait ResultPresenter: Send + Sync {
    fn show_progress(&self, line: &str);
    fn present(&self, result: &AnalysisResult);
}

/// Forwards output lines of a running process to a presenter.
pub struct PresenterProgress(pub Arc<dyn ResultPresenter>);

impl ProgressSink for PresenterProgress {
    fn on_line(&self, line: &str) {
        self.0.show_progress(line)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<Url>,
    /// Point the user at the full log of the run.
    pub show_log: bool,
    pub request_attention: bool,
}

impl Notification {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let base = Notification {
            title: NOTIFICATION_TITLE,
            kind: NotificationKind::Error,
            message: String::new(),
            link: None,
            show_log: false,
            request_attention: false,
        };

        match result {
            AnalysisResult::Passed => Notification {
                kind: NotificationKind::Info,
                message: "Overall: PASSED!".to_string(),
                request_attention: true,
                ..base
            },
            AnalysisResult::FailedWithCount {
                descriptor,
                report_location,
            } => Notification {
                message: format!("Analysis failed: {}", descriptor),
                link: report_location.clone(),
                show_log: report_location.is_none(),
                ..base
            },
            AnalysisResult::Undetermined { reason } => Notification {
                message: format!("{}. Try to run it manually.", reason),
                ..base
            },
            AnalysisResult::TransportError { message } => Notification {
                message: message.clone(),
                ..base
            },
        }
    }
}

/// Renders results on the terminal. Only the latest notification is kept.
pub struct ConsolePresenter {
    span: Span,
    log_location: Option<String>,
    latest: Mutex<Option<Notification>>,
}

impl ConsolePresenter {
    pub fn new(log_location: Option<String>) -> Self {
        let span = info_span!("static analysis", "indicatif.pb_show" = true);
        span.pb_set_style(&spinner_style());
        span.pb_set_message("Running static analysis");

        Self {
            span,
            log_location,
            latest: Mutex::new(None),
        }
    }

    /// The progress spinner is shown while this span is entered.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn latest(&self) -> Option<Notification> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn render(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Info => {
                info!(target: "always", "{}: {}", notification.title.bold(), notification.message.green())
            }
            NotificationKind::Error => {
                error!(target: "always", "{}: {}", notification.title.bold(), notification.message.red())
            }
        }

        if let Some(link) = &notification.link {
            info!(target: "always", "Full report: {}", link);
        }

        if notification.show_log {
            if let Some(location) = &self.log_location {
                info!(target: "always", "Analysis output was logged to {}", location);
            }
        }

        if notification.request_attention && std::io::stdout().is_terminal() {
            let mut stdout = std::io::stdout();
            write!(stdout, "\x07").and_then(|_| stdout.flush()).ok();
        }
    }
}

impl ResultPresenter for ConsolePresenter {
    fn show_progress(&self, line: &str) {
        self.span.pb_set_message(line);
        info!(target: "progress", "{}", line);
    }

    fn present(&self, result: &AnalysisResult) {
        let notification = Notification::from_result(result);
        self.render(&notification);

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(notification);
    }
}
