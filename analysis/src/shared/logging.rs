use anyhow::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use indicatif::ProgressStyle;
use std::fs::File;
use std::io::IsTerminal;
use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::filter::{IndicatifFilter, hide_indicatif_span_fields};
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::{Registry, fmt::format::Format, layer::SubscriberExt};
use tracing_subscriber::{filter::filter_fn, prelude::*};

pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{span_child_prefix} {spinner:.green} {wide_msg} [{elapsed_precise}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("logging"))]
pub struct LoggingOpts {
    /// A level of verbosity, and can be used multiple times
    #[arg(short, long, action = clap::ArgAction::Count, global(true))]
    pub verbose: u8,

    #[arg(
        long,
        global(true),
        default_value = "auto",
        env = "GRADLE_ANALYSIS_OUTPUT_PROGRESS"
    )]
    /// Set the progress output. Use plain to disable the updating spinner.
    pub progress: LoggingProgress,

    #[arg(skip = LevelFilter::INFO)]
    default_level: LevelFilter,
}

#[derive(ValueEnum, Debug, Copy, Clone)]
pub enum LoggingProgress {
    /// Determine output format based on execution context
    Auto,
    /// Standard output, no spinner, every line of tool output is printed.
    Plain,
    /// Use a spinner showing the latest line of tool output
    Tty,
}

impl LoggingProgress {
    pub fn is_tty(&self) -> bool {
        match self {
            LoggingProgress::Auto => std::io::stdout().is_terminal(),
            LoggingProgress::Plain => false,
            LoggingProgress::Tty => true,
        }
    }
}

impl LoggingOpts {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => self.default_level,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn log_dir() -> PathBuf {
        std::env::temp_dir().join("gradle-analysis")
    }

    /// Installs the global subscriber. Returns the guard that flushes the log
    /// file and the location of that file.
    pub fn configure_logging(
        &self,
        run_id: &str,
        prefix: &str,
    ) -> Result<(tracing_appender::non_blocking::WorkerGuard, String)> {
        let log_dir = Self::log_dir();
        std::fs::create_dir_all(&log_dir)?;
        let file_path = log_dir.join(format!("gradle-analysis-{}-{}.log", prefix, run_id));

        let (non_blocking, guard) = tracing_appender::non_blocking(
            strip_ansi_escapes::Writer::new(File::create(&file_path)?),
        );

        let file_output = tracing_subscriber::fmt::layer()
            .event_format(Format::default().pretty())
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(LevelFilter::TRACE);

        let indicatif_layer = IndicatifLayer::new()
            .with_span_field_formatter(hide_indicatif_span_fields(DefaultFields::new()))
            .with_progress_style(spinner_style());
        let indicatif_writer = indicatif_layer.get_stdout_writer();

        let is_tty_output = self.progress.is_tty();

        let level_filter = self.to_level_filter();
        let console_output = tracing_subscriber::fmt::layer()
            .event_format(
                Format::default()
                    .with_target(false)
                    .without_time()
                    .compact(),
            )
            .with_writer(indicatif_writer)
            .with_filter(filter_fn(move |metadata| match metadata.target() {
                "user" => level_filter >= *metadata.level(),
                "always" => true,
                "progress" => !is_tty_output,
                _ => false,
            }));

        let progress_layer = if is_tty_output {
            Some(indicatif_layer.with_filter(IndicatifFilter::new(false)))
        } else {
            None
        };

        let subscriber = Registry::default()
            .with(console_output)
            .with(progress_layer)
            .with(file_output);

        tracing::subscriber::set_global_default(subscriber)?;

        Ok((guard, file_path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[clap(flatten)]
        logging: LoggingOpts,
    }

    #[test]
    fn test_verbosity_levels() {
        let opts = TestCli::parse_from(["test"]).logging;
        assert_eq!(LevelFilter::INFO, opts.to_level_filter());

        let opts = TestCli::parse_from(["test", "-v"]).logging;
        assert_eq!(LevelFilter::DEBUG, opts.to_level_filter());

        let opts = TestCli::parse_from(["test", "-vvv"]).logging;
        assert_eq!(LevelFilter::TRACE, opts.to_level_filter());
    }

    #[test]
    fn test_plain_progress_is_not_tty() {
        let opts = TestCli::parse_from(["test", "--progress", "plain"]).logging;
        assert!(!opts.progress.is_tty());

        let opts = TestCli::parse_from(["test", "--progress", "tty"]).logging;
        assert!(opts.progress.is_tty());
    }
}
