use super::classify::classify;
use super::error::AnalyzeError;
use super::status::AnalysisResult;
use crate::shared::prelude::{DefaultExecutionProvider, FoundConfig};
use crate::task::{AnalysisTask, ConsolePresenter, ResultPresenter};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{Instrument, debug, warn};

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Also print the result as a JSON object on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Location of previously captured analysis output, for stdin use '-'
    location: String,

    /// Also print the result as a JSON object on stdout
    #[arg(long)]
    json: bool,
}

/// Runs the analysis task of the project and waits for its verdict. Ctrl-C cancels the run.
pub async fn analyze_root(
    found_config: &FoundConfig,
    args: &AnalyzeArgs,
    log_location: &str,
) -> Result<i32> {
    let presenter = Arc::new(ConsolePresenter::new(Some(log_location.to_string())));
    let task = Arc::new(AnalysisTask::new(
        Arc::new(DefaultExecutionProvider::default()),
        presenter.clone(),
    ));

    let handle = task.start(&found_config.working_dir)?;

    let cancel_task = task.clone();
    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                cancel_task.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {:?}", e),
        }
    });

    let outcome = handle.wait().instrument(presenter.span().clone()).await;
    interrupt.abort();

    if args.json {
        if let Some(result) = outcome.result() {
            print_json(result)?;
        }
    }

    Ok(outcome.to_exit_code())
}

/// Classifies output that was captured earlier, without running anything.
pub async fn classify_root(found_config: &FoundConfig, args: &ClassifyArgs) -> Result<i32> {
    let output = match args.location.as_str() {
        "-" => read_output(tokio::io::stdin()).await?,
        location => {
            let file_path = found_config.working_dir.join(location);
            read_output(open_file(&file_path).await?).await?
        }
    };

    let result = classify(&output);
    ConsolePresenter::new(None).present(&result);

    if args.json {
        print_json(&result)?;
    }

    Ok(result.to_exit_code())
}

fn print_json(result: &AnalysisResult) -> Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}

async fn open_file(file_path: &Path) -> Result<tokio::fs::File, AnalyzeError> {
    if !file_path.exists() {
        return Err(AnalyzeError::FileNotFound {
            file_name: file_path.display().to_string(),
        });
    }
    Ok(tokio::fs::File::open(file_path).await?)
}

/// Reads everything and normalizes it the way live output is recorded, one
/// `\n` after every line.
async fn read_output<R>(mut reader: R) -> Result<String, AnalyzeError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).await?;
    debug!("Read {} bytes of analysis output", raw.len());

    let text = String::from_utf8_lossy(&raw);
    let mut output = String::with_capacity(text.len() + 1);
    for line in text.lines() {
        output.push_str(line);
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_read_output_normalizes_terminators() {
        let output = read_output(Cursor::new(b"one\r\ntwo\nthree".to_vec()))
            .await
            .unwrap();

        assert_eq!("one\ntwo\nthree\n", output);
    }

    #[tokio::test]
    async fn test_read_output_of_empty_input() {
        let output = read_output(Cursor::new(Vec::new())).await.unwrap();

        assert_eq!("", output);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();

        let result = open_file(&dir.path().join("missing.log")).await;

        assert!(matches!(result, Err(AnalyzeError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_classify_saved_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("analysis.log"),
            "> Task :staticAnalys\r\nOverall: FAILED (12 issues)\r\n",
        )
        .unwrap();
        let found_config = FoundConfig {
            working_dir: dir.path().to_path_buf(),
        };
        let args = ClassifyArgs {
            location: "analysis.log".to_string(),
            json: false,
        };

        let exit_code = classify_root(&found_config, &args).await.unwrap();

        assert_eq!(1, exit_code);
    }
}
