//! External extraction programs
//!
//! The program is started with the page URL as its only argument and the
//! page HTML on stdin. It must print one JSON object on stdout and exit with
//! status 0.

use crate::extract::{ExtractError, ExtractResult, MetadataRecord};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// How long an extraction program may run
pub const PROGRAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the extraction program at `path` against one page
pub async fn run_extraction_program(
    path: &Path,
    url: &str,
    html: &str,
    timeout: Duration,
) -> ExtractResult<MetadataRecord> {
    let mut child = Command::new(path)
        .arg(url)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take();
    let write_input = async move {
        if let Some(mut stdin) = stdin {
            // A program that ignores its input may close stdin early
            if let Err(e) = stdin.write_all(html.as_bytes()).await {
                tracing::debug!(error = %e, "Extraction program closed stdin");
            }
        }
    };

    let (_, output) = tokio::time::timeout(timeout, async {
        tokio::join!(write_input, child.wait_with_output())
    })
    .await
    .map_err(|_| ExtractError::ProgramTimeout(timeout))?;
    let output = output?;

    if !output.status.success() {
        return Err(ExtractError::ProgramFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    match serde_json::from_slice::<serde_json::Value>(&output.stdout)? {
        serde_json::Value::Object(object) => Ok(MetadataRecord::from_json_object(object)),
        _ => Err(ExtractError::NotAnObject),
    }
}
