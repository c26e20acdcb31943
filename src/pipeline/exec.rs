//! Run a [`ToolCommand`] to completion and capture its output.

use super::command::ToolCommand;
use crate::config::ExternalTool;
use crate::error::Pdf2ImgError;
use std::process::Stdio;
use tracing::debug;

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Spawn the command, wait for it, and map failures.
///
/// `failure_msg` names the operation ("Failed to get markers") and leads the
/// resulting [`Pdf2ImgError::ToolFailed`] message.
pub async fn run(cmd: &ToolCommand, failure_msg: &str) -> Result<ToolOutput, Pdf2ImgError> {
    let shown = cmd.display();
    debug!("exec: {}", shown);

    let output = cmd
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| spawn_error(cmd, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(Pdf2ImgError::ToolFailed {
            message: failure_msg.to_string(),
            command: shown,
            status: output.status.code(),
            stdout,
            stderr: stderr.trim_end().to_string(),
        });
    }

    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", cmd.program.display(), stderr.trim_end());
    }
    Ok(ToolOutput { stdout, stderr })
}

fn spawn_error(cmd: &ToolCommand, e: std::io::Error) -> Pdf2ImgError {
    let program = cmd.program.display().to_string();
    if e.kind() == std::io::ErrorKind::NotFound {
        let hint = ExternalTool::custom(cmd.program.clone(), Vec::<String>::new())
            .install_hint()
            .to_string();
        Pdf2ImgError::ToolNotFound { program, hint }
    } else {
        Pdf2ImgError::Internal(format!("Failed to spawn '{program}': {e}"))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new(&ExternalTool::custom("sh", ["-c", script]))
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run(&sh("echo '5 10 120'"), "Failed to get markers")
            .await
            .unwrap();
        assert_eq!(out.stdout, "5 10 120\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_tool_failed() {
        let err = run(&sh("echo broken >&2; exit 3"), "Failed to run command")
            .await
            .unwrap_err();
        match err {
            Pdf2ImgError::ToolFailed {
                message,
                command,
                status,
                stderr,
                ..
            } => {
                assert_eq!(message, "Failed to run command");
                assert_eq!(command, r#"sh -c "echo broken >&2; exit 3""#);
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_tool_not_found() {
        let tool = ExternalTool::custom("/nonexistent/bin/convert", Vec::<String>::new());
        let err = run(&ToolCommand::new(&tool), "Failed to convert page to image")
            .await
            .unwrap_err();
        match err {
            Pdf2ImgError::ToolNotFound { program, hint } => {
                assert!(program.ends_with("convert"));
                assert!(hint.contains("ImageMagick"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
