use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use cyder_tools::log::{info, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::BaseError;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard command `{0}` could not be started: {1}")]
    Spawn(String, std::io::Error),
    #[error("clipboard command `{0}` exited with {1}")]
    Status(String, std::process::ExitStatus),
    #[error("clipboard I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClipboardError> for BaseError {
    fn from(err: ClipboardError) -> Self {
        BaseError::InternalServerError(Some(err.to_string()))
    }
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Pipes text into a clipboard program such as `wl-copy` or `pbcopy`.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| ClipboardError::Spawn(self.program.clone(), e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(ClipboardError::Status(self.program.clone(), status));
        }
        Ok(())
    }
}

/// Second-chance copy: the text is staged in a temporary file that is handed
/// to the program as stdin. The file is removed whether or not the copy works.
#[derive(Debug, Clone)]
pub struct StagingClipboard {
    command: CommandClipboard,
    staging_dir: PathBuf,
}

impl StagingClipboard {
    pub fn new(command: CommandClipboard, staging_dir: PathBuf) -> Self {
        Self { command, staging_dir }
    }
}

#[async_trait]
impl Clipboard for StagingClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut staged = tempfile::Builder::new()
            .prefix("clipboard-")
            .tempfile_in(&self.staging_dir)?;
        staged.write_all(text.as_bytes())?;
        staged.flush()?;
        let stdin = staged.reopen()?;

        let status = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| ClipboardError::Spawn(self.command.program.clone(), e));
        // Dropping `staged` deletes the file.
        drop(staged);

        let status = status?;
        if !status.success() {
            return Err(ClipboardError::Status(self.command.program.clone(), status));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Primary,
    Fallback,
}

pub async fn copy_text(
    primary: &dyn Clipboard,
    fallback: &dyn Clipboard,
    text: &str,
) -> Result<CopyOutcome, BaseError> {
    match primary.write_text(text).await {
        Ok(()) => Ok(CopyOutcome::Primary),
        Err(e) => {
            warn!("clipboard copy failed, using fallback: {}", e);
            fallback.write_text(text).await?;
            info!("copied {} chars via fallback clipboard", text.chars().count());
            Ok(CopyOutcome::Fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Rejecting;

    #[async_trait]
    impl Clipboard for Rejecting {
        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Io(std::io::Error::other("permission denied")))
        }
    }

    #[tokio::test]
    async fn test_fallback_reports_success_and_leaves_no_file() {
        let staging = tempdir().unwrap();
        let sink = tempdir().unwrap();
        let out = sink.path().join("copied.txt");
        let fallback = StagingClipboard::new(
            CommandClipboard::new("sh", &["-c", &format!("cat > '{}'", out.display())]),
            staging.path().to_path_buf(),
        );

        let outcome = copy_text(&Rejecting, &fallback, "a cinematic portrait").await.unwrap();
        assert_eq!(outcome, CopyOutcome::Fallback);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a cinematic portrait");
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_staging_file_removed_when_fallback_fails() {
        let staging = tempdir().unwrap();
        let fallback = StagingClipboard::new(
            CommandClipboard::new("sh", &["-c", "exit 3"]),
            staging.path().to_path_buf(),
        );
        assert!(copy_text(&Rejecting, &fallback, "x").await.is_err());
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_primary_used_when_it_works() {
        let staging = tempdir().unwrap();
        let primary = CommandClipboard::new("sh", &["-c", "cat > /dev/null"]);
        let fallback = StagingClipboard::new(primary.clone(), staging.path().to_path_buf());
        assert_eq!(copy_text(&primary, &fallback, "x").await.unwrap(), CopyOutcome::Primary);
    }
}
