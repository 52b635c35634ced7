use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::documents::CvDocument;
use crate::error::AppError;

/// Black-box PDF codec. The pipeline only needs "structured CV in, file
/// path out"; the rendering engine stays outside the core.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(
        &self,
        application_id: i64,
        cv: &CvDocument,
        profile: &str,
    ) -> Result<PathBuf, AppError>;
}

/// Renders by piping the adapted CV JSON into an external command:
/// `<cmd> <profile> <output_path>`. The child process does the CPU-bound
/// work, so the cooperative scheduler never blocks on layout.
pub struct CommandRenderer {
    command: String,
    artifacts_dir: PathBuf,
}

impl CommandRenderer {
    pub fn new(command: &str, artifacts_dir: &Path) -> Self {
        Self {
            command: command.to_string(),
            artifacts_dir: artifacts_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl PdfRenderer for CommandRenderer {
    async fn render(
        &self,
        application_id: i64,
        cv: &CvDocument,
        profile: &str,
    ) -> Result<PathBuf, AppError> {
        let out_dir = self.artifacts_dir.join(application_id.to_string());
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| AppError::Internal(format!("cannot create artifacts dir: {e}")))?;
        let out_path = out_dir.join("cv.pdf");

        let payload = serde_json::to_vec(cv)
            .map_err(|e| AppError::Internal(format!("cannot serialize CV: {e}")))?;

        let mut child = tokio::process::Command::new(&self.command)
            .arg(profile)
            .arg(&out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Internal(format!("failed to spawn {}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| AppError::Internal(format!("renderer stdin write failed: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::Internal(format!("renderer did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Internal(format!(
                "renderer exited with {}: {stderr}",
                output.status
            )));
        }

        tracing::info!(application_id, path = %out_path.display(), "cv pdf rendered");
        Ok(out_path)
    }
}
