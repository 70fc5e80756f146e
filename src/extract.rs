//! PDF text extraction through an external tool (poppler's `pdftotext`).
//!
//! The document is written to a named temp file that lives exactly as long
//! as one `extract` call. The tool runs under a deadline; on timeout the
//! child is killed when its handle drops and the temp file is removed with
//! it, so neither outlives the call.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExtractError, FailureKind};

pub const DEFAULT_PROGRAM: &str = "pdftotext";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Replaced by the temp file path in the argument list.
pub const INPUT_PLACEHOLDER: &str = "{input}";

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &[u8]) -> Result<String, ExtractError>;
}

/// Runs `pdftotext -raw <file> -` (or a configured stand-in) and reads stdout.
#[derive(Debug, Clone)]
pub struct PdfToText {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, DEFAULT_TIMEOUT)
    }
}

impl PdfToText {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: vec!["-raw".into(), INPUT_PLACEHOLDER.into(), "-".into()],
            timeout,
        }
    }

    /// Override the argument list. Use [`INPUT_PLACEHOLDER`] for the input file.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    async fn extract(&self, document: &[u8]) -> Result<String, ExtractError> {
        let mut input = tempfile::Builder::new()
            .prefix("asx_pdf_")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ExtractError::other(format!("failed to create temporary file: {e}")))?;
        input
            .write_all(document)
            .and_then(|_| input.flush())
            .map_err(|e| ExtractError::other(format!("failed to write PDF bytes to temp file: {e}")))?;

        let input_path = input.path().to_string_lossy().into_owned();
        let args = self
            .args
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, &input_path));

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractError::Failed {
                    kind: FailureKind::NotInstalled,
                    detail: format!(
                        "{} binary not found; ensure poppler-utils is installed",
                        self.program.display()
                    ),
                },
                _ => ExtractError::other(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                )),
            })?;

        debug!(file = %input_path, "running text extractor");
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExtractError::other(format!("waiting on extractor: {e}"))),
            Err(_) => return Err(ExtractError::TimedOut(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::other(format!(
                "{} failed: {}. Stderr: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}
