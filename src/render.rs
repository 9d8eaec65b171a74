//! Markdown-to-document rendering.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::{AppError, Result};

/// Renders a markdown note to a deliverable file.
pub trait DocumentRenderer: Send + Sync {
    /// Render `markdown` into `output`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` when rendering fails or is unavailable.
    fn render<'a>(
        &'a self,
        markdown: &'a str,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Renderer used when no converter is configured; always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRenderer;

impl DocumentRenderer for DisabledRenderer {
    fn render<'a>(
        &'a self,
        _markdown: &'a str,
        _output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Err(AppError::Render("no document renderer configured".into())) })
    }
}

/// Renderer that runs `program [args...] <input.md> -o <output>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    /// Use `program` with extra leading `args`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    async fn run(&self, markdown: &str, output: &Path) -> Result<()> {
        let input_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let input = tempfile::Builder::new()
            .prefix("render-")
            .suffix(".md")
            .tempfile_in(input_dir)?;
        tokio::fs::write(input.path(), markdown).await?;

        debug!(program = %self.program.display(), output = %output.display(), "rendering document");
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(input.path())
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| AppError::Render(format!("failed to run renderer: {err}")))?;

        if !result.status.success() {
            return Err(AppError::Render(format!(
                "renderer exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(AppError::Render("renderer produced no output".into()));
        }
        Ok(())
    }
}

impl DocumentRenderer for CommandRenderer {
    fn render<'a>(
        &'a self,
        markdown: &'a str,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run(markdown, output))
    }
}
