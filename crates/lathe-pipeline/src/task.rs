//! The asset tasks and the runner that executes them against a layout.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use lathe_assets::{
    collapse_whitespace, compile_scss, css_output_name, transpile, validate_html,
    write_if_changed, AssetError, CssStyle, JsOptions, SourceSet,
};

use crate::layout::Layout;
use crate::pipeline::StepPolicy;

/// A named asset task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskName {
    ValidateHtml,
    CompressHtml,
    CompileCssForDev,
    CompileCssForProd,
    TranspileJsForDev,
    TranspileJsForProd,
}

impl TaskName {
    /// Every task, in listing order.
    pub const ALL: [TaskName; 6] = [
        TaskName::ValidateHtml,
        TaskName::CompressHtml,
        TaskName::CompileCssForDev,
        TaskName::CompileCssForProd,
        TaskName::TranspileJsForDev,
        TaskName::TranspileJsForProd,
    ];

    /// Name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            TaskName::ValidateHtml => "validateHTML",
            TaskName::CompressHtml => "compressHTML",
            TaskName::CompileCssForDev => "compileCSSForDev",
            TaskName::CompileCssForProd => "compileCSSForProd",
            TaskName::TranspileJsForDev => "transpileJSForDev",
            TaskName::TranspileJsForProd => "transpileJSForProd",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            TaskName::ValidateHtml => "Check every HTML page and report problems",
            TaskName::CompressHtml => "Collapse whitespace in HTML pages",
            TaskName::CompileCssForDev => "Compile SCSS to expanded CSS",
            TaskName::CompileCssForProd => "Compile SCSS to compressed CSS",
            TaskName::TranspileJsForDev => "Transpile JavaScript",
            TaskName::TranspileJsForProd => "Transpile and minify JavaScript",
        }
    }

    /// Whether a failure of this task stops the pipeline.
    pub const fn policy(self) -> StepPolicy {
        match self {
            TaskName::ValidateHtml | TaskName::CompileCssForDev | TaskName::CompileCssForProd => {
                StepPolicy::Advisory
            }
            TaskName::CompressHtml | TaskName::TranspileJsForDev | TaskName::TranspileJsForProd => {
                StepPolicy::Fatal
            }
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("Unknown task '{}'", s))
    }
}

/// Errors a step can fail with.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Serve failed: {0}")]
    Serve(String),

    #[error("Task did not complete: {0}")]
    Interrupted(String),
}

/// What a task did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Source files processed
    pub files_read: usize,

    /// Output files whose contents changed
    pub files_written: usize,

    /// HTML problems reported
    pub issues: usize,
}

/// Runs asset tasks against a [`Layout`].
#[derive(Debug, Clone)]
pub struct AssetTasks {
    layout: Layout,
    js_target: String,
}

impl AssetTasks {
    /// Create a runner; `js_target` is the syntax level scripts are lowered to.
    pub fn new(layout: Layout, js_target: impl Into<String>) -> Self {
        Self {
            layout,
            js_target: js_target.into(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Run a task to completion on the current thread.
    pub fn run(&self, task: TaskName) -> Result<TaskOutcome, TaskError> {
        let start = Instant::now();
        tracing::debug!("Running {}", task);

        let layout = &self.layout;
        let outcome = match task {
            TaskName::ValidateHtml => self.validate_html()?,
            TaskName::CompressHtml => self.compress_html()?,
            TaskName::CompileCssForDev => compile_css(
                &layout.scss_entry,
                &layout.css_dev_dir,
                CssStyle::Expanded,
            )?,
            TaskName::CompileCssForProd => compile_css(
                &layout.scss_entry,
                &layout.css_prod_dir,
                CssStyle::Compressed,
            )?,
            TaskName::TranspileJsForDev => {
                self.transpile_js(&layout.js_dev, &layout.js_dev_dir, false)?
            }
            TaskName::TranspileJsForProd => {
                self.transpile_js(&layout.js_prod, &layout.js_prod_dir, true)?
            }
        };

        tracing::debug!(
            "{} read {} files, wrote {} in {}ms",
            task,
            outcome.files_read,
            outcome.files_written,
            start.elapsed().as_millis()
        );

        Ok(outcome)
    }

    /// Run a task on the blocking pool and wait for it.
    pub async fn run_blocking(self: &Arc<Self>, task: TaskName) -> Result<TaskOutcome, TaskError> {
        let tasks = Arc::clone(self);
        tokio::task::spawn_blocking(move || tasks.run(task))
            .await
            .map_err(|e| TaskError::Interrupted(e.to_string()))?
    }

    fn validate_html(&self) -> Result<TaskOutcome, TaskError> {
        let files = self.layout.html.files()?;
        let mut issues = 0;

        for path in &files {
            let source = match read_lossy(path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("{}", e);
                    issues += 1;
                    continue;
                }
            };
            if source.lossy {
                tracing::warn!("{}: File is not valid UTF-8", path.display());
                issues += 1;
            }
            for issue in validate_html(&source.text) {
                tracing::warn!("{}: {}", path.display(), issue);
                issues += 1;
            }
        }

        if issues == 0 {
            tracing::info!("{} HTML files passed validation", files.len());
        } else {
            tracing::warn!("{} HTML problems in {} files", issues, files.len());
        }

        Ok(TaskOutcome {
            files_read: files.len(),
            files_written: 0,
            issues,
        })
    }

    fn compress_html(&self) -> Result<TaskOutcome, TaskError> {
        let set = &self.layout.html;
        let files = set.files()?;
        let mut written = 0;

        for path in &files {
            let source = read_lossy(path)?;
            if source.lossy {
                tracing::warn!(
                    "{}: Not valid UTF-8, invalid bytes replaced",
                    path.display()
                );
            }
            let compressed = collapse_whitespace(&source.text);
            let out = self.layout.compressed_html_dir.join(set.relative(path));
            if write_if_changed(&out, compressed.as_bytes())? {
                written += 1;
            }
        }

        Ok(TaskOutcome {
            files_read: files.len(),
            files_written: written,
            issues: 0,
        })
    }

    fn transpile_js(
        &self,
        set: &SourceSet,
        out_dir: &Path,
        minify: bool,
    ) -> Result<TaskOutcome, TaskError> {
        let options = JsOptions {
            target: self.js_target.clone(),
            minify,
        };
        let files = set.files()?;

        let outputs: Vec<(PathBuf, String)> = files
            .par_iter()
            .map(|path| {
                let source = read(path)?;
                let code = transpile(path, &source, &options)?;
                Ok((out_dir.join(set.relative(path)), code))
            })
            .collect::<Result<_, AssetError>>()?;

        let mut written = 0;
        for (out, code) in &outputs {
            if write_if_changed(out, code.as_bytes())? {
                written += 1;
            }
        }

        Ok(TaskOutcome {
            files_read: files.len(),
            files_written: written,
            issues: 0,
        })
    }
}

fn compile_css(entry: &Path, out_dir: &Path, style: CssStyle) -> Result<TaskOutcome, TaskError> {
    let css = compile_scss(entry, style)?;
    let written = write_if_changed(&css_output_name(entry, out_dir), css.as_bytes())?;

    Ok(TaskOutcome {
        files_read: 1,
        files_written: usize::from(written),
        issues: 0,
    })
}

fn read(path: &Path) -> Result<String, AssetError> {
    fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// File contents decoded as UTF-8, invalid bytes replaced.
struct LossyText {
    text: String,
    lossy: bool,
}

fn read_lossy(path: &Path) -> Result<LossyText, AssetError> {
    let bytes = fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(match String::from_utf8(bytes) {
        Ok(text) => LossyText { text, lossy: false },
        Err(e) => LossyText {
            text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            lossy: true,
        },
    })
}
