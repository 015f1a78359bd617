//! Run a target's pipeline.

use std::sync::Arc;

use anyhow::Result;
use lathe_pipeline::{AssetTasks, Step, StepExecutor, Target, TaskError};
use lathe_server::{DevServer, DevServerConfig};

use crate::config::Settings;

/// Executes asset tasks on the blocking pool and serve steps on the dev server.
struct CliExecutor {
    tasks: Arc<AssetTasks>,
    server: DevServerConfig,
}

impl StepExecutor for CliExecutor {
    async fn execute(&self, step: &Step) -> Result<(), TaskError> {
        match step {
            Step::Run(task) => {
                let outcome = self.tasks.run_blocking(*task).await?;
                tracing::debug!(
                    "'{}' processed {} files, wrote {}",
                    task,
                    outcome.files_read,
                    outcome.files_written
                );
                Ok(())
            }
            Step::Serve(selection) => {
                let config = DevServerConfig {
                    browser: *selection,
                    ..self.server.clone()
                };
                DevServer::new(config, Arc::clone(&self.tasks))
                    .start()
                    .await
                    .map_err(|e| TaskError::Serve(e.to_string()))
            }
        }
    }
}

/// Run the pipeline for `target`.
pub async fn run(target: Target, settings: Settings) -> Result<()> {
    let Some(pipeline) = target.pipeline() else {
        anyhow::bail!("'{}' has no steps to run", target);
    };

    tracing::debug!(
        "Using {} layout in {}",
        settings.layout.variant,
        settings.layout.project_dir.display()
    );

    let executor = CliExecutor {
        tasks: Arc::new(AssetTasks::new(settings.layout, settings.js_target)),
        server: settings.server,
    };

    let report = pipeline.run(&executor).await?;

    if !report.advisories.is_empty() {
        tracing::warn!(
            "'{}' finished with {} tolerated failures",
            pipeline.name(),
            report.advisories.len()
        );
        for advisory in &report.advisories {
            tracing::warn!("  {}: {}", advisory.step, advisory.message);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_pipeline::{Layout, LayoutVariant};
    use std::fs;
    use tempfile::tempdir;

    fn settings(root: &std::path::Path) -> Settings {
        Settings {
            layout: Layout::new(LayoutVariant::Root, root),
            server: DevServerConfig::default(),
            js_target: "es2018".to_string(),
        }
    }

    #[tokio::test]
    async fn build_writes_every_output() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(
            root.join("index.html"),
            "<!DOCTYPE html>\n<html lang=\"en\">\n<title>Home</title>\n<p>Hello   there</p>\n</html>\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("sass")).unwrap();
        fs::write(root.join("sass/style.scss"), ".a { .b { color: blue; } }").unwrap();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::write(root.join("js/app.js"), "const greeting = name ?? 'world';\n").unwrap();

        run(Target::Build, settings(root)).await.unwrap();

        let html = fs::read_to_string(root.join("compressedHTML/html/index.html")).unwrap();
        assert!(html.contains("<p>Hello there</p>"));
        let css = fs::read_to_string(root.join("css/style.css")).unwrap();
        assert!(css.contains(".a .b{color:"));
        let js = fs::read_to_string(root.join("js/app.js")).unwrap();
        assert!(!js.contains("??"));
    }

    #[tokio::test]
    async fn build_tolerates_broken_scss() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sass")).unwrap();
        fs::write(root.join("sass/style.scss"), ".a { color: $nope; }").unwrap();

        run(Target::Build, settings(root)).await.unwrap();
    }

    #[tokio::test]
    async fn build_stops_on_broken_script() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::write(root.join("js/app.js"), "function (").unwrap();

        assert!(run(Target::Build, settings(root)).await.is_err());
    }

    #[tokio::test]
    async fn default_target_has_no_pipeline() {
        let temp = tempdir().unwrap();
        assert!(run(Target::Default, settings(temp.path())).await.is_err());
    }
}
