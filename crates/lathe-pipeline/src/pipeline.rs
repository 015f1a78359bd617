//! Sequential pipelines with a per-step failure policy.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use crate::browser::BrowserSelection;
use crate::task::{TaskError, TaskName};

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Stop the pipeline and report the error
    Fatal,

    /// Log the error and continue with the next step
    Advisory,
}

/// One unit of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run an asset task
    Run(TaskName),

    /// Start the dev server and open the selected browser(s)
    Serve(BrowserSelection),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Run(task) => task.name(),
            Step::Serve(_) => "serve",
        }
    }

    pub fn policy(&self) -> StepPolicy {
        match self {
            Step::Run(task) => task.policy(),
            Step::Serve(_) => StepPolicy::Fatal,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Run(task) => write!(f, "{}", task),
            Step::Serve(BrowserSelection::Default) => f.write_str("serve"),
            Step::Serve(selection) => write!(f, "serve({})", selection),
        }
    }
}

/// Executes individual steps on behalf of a [`Pipeline`].
pub trait StepExecutor {
    fn execute(&self, step: &Step) -> impl Future<Output = Result<(), TaskError>> + Send;
}

/// A step whose failure was tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub step: Step,
    pub message: String,
}

/// Summary of a completed pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Steps executed, in order
    pub executed: Vec<Step>,

    /// Advisory steps that failed
    pub advisories: Vec<Advisory>,

    /// Total run time in milliseconds
    pub duration_ms: u64,
}

/// Errors that stop a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: TaskError,
    },
}

/// A named, ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    name: String,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order, each awaited before the next starts.
    pub async fn run<E: StepExecutor>(&self, executor: &E) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut report = RunReport::default();

        tracing::info!("Starting '{}'", self.name);

        for step in &self.steps {
            let step_start = Instant::now();
            tracing::info!("Starting '{}'...", step);

            let result = executor.execute(step).await;
            report.executed.push(step.clone());

            match (result, step.policy()) {
                (Ok(()), _) => {
                    tracing::info!(
                        "Finished '{}' after {}ms",
                        step,
                        step_start.elapsed().as_millis()
                    );
                }
                (Err(e), StepPolicy::Advisory) => {
                    tracing::warn!("'{}' reported an error, continuing: {}", step, e);
                    report.advisories.push(Advisory {
                        step: step.clone(),
                        message: e.to_string(),
                    });
                }
                (Err(e), StepPolicy::Fatal) => {
                    tracing::error!("'{}' failed: {}", step, e);
                    return Err(PipelineError::StepFailed {
                        step: step.to_string(),
                        source: e,
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!("Finished '{}' after {}ms", self.name, report.duration_ms);

        Ok(report)
    }
}
