//! Task orchestration for the lathe asset pipeline.
//!
//! A [`Target`] names what the user asked for and expands into a
//! [`Pipeline`]: an ordered list of [`Step`]s run one after another by a
//! [`StepExecutor`]. Each step carries a [`StepPolicy`] deciding whether its
//! failure stops the pipeline. Paths come from a [`Layout`], and the
//! [`WatchTable`] maps changed files back to the task that rebuilds them.

pub mod browser;
pub mod layout;
pub mod pipeline;
pub mod target;
pub mod task;
pub mod watch;

pub use browser::{Browser, BrowserSelection, UnknownBrowser};
pub use layout::{Layout, LayoutVariant};
pub use pipeline::{Advisory, Pipeline, PipelineError, RunReport, Step, StepExecutor, StepPolicy};
pub use target::{task_listing, Target, UnknownTarget};
pub use task::{AssetTasks, TaskError, TaskName, TaskOutcome};
pub use watch::{ReloadKind, WatchRule, WatchTable};
