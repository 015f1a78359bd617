//! The command surface: every name a user can ask lathe to run.

use std::fmt;
use std::str::FromStr;

use crate::browser::{Browser, BrowserSelection};
use crate::pipeline::{Pipeline, Step};
use crate::task::TaskName;

/// A runnable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Print the available targets
    Default,

    /// Validate, compress and compile everything
    Build,

    /// Compile for development, then serve with the default browser
    Serve,

    /// Serve and open a specific browser
    Browser(Browser),

    /// Serve and open every supported browser
    AllBrowsers,

    /// Run a single asset task
    Task(TaskName),
}

/// Error for a name outside the command surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task '{0}'. Run `lathe --tasks` to list available tasks")]
pub struct UnknownTarget(pub String);

impl Target {
    /// Every target, in listing order.
    pub fn all() -> Vec<Target> {
        let mut targets = vec![Target::Default, Target::Build, Target::Serve];
        targets.extend(Browser::ALL.into_iter().map(Target::Browser));
        targets.push(Target::AllBrowsers);
        targets.extend(TaskName::ALL.into_iter().map(Target::Task));
        targets
    }

    pub fn name(&self) -> &'static str {
        match self {
            Target::Default => "default",
            Target::Build => "build",
            Target::Serve => "serve",
            Target::Browser(browser) => browser.name(),
            Target::AllBrowsers => "allBrowsers",
            Target::Task(task) => task.name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Target::Default => "List the available tasks",
            Target::Build => "Validate and compress HTML, compile CSS and JavaScript for production",
            Target::Serve => "Compile for development and serve with live reload",
            Target::Browser(Browser::Safari) => "Serve and open Safari",
            Target::Browser(Browser::Firefox) => "Serve and open Firefox",
            Target::Browser(Browser::Chrome) => "Serve and open Chrome",
            Target::Browser(Browser::Opera) => "Serve and open Opera",
            Target::Browser(Browser::Edge) => "Serve and open Edge",
            Target::AllBrowsers => "Serve and open every supported browser",
            Target::Task(task) => task.description(),
        }
    }

    /// The steps this target runs. `Default` has none; it lists tasks instead.
    pub fn pipeline(&self) -> Option<Pipeline> {
        let steps = match self {
            Target::Default => return None,
            Target::Build => vec![
                Step::Run(TaskName::ValidateHtml),
                Step::Run(TaskName::CompressHtml),
                Step::Run(TaskName::CompileCssForProd),
                Step::Run(TaskName::TranspileJsForProd),
                Step::Run(TaskName::TranspileJsForDev),
            ],
            Target::Serve => vec![
                Step::Run(TaskName::CompileCssForDev),
                Step::Run(TaskName::ValidateHtml),
                Step::Run(TaskName::TranspileJsForDev),
                Step::Serve(BrowserSelection::Default),
            ],
            Target::Browser(browser) => vec![Step::Serve(BrowserSelection::One(*browser))],
            Target::AllBrowsers => vec![Step::Serve(BrowserSelection::All)],
            Target::Task(task) => vec![Step::Run(*task)],
        };

        Some(Pipeline::new(self.name(), steps))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `allBrowsers` selects `all`; bare `all` is not a command
        let selection = match s {
            "allBrowsers" => BrowserSelection::choose("all").ok(),
            "all" => None,
            name => BrowserSelection::choose(name).ok(),
        };

        match selection {
            Some(BrowserSelection::One(browser)) => Ok(Target::Browser(browser)),
            Some(BrowserSelection::All) => Ok(Target::AllBrowsers),
            _ => Target::all()
                .into_iter()
                .filter(|t| !matches!(t, Target::Browser(_) | Target::AllBrowsers))
                .find(|t| t.name() == s)
                .ok_or_else(|| UnknownTarget(s.to_string())),
        }
    }
}

/// Render the task table printed by `lathe --tasks`.
pub fn task_listing() -> String {
    let targets = Target::all();
    let width = targets.iter().map(|t| t.name().len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, target) in targets.iter().enumerate() {
        let last = i + 1 == targets.len();
        let branch = if last { "└──" } else { "├──" };
        out.push_str(&format!(
            "{} {:width$}  {}\n",
            branch,
            target.name(),
            target.description(),
            width = width
        ));

        if let Some(pipeline) = target.pipeline() {
            let serves_directly = matches!(target, Target::Browser(_) | Target::AllBrowsers);
            if pipeline.steps().len() > 1 || serves_directly {
                let steps: Vec<String> = pipeline.steps().iter().map(|s| s.to_string()).collect();
                let stem = if last { " " } else { "│" };
                out.push_str(&format!("{}   {}\n", stem, steps.join(" → ")));
            }
        }
    }

    out
}
