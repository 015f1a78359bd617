//! Watch table: which task rebuilds a changed file, and how browsers refresh.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};

use crate::layout::Layout;
use crate::task::TaskName;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How connected browsers are refreshed after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// Reload the whole page
    Full,

    /// Re-fetch stylesheets in place
    Css,
}

/// A registration: files matching `patterns` rerun `task`, then `reload`.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub patterns: Vec<Pattern>,
    pub task: TaskName,
    pub reload: ReloadKind,
}

impl WatchRule {
    fn new(patterns: &[&str], task: TaskName, reload: ReloadKind) -> Result<Self, PatternError> {
        Ok(Self {
            patterns: compile(patterns)?,
            task,
            reload,
        })
    }

    fn matches(&self, relative: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }
}

/// Ordered watch rules for a layout; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct WatchTable {
    project_dirs: Vec<PathBuf>,
    rules: Vec<WatchRule>,
    ignore: Vec<Pattern>,
}

impl WatchTable {
    /// The scripts, stylesheets and pages rules for `layout`.
    pub fn for_layout(layout: &Layout) -> Result<Self, PatternError> {
        let patterns = layout.watch_patterns();
        let ignore: Vec<&str> = layout.watch_ignore.iter().map(String::as_str).collect();

        let mut project_dirs = vec![layout.project_dir.clone()];
        if let Ok(canonical) = fs::canonicalize(&layout.project_dir) {
            if canonical != layout.project_dir {
                project_dirs.push(canonical);
            }
        }

        Ok(Self {
            project_dirs,
            rules: vec![
                WatchRule::new(&patterns.js, TaskName::TranspileJsForDev, ReloadKind::Full)?,
                WatchRule::new(&patterns.scss, TaskName::CompileCssForDev, ReloadKind::Css)?,
                WatchRule::new(&patterns.html, TaskName::ValidateHtml, ReloadKind::Full)?,
            ],
            ignore: compile(&ignore)?,
        })
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    /// Find the rule for a changed path, which may be absolute or relative
    /// to the project directory.
    pub fn lookup(&self, path: &Path) -> Option<&WatchRule> {
        let relative = self
            .project_dirs
            .iter()
            .find_map(|dir| path.strip_prefix(dir).ok())
            .unwrap_or(path);

        if self
            .ignore
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
        {
            return None;
        }

        self.rules.iter().find(|rule| rule.matches(relative))
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Pattern>, PatternError> {
    patterns.iter().map(|p| Pattern::new(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutVariant;
    use tempfile::tempdir;

    fn table(variant: LayoutVariant, dir: &Path) -> WatchTable {
        WatchTable::for_layout(&Layout::new(variant, dir)).unwrap()
    }

    fn task_for(table: &WatchTable, path: &str) -> Option<(TaskName, ReloadKind)> {
        table
            .lookup(Path::new(path))
            .map(|rule| (rule.task, rule.reload))
    }

    #[test]
    fn root_layout_rules() {
        let table = table(LayoutVariant::Root, Path::new("."));

        assert_eq!(
            task_for(&table, "./js/app.js"),
            Some((TaskName::TranspileJsForDev, ReloadKind::Full))
        );
        assert_eq!(
            task_for(&table, "js/lib/util.js"),
            Some((TaskName::TranspileJsForDev, ReloadKind::Full))
        );
        assert_eq!(
            task_for(&table, "sass/partials/_nav.scss"),
            Some((TaskName::CompileCssForDev, ReloadKind::Css))
        );
        assert_eq!(
            task_for(&table, "index.html"),
            Some((TaskName::ValidateHtml, ReloadKind::Full))
        );
        assert_eq!(
            task_for(&table, "pages/about.html"),
            Some((TaskName::ValidateHtml, ReloadKind::Full))
        );
        assert_eq!(task_for(&table, "css/style.css"), None);
        assert_eq!(task_for(&table, "compressedHTML/html/index.html"), None);
    }

    #[test]
    fn app_layout_rules_resolve_absolute_paths() {
        let temp = tempdir().unwrap();
        let table = table(LayoutVariant::App, temp.path());

        let changed = temp.path().join("app/dev/sass/style.scss");
        assert_eq!(
            table.lookup(&changed).map(|r| r.task),
            Some(TaskName::CompileCssForDev)
        );

        let output = temp.path().join("app/temp/js/main.js");
        assert!(table.lookup(&output).is_none());
    }

    #[test]
    fn has_one_rule_per_source_kind() {
        let table = table(LayoutVariant::Root, Path::new("."));
        let tasks: Vec<TaskName> = table.rules().iter().map(|r| r.task).collect();

        assert_eq!(
            tasks,
            vec![
                TaskName::TranspileJsForDev,
                TaskName::CompileCssForDev,
                TaskName::ValidateHtml,
            ]
        );
    }
}
