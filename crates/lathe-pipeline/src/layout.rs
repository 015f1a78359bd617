//! Project layouts: where each task reads and writes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lathe_assets::SourceSet;
use serde::Deserialize;

/// The two supported project shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutVariant {
    /// Sources and outputs side by side at the project root
    #[default]
    Root,

    /// Sources under `app/dev`, outputs under `app/temp` and `app/prod`
    App,
}

impl FromStr for LayoutVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(LayoutVariant::Root),
            "app" => Ok(LayoutVariant::App),
            other => Err(format!("Unknown layout '{}' (expected root or app)", other)),
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutVariant::Root => f.write_str("root"),
            LayoutVariant::App => f.write_str("app"),
        }
    }
}

/// Every path the tasks and the dev server touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Which variant produced these paths
    pub variant: LayoutVariant,

    /// Project directory all other paths are joined onto
    pub project_dir: PathBuf,

    /// HTML pages to validate and compress
    pub html: SourceSet,

    /// Destination of compressed HTML
    pub compressed_html_dir: PathBuf,

    /// SCSS entry point
    pub scss_entry: PathBuf,

    /// Destination of expanded CSS
    pub css_dev_dir: PathBuf,

    /// Destination of compressed CSS
    pub css_prod_dir: PathBuf,

    /// Scripts transpiled for development
    pub js_dev: SourceSet,

    /// Scripts transpiled and minified for production
    pub js_prod: SourceSet,

    /// Destination of development scripts
    pub js_dev_dir: PathBuf,

    /// Destination of production scripts
    pub js_prod_dir: PathBuf,

    /// Static roots searched in order by the dev server
    pub serve_roots: Vec<PathBuf>,

    /// Directories watched recursively while serving
    pub watch_roots: Vec<PathBuf>,

    /// Watch patterns, relative to `project_dir`, that never trigger a rebuild
    pub watch_ignore: Vec<String>,
}

impl Layout {
    /// Build the layout for `variant` rooted at `project_dir`.
    pub fn new(variant: LayoutVariant, project_dir: &Path) -> Self {
        match variant {
            LayoutVariant::Root => Self::root(project_dir),
            LayoutVariant::App => Self::app(project_dir),
        }
    }

    fn root(dir: &Path) -> Self {
        let js = dir.join("js");

        Self {
            variant: LayoutVariant::Root,
            project_dir: dir.to_path_buf(),
            html: SourceSet::new(dir, &["*.html", "**/*.html"]).excluding(&[
                "compressedHTML/**",
                "node_modules/**",
                "target/**",
            ]),
            compressed_html_dir: dir.join("compressedHTML/html"),
            scss_entry: dir.join("sass/style.scss"),
            css_dev_dir: dir.join("css"),
            css_prod_dir: dir.join("css"),
            js_dev: SourceSet::new(&js, &["*.js"]),
            js_prod: SourceSet::new(&js, &["**/*.js"]),
            js_dev_dir: js.clone(),
            js_prod_dir: js,
            serve_roots: vec![dir.join("css"), dir.join("js"), dir.to_path_buf()],
            watch_roots: vec![dir.to_path_buf()],
            watch_ignore: vec![
                "compressedHTML/**".to_string(),
                "node_modules/**".to_string(),
                "target/**".to_string(),
                ".git/**".to_string(),
            ],
        }
    }

    fn app(dir: &Path) -> Self {
        let dev = dir.join("app/dev");
        let temp = dir.join("app/temp");
        let prod = dir.join("app/prod");

        Self {
            variant: LayoutVariant::App,
            project_dir: dir.to_path_buf(),
            html: SourceSet::new(dev.join("html"), &["*.html", "**/*.html"]),
            compressed_html_dir: prod.join("html"),
            scss_entry: dev.join("sass/style.scss"),
            css_dev_dir: temp.join("css"),
            css_prod_dir: prod.join("css"),
            js_dev: SourceSet::new(dev.join("js"), &["*.js"]),
            js_prod: SourceSet::new(dev.join("js"), &["**/*.js"]),
            js_dev_dir: temp.join("js"),
            js_prod_dir: prod.join("js"),
            serve_roots: vec![
                temp.join("css"),
                temp.join("js"),
                dev.join("html"),
                dev.clone(),
            ],
            watch_roots: vec![dev],
            watch_ignore: Vec::new(),
        }
    }

    /// URL the dev stylesheet is served at. `css_dev_dir` is a serve root.
    pub fn stylesheet_url(&self) -> String {
        let stem = self
            .scss_entry
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("style");
        format!("/{}.css", stem)
    }

    /// Watch patterns, relative to `project_dir`, for the source kinds.
    pub(crate) fn watch_patterns(&self) -> WatchPatterns {
        match self.variant {
            LayoutVariant::Root => WatchPatterns {
                js: vec!["js/**/*.js"],
                scss: vec!["sass/**/*.scss"],
                html: vec!["*.html", "**/*.html"],
            },
            LayoutVariant::App => WatchPatterns {
                js: vec!["app/dev/js/**/*.js"],
                scss: vec!["app/dev/sass/**/*.scss"],
                html: vec!["app/dev/html/*.html", "app/dev/html/**/*.html"],
            },
        }
    }
}

pub(crate) struct WatchPatterns {
    pub js: Vec<&'static str>,
    pub scss: Vec<&'static str>,
    pub html: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_layout_paths() {
        let layout = Layout::new(LayoutVariant::Root, Path::new("."));

        assert_eq!(layout.compressed_html_dir, PathBuf::from("./compressedHTML/html"));
        assert_eq!(layout.scss_entry, PathBuf::from("./sass/style.scss"));
        assert_eq!(layout.css_dev_dir, PathBuf::from("./css"));
        assert_eq!(layout.js_prod_dir, PathBuf::from("./js"));
        assert_eq!(layout.js_dev.include, vec!["*.js".to_string()]);
        assert_eq!(layout.js_prod.include, vec!["**/*.js".to_string()]);
        assert_eq!(
            layout.serve_roots,
            vec![PathBuf::from("./css"), PathBuf::from("./js"), PathBuf::from(".")]
        );
    }

    #[test]
    fn app_layout_paths() {
        let layout = Layout::new(LayoutVariant::App, Path::new("."));

        assert_eq!(layout.compressed_html_dir, PathBuf::from("./app/prod/html"));
        assert_eq!(layout.html.base, PathBuf::from("./app/dev/html"));
        assert_eq!(layout.css_dev_dir, PathBuf::from("./app/temp/css"));
        assert_eq!(layout.css_prod_dir, PathBuf::from("./app/prod/css"));
        assert_eq!(layout.js_dev_dir, PathBuf::from("./app/temp/js"));
        assert_eq!(layout.js_prod_dir, PathBuf::from("./app/prod/js"));
        assert_eq!(layout.watch_roots, vec![PathBuf::from("./app/dev")]);
        assert_eq!(layout.stylesheet_url(), "/style.css");
    }

    #[test]
    fn parses_variant_names() {
        assert_eq!("app".parse::<LayoutVariant>(), Ok(LayoutVariant::App));
        assert_eq!("root".parse::<LayoutVariant>(), Ok(LayoutVariant::Root));
        assert!("flat".parse::<LayoutVariant>().is_err());
    }
}
