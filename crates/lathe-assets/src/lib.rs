//! Asset processors for the lathe build pipeline.
//!
//! Each processor wraps an ecosystem crate: grass and lightningcss for
//! stylesheets, oxc for scripts. HTML checking and whitespace collapsing are
//! small tokenizers built on regex.

pub mod css;
pub mod html;
pub mod js;
pub mod sources;

pub use css::{compile_scss, css_output_name, CssStyle};
pub use html::{collapse_whitespace, validate_html, HtmlIssue};
pub use js::{transpile, JsOptions};
pub use sources::{write_if_changed, SourceSet};

use std::path::PathBuf;

/// Errors raised while reading, processing or writing assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("SCSS error in {path}: {message}")]
    Css { path: PathBuf, message: String },

    #[error("JavaScript error in {path}: {message}")]
    Js { path: PathBuf, message: String },
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
