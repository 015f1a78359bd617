//! SCSS compilation.

use std::path::{Path, PathBuf};

use crate::AssetError;

/// Output style for compiled stylesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssStyle {
    /// Readable output for development
    Expanded,

    /// Minified output for production
    Compressed,
}

/// Compile an SCSS entry point to CSS.
///
/// The entry's directory is on the load path so partials resolve relative
/// to it. Compressed output is minified with lightningcss.
pub fn compile_scss(entry: &Path, style: CssStyle) -> Result<String, AssetError> {
    let dir = entry.parent().unwrap_or(Path::new("."));
    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(&dir);

    let css = grass::from_path(entry, &options).map_err(|e| AssetError::Css {
        path: entry.to_path_buf(),
        message: e.to_string(),
    })?;

    match style {
        CssStyle::Expanded => Ok(css),
        CssStyle::Compressed => minify_css(&css).map_err(|message| AssetError::Css {
            path: entry.to_path_buf(),
            message,
        }),
    }
}

/// Minify CSS using lightningcss.
fn minify_css(css: &str) -> Result<String, String> {
    use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| format!("CSS minify error: {}", e))?;

    Ok(minified.code)
}

/// Output file for an entry: `sass/style.scss` compiles to `<out_dir>/style.css`.
pub fn css_output_name(entry: &Path, out_dir: &Path) -> PathBuf {
    let stem = entry
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("style");
    out_dir.join(format!("{}.css", stem))
}
