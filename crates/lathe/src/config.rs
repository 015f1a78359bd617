//! Configuration file (lathe.toml) and command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use lathe_pipeline::{Layout, LayoutVariant};
use lathe_server::DevServerConfig;

/// Configuration file structure (lathe.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    layout: LayoutSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    js: JsSection,
}

#[derive(Debug, Deserialize, Default)]
struct LayoutSection {
    #[serde(default)]
    variant: LayoutVariant,
    /// Project directory the layout paths are relative to
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_reload_delay")]
    reload_delay_ms: u64,
    #[serde(default = "default_true")]
    notify: bool,
    #[serde(default = "default_true")]
    open: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reload_delay_ms: default_reload_delay(),
            notify: true,
            open: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsSection {
    #[serde(default = "default_js_target")]
    target: String,
}

impl Default for JsSection {
    fn default() -> Self {
        Self {
            target: default_js_target(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9000
}
fn default_reload_delay() -> u64 {
    50
}
fn default_true() -> bool {
    true
}
fn default_js_target() -> String {
    "es2018".to_string()
}

/// Values from the command line that win over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub layout: Option<LayoutVariant>,
    pub port: Option<u16>,
    pub no_open: bool,
}

/// Everything a run needs, resolved from file and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub layout: Layout,
    pub server: DevServerConfig,
    pub js_target: String,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

impl ConfigFile {
    /// Apply overrides and build the run settings.
    pub fn into_settings(self, overrides: &Overrides) -> Result<Settings> {
        let variant = overrides.layout.unwrap_or(self.layout.variant);
        let dir = self
            .layout
            .dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        if !dir.is_dir() {
            anyhow::bail!("Project directory not found: {}", dir.display());
        }

        let server = DevServerConfig {
            host: self.server.host,
            port: overrides.port.unwrap_or(self.server.port),
            open: self.server.open && !overrides.no_open,
            reload_delay: Duration::from_millis(self.server.reload_delay_ms),
            notify: self.server.notify,
            ..DevServerConfig::default()
        };

        Ok(Settings {
            layout: Layout::new(variant, &dir),
            server,
            js_target: self.js.target,
        })
    }
}
