//! Development server with live reload for the lathe asset pipeline.
//!
//! Serves the layout's static roots, watches sources, reruns the matching
//! task on change and tells connected browsers to refresh over a WebSocket.

pub mod browser;
pub mod livereload;
pub mod server;
pub mod watcher;

pub use browser::launch_browsers;
pub use livereload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
