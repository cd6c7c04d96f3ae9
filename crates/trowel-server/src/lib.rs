//! Development server with live reload for trowel sites.
//!
//! Serves the output tree, watches the source tree, re-runs the stage that
//! owns a changed file, and tells connected browsers to reload or swap CSS.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{inject_script, livereload_client_script, ReloadHub, ReloadMessage};
