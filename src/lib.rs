//! HTTPS viewer for KiCad PCB trees.
//!
//! This crate serves a bundled web UI and, optionally, a directory tree of
//! `.kicad_pcb` files. Every request passes an IP allowlist; PCB files are only
//! served if they appear in a refreshable index of the tree.

pub mod acl;
pub mod config;
pub mod error;
pub mod handlers;
pub mod index;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

pub use acl::AddrFilter;
pub use config::Config;
pub use error::ServeError;
pub use index::PcbIndex;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Source-address allowlist applied to every request
    pub filter: AddrFilter,
    /// Index over the PCB directory; `None` disables the /pcbs tree entirely
    pub index: Option<Arc<PcbIndex>>,
    /// Override directory for the web UI; `None` serves the bundled assets
    pub web_dir: Option<PathBuf>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create an AppState with no PCB tree and the bundled UI.
    pub fn new(filter: AddrFilter) -> Self {
        Self {
            filter,
            index: None,
            web_dir: None,
            config: Arc::new(Config::default()),
        }
    }

    pub fn with_index(mut self, index: Arc<PcbIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_web_dir(mut self, web_dir: PathBuf) -> Self {
        self.web_dir = Some(web_dir);
        self
    }
}
