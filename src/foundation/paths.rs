//! Resource directories (node library, shader sources).
//!
//! Initialised once per process before the first lookup and read-only afterwards.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Application identifier for platform data directories.
pub const APP_ID: &str = "vidgraph";

static PATHS: OnceLock<ResourcePaths> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub library: PathBuf,
    pub glsl: PathBuf,
}

impl ResourcePaths {
    /// Compute locations without installing them.
    ///
    /// Debug builds run from a checkout and read `../resources/*`; installed builds use the
    /// platform data directory, falling back to the working directory when it is unknown.
    pub fn resolve(debug: bool) -> Self {
        if debug {
            let root = PathBuf::from("../resources");
            return Self {
                library: root.join("library"),
                glsl: root.join("glsl"),
            };
        }
        let root = dirs_next::data_dir()
            .map(|p| p.join(APP_ID))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            library: root.join("library"),
            glsl: root.join("glsl"),
        }
    }
}

/// Install the process-wide paths. Later calls keep the first value.
pub fn initialize(debug: bool) -> &'static ResourcePaths {
    PATHS.get_or_init(|| {
        let p = ResourcePaths::resolve(debug);
        tracing::info!(library = %p.library.display(), glsl = %p.glsl.display(), "resource paths");
        p
    })
}

pub fn is_initialized() -> bool {
    PATHS.get().is_some()
}

fn installed() -> &'static ResourcePaths {
    PATHS
        .get()
        .unwrap_or_else(|| panic!("resource paths read before paths::initialize"))
}

pub fn library() -> PathBuf {
    installed().library.clone()
}

pub fn glsl() -> PathBuf {
    installed().glsl.clone()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/paths.rs"]
mod tests;
