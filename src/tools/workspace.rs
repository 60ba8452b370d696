//! Workspace - the directory tools operate in
//!
//! Tools never touch the process working directory. Relative paths are
//! resolved against the workspace's current directory, which `change_dir`
//! moves around.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::core::Result;

/// Contents of the test discovery marker
pub const MARKER_CONTENT: &str = "[pytest]\npythonpath = .\n";

/// Root and current directory shared by all tools of a run
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    cwd: RwLock<PathBuf>,
}

impl Workspace {
    /// Open a workspace, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;

        Ok(Self {
            cwd: RwLock::new(root.clone()),
            root,
        })
    }

    /// Root directory of the workspace
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current directory used to resolve relative paths
    pub fn cwd(&self) -> PathBuf {
        match self.cwd.read() {
            Ok(cwd) => cwd.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Move the current directory
    pub fn set_cwd(&self, dir: PathBuf) {
        match self.cwd.write() {
            Ok(mut cwd) => *cwd = dir,
            Err(poisoned) => *poisoned.into_inner() = dir,
        }
    }

    /// Resolve a user-supplied path
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd().join(path)
        }
    }

    /// Write the marker that lets an external test harness find generated tests
    ///
    /// The marker is removed again when the guard drops, unless
    /// `remove_on_drop` is false.
    pub fn install_marker(&self, file_name: &str, remove_on_drop: bool) -> Result<MarkerGuard> {
        let path = self.root.join(file_name);
        std::fs::write(&path, MARKER_CONTENT)?;
        Ok(MarkerGuard {
            path,
            remove_on_drop,
        })
    }
}

/// Installed marker file
#[derive(Debug)]
pub struct MarkerGuard {
    path: PathBuf,
    remove_on_drop: bool,
}

impl MarkerGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(marker = %self.path.display(), "marker removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(marker = %self.path.display(), error = %e, "failed to remove marker file"),
        }
    }
}
