//! Working directory layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::deploy::spec::{ArchiveName, ContextPath};

/// File name a root-context archive is expanded to in programmatic mode.
pub const ROOT_ARCHIVE: &str = "ROOT.war";

/// Extraction target holding configuration, archives, logs and scratch space.
///
/// Layout: `conf/`, `logs/`, `webapps/`, `work/`, `temp/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    pub fn conf(&self) -> PathBuf {
        self.root.join("conf")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn webapps(&self) -> PathBuf {
        self.root.join("webapps")
    }

    pub fn work(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn temp(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Path of the archive deployed at `context`.
    ///
    /// With `rewrite_root`, the root context always maps to `webapps/ROOT.war`.
    pub fn archive_path(
        &self,
        context: &ContextPath,
        archive: &ArchiveName,
        rewrite_root: bool,
    ) -> PathBuf {
        if rewrite_root && context.is_root() {
            self.webapps().join(ROOT_ARCHIVE)
        } else {
            self.webapps().join(archive.as_str())
        }
    }

    /// Create every sub-directory of the layout that is missing.
    pub fn ensure_layout(&self) -> io::Result<()> {
        for dir in [
            self.conf(),
            self.logs(),
            self.webapps(),
            self.work(),
            self.temp(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
