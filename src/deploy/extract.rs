//! Idempotent extraction of the bundled payload.
//!
//! # Responsibilities
//! - Decide whether an existing working directory can be reused
//! - Recreate the working directory from scratch when it cannot
//! - Expand each deployed archive into `webapps/`
//! - Expand the well-known configuration files that the bundle carries into `conf/`
//!
//! # Design Decisions
//! - Extraction always starts from an empty directory
//! - A missing archive aborts; a missing configuration file is skipped
//! - No rollback on failure: the next start with `--reset-extract` redoes everything

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::deploy::layout::WorkingDirectory;
use crate::deploy::resources::BundledResources;
use crate::deploy::spec::ArchiveSpecMap;

/// Configuration files copied from `conf/<name>` in the bundle when present.
pub const WELL_KNOWN_CONFIG_FILES: &[&str] = &[
    "catalina.properties",
    "logging.properties",
    "tomcat-users.xml",
    "catalina.policy",
    "context.xml",
    "server.xml",
    "web.xml",
    "server.toml",
];

/// Size of the copy buffer used when expanding resources.
pub const COPY_BUFFER_SIZE: usize = 2048;

/// Error type for extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("impossible to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resource '{name}' not found in bundle")]
    ResourceNotFound { name: String },

    #[error("failed to read resource '{name}': {source}")]
    ResourceRead {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How archive destinations under `webapps/` are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationNaming {
    /// Programmatic mode: the root context is written to `ROOT.war`.
    RootRewrite,
    /// External configuration mode: archive names are kept as-is.
    PreserveNames,
}

impl DestinationNaming {
    pub fn rewrites_root(self) -> bool {
        matches!(self, DestinationNaming::RootRewrite)
    }
}

/// Whether the working directory has to be (re)populated.
pub fn should_extract(working_dir_exists: bool, reset_requested: bool) -> bool {
    !working_dir_exists || reset_requested
}

/// Summary of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Archives written under `webapps/`.
    pub archives: Vec<PathBuf>,
    /// Configuration files written under `conf/`.
    pub config_files: Vec<PathBuf>,
}

/// Expands bundled resources into a working directory.
pub struct ExtractionEngine<'a> {
    resources: &'a dyn BundledResources,
    layout: &'a WorkingDirectory,
    naming: DestinationNaming,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(
        resources: &'a dyn BundledResources,
        layout: &'a WorkingDirectory,
        naming: DestinationNaming,
    ) -> Self {
        Self {
            resources,
            layout,
            naming,
        }
    }

    /// Recreate the working directory and expand every archive in `contexts`
    /// plus the well-known configuration files.
    pub fn extract(&self, contexts: &ArchiveSpecMap) -> Result<ExtractionReport, ExtractError> {
        let root = self.layout.root();
        if root.exists() {
            tracing::info!(path = %root.display(), "Removing previous extraction");
            fs::remove_dir_all(root).map_err(|source| ExtractError::DirectoryCreation {
                path: root.to_path_buf(),
                source,
            })?;
        }
        create_dir(root)?;
        create_dir(&self.layout.webapps())?;

        let mut report = ExtractionReport::default();

        for (context, archive) in contexts.iter() {
            let destination =
                self.layout
                    .archive_path(context, archive, self.naming.rewrites_root());
            tracing::debug!(
                context = %context,
                archive = %archive,
                destination = %destination.display(),
                "Expanding archive"
            );
            let found = self.expand_resource(archive.as_str(), &destination)?;
            if !found {
                return Err(ExtractError::ResourceNotFound {
                    name: archive.to_string(),
                });
            }
            report.archives.push(destination);
        }

        let conf_dir = self.layout.conf();
        for name in WELL_KNOWN_CONFIG_FILES {
            let resource = format!("conf/{}", name);
            if !self.resources.contains(&resource) {
                continue;
            }
            create_dir(&conf_dir)?;
            let destination = conf_dir.join(name);
            self.expand_resource(&resource, &destination)?;
            tracing::debug!(file = %destination.display(), "Expanded configuration file");
            report.config_files.push(destination);
        }

        tracing::info!(
            path = %root.display(),
            archives = report.archives.len(),
            config_files = report.config_files.len(),
            "Extraction complete"
        );
        Ok(report)
    }

    /// Copy a resource to `destination`. Returns `false` if the resource is absent.
    fn expand_resource(&self, name: &str, destination: &Path) -> Result<bool, ExtractError> {
        let read_error = |source| ExtractError::ResourceRead {
            name: name.to_string(),
            source,
        };
        let Some(mut input) = self.resources.open(name).map_err(read_error)? else {
            return Ok(false);
        };
        expand(&mut input, destination).map_err(|e| match e {
            ExpandError::Read(source) => read_error(source),
            ExpandError::Write(source) => ExtractError::Write {
                path: destination.to_path_buf(),
                source,
            },
        })?;
        Ok(true)
    }
}

fn create_dir(path: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(path).map_err(|source| ExtractError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    })
}

enum ExpandError {
    Read(io::Error),
    Write(io::Error),
}

/// Stream `input` into a newly created `file` with a fixed-size buffer.
fn expand(input: &mut dyn Read, file: &Path) -> Result<u64, ExpandError> {
    let mut output = BufWriter::new(File::create(file).map_err(ExpandError::Write)?);
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExpandError::Read(e)),
        };
        output.write_all(&buffer[..n]).map_err(ExpandError::Write)?;
        written += n as u64;
    }
    output.flush().map_err(ExpandError::Write)?;
    Ok(written)
}
