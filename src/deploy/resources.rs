//! Bundled resource sets.
//!
//! The launcher reads archives and configuration files by name from a
//! resource set: the payload compiled into the binary, a directory on disk,
//! or an in-memory map.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;

/// Named byte resources available to the extraction engine.
pub trait BundledResources: Send + Sync {
    /// Open the named resource for reading.
    ///
    /// Returns `Ok(None)` when the resource is not part of the set.
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>>;

    /// Check whether the named resource exists.
    fn contains(&self, name: &str) -> bool {
        matches!(self.open(name), Ok(Some(_)))
    }
}

#[derive(RustEmbed)]
#[folder = "bundle/"]
struct Payload;

/// Resources compiled into the executable from `bundle/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBundle;

impl BundledResources for EmbeddedBundle {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        Ok(Payload::get(name).map(|file| Box::new(Cursor::new(file.data)) as Box<dyn Read>))
    }
}

/// Resources read from a directory at run time.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BundledResources for DirectoryBundle {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        let path = self.root.join(name);
        match File::open(&path) {
            Ok(file) if file.metadata()?.is_file() => Ok(Some(Box::new(file))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory resources, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, replacing any previous one with the same name.
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), bytes.into());
    }
}

impl BundledResources for MemoryBundle {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        Ok(self
            .entries
            .get(name)
            .map(|bytes| Box::new(bytes.as_slice()) as Box<dyn Read + '_>))
    }
}

/// Read a whole resource as UTF-8 text.
pub fn read_to_string(
    resources: &dyn BundledResources,
    name: &str,
) -> io::Result<Option<String>> {
    match resources.open(name)? {
        Some(mut reader) => {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_bundle_lookup() {
        let bundle = MemoryBundle::new().with("app.war", b"PK".to_vec());
        assert!(bundle.contains("app.war"));
        assert!(!bundle.contains("other.war"));
    }

    #[test]
    fn directory_bundle_reads_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("conf")).unwrap();
        std::fs::write(dir.path().join("conf/web.xml"), "<web-app/>").unwrap();

        let bundle = DirectoryBundle::new(dir.path());
        let text = read_to_string(&bundle, "conf/web.xml").unwrap();
        assert_eq!(text.as_deref(), Some("<web-app/>"));
        assert!(read_to_string(&bundle, "conf/server.xml").unwrap().is_none());
        // Directories are not resources.
        assert!(!bundle.contains("conf"));
    }

    #[test]
    fn embedded_bundle_carries_properties() {
        assert!(EmbeddedBundle.contains("runner.toml"));
    }
}
