//! Archive spec parsing.
//!
//! # Responsibilities
//! - Tokenize the `wars` property (`archive[|contextPath];...`)
//! - Normalize context paths (`""` and `"/"` both mean the root context)
//! - Reject ambiguous tokens instead of guessing a mapping
//!
//! # Design Decisions
//! - Archive comes before the separator: `foo.war|/foo`
//! - A token without `|` deploys at the root context
//! - Duplicate context paths are an error, never last-write-wins

use std::collections::BTreeMap;
use std::fmt;

/// Token separator between deployments.
pub const ENTRY_SEPARATOR: char = ';';

/// Separator between the archive name and its context path.
pub const CONTEXT_SEPARATOR: char = '|';

/// Error produced for a malformed or ambiguous archive spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("token '{token}' contains more than one '|'")]
    MultipleSeparators { token: String },

    #[error("token '{token}' has an empty archive name")]
    EmptyArchive { token: String },

    #[error("archive name '{archive}' must be a plain file name")]
    InvalidArchive { archive: String },

    #[error("context path '{context}' is not a valid path")]
    InvalidContext { context: String },

    #[error("context path '{context}' is mapped to both '{first}' and '{second}'")]
    DuplicateContext {
        context: String,
        first: String,
        second: String,
    },
}

/// URL path prefix a deployed archive is reachable under.
///
/// Always starts with `/`; the root context is exactly `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextPath(String);

impl ContextPath {
    /// The root context (`/`).
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize a context path.
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::root());
        }

        let invalid = || SpecError::InvalidContext {
            context: raw.to_string(),
        };

        let without_trailing = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let normalized = if without_trailing.starts_with('/') {
            without_trailing.to_string()
        } else {
            format!("/{}", without_trailing)
        };

        if normalized.contains(char::is_whitespace) || normalized.contains("//") {
            return Err(invalid());
        }
        if normalized[1..].split('/').any(is_reserved_segment) {
            return Err(invalid());
        }
        Ok(Self(normalized))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory-safe name for this context (`ROOT` for `/`, `a#b` for `/a/b`).
    ///
    /// Distinct contexts always get distinct names: `#` never appears in a
    /// parsed path, and a non-root context spelled `ROOT` gets a trailing `#`.
    pub fn base_name(&self) -> String {
        if self.is_root() {
            return "ROOT".to_string();
        }
        let flattened = self.0[1..].replace('/', "#");
        if flattened.eq_ignore_ascii_case("ROOT") {
            format!("{flattened}#")
        } else {
            flattened
        }
    }
}

/// Segments that cannot be mounted as a literal route prefix.
///
/// `.`/`..` escape the context, `:name`, `*rest` and `{..}` are router
/// captures, `#` and `?` never reach the server as part of a path.
fn is_reserved_segment(segment: &str) -> bool {
    segment == "."
        || segment == ".."
        || segment.starts_with(':')
        || segment.starts_with('*')
        || segment.contains(['{', '}', '#', '?'])
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a bundled archive resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveName(String);

impl ArchiveName {
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        let trimmed = raw.trim();
        if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains("..") {
            return Err(SpecError::InvalidArchive {
                archive: raw.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One parsed token of the `wars` archive list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpecEntry {
    pub context: ContextPath,
    pub archive: ArchiveName,
}

impl ArchiveSpecEntry {
    /// Parse a single `archive[|contextPath]` token.
    pub fn parse(token: &str) -> Result<Self, SpecError> {
        let mut parts = token.split(CONTEXT_SEPARATOR);
        let archive_raw = parts.next().unwrap_or_default();
        let context_raw = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(SpecError::MultipleSeparators {
                token: token.to_string(),
            });
        }

        if archive_raw.trim().is_empty() {
            return Err(SpecError::EmptyArchive {
                token: token.to_string(),
            });
        }

        Ok(Self {
            context: ContextPath::parse(context_raw)?,
            archive: ArchiveName::parse(archive_raw)?,
        })
    }
}

/// Mapping from context path to archive name, ordered by context path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSpecMap {
    entries: BTreeMap<ContextPath, ArchiveName>,
}

impl ArchiveSpecMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, rejecting a context path that is already mapped.
    pub fn insert(&mut self, entry: ArchiveSpecEntry) -> Result<(), SpecError> {
        if let Some(existing) = self.entries.get(&entry.context) {
            return Err(SpecError::DuplicateContext {
                context: entry.context.to_string(),
                first: existing.to_string(),
                second: entry.archive.to_string(),
            });
        }
        self.entries.insert(entry.context, entry.archive);
        Ok(())
    }

    pub fn get(&self, context: &ContextPath) -> Option<&ArchiveName> {
        self.entries.get(context)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContextPath, &ArchiveName)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a full `wars` spec string into a context map.
///
/// Empty tokens are skipped, so `""` and `"a.war;"` are both accepted.
pub fn parse_archive_spec(spec: &str) -> Result<ArchiveSpecMap, SpecError> {
    let mut map = ArchiveSpecMap::new();
    for token in spec.split(ENTRY_SEPARATOR) {
        if token.trim().is_empty() {
            continue;
        }
        let entry = ArchiveSpecEntry::parse(token)?;
        tracing::debug!(
            context = %entry.context,
            archive = %entry.archive,
            "Parsed archive spec entry"
        );
        map.insert(entry)?;
    }
    Ok(map)
}
