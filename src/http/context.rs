//! Deployed application contexts.
//!
//! # Responsibilities
//! - Unpack an archive into its scratch directory under `work/`
//! - Serve the unpacked files under the context path
//! - Apply the archive's context descriptor (headers, secure redirect)

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use axum::{
    extract::{OriginalUri, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::deploy::spec::ContextPath;
use crate::server::plan::{ConnectorSpec, ContextDescriptor};

/// Error type for context preparation.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to unpack {}: {source}", archive.display())]
    Unpack {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid response header '{name}' for context {context}")]
    InvalidHeader { context: String, name: String },
}

/// A context whose archive has been unpacked and is ready to serve.
#[derive(Debug, Clone)]
pub struct MountedContext {
    pub path: ContextPath,
    pub doc_root: PathBuf,
    pub descriptor: ContextDescriptor,
}

/// Unpack `archive` into `destination`, replacing previous content.
///
/// Entries whose names escape `destination` are skipped.
pub fn unpack_archive(archive: &Path, destination: &Path) -> io::Result<usize> {
    if destination.exists() {
        fs::remove_dir_all(destination)?;
    }
    fs::create_dir_all(destination)?;

    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping archive entry outside context root");
            continue;
        };
        let target = destination.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut entry, &mut File::create(&target)?)?;
        files += 1;
    }
    tracing::debug!(
        archive = %archive.display(),
        destination = %destination.display(),
        files,
        "Archive unpacked"
    );
    Ok(files)
}

/// Build the service answering requests for `context` on `connector`.
pub fn context_router(context: &MountedContext, connector: &ConnectorSpec) -> Result<Router, ContextError> {
    if context.descriptor.require_secure && !connector.is_secure() {
        if let Some(port) = connector.redirect_port {
            return Ok(Router::new().fallback(redirect_to_secure).with_state(port));
        }
        tracing::warn!(
            context = %context.path,
            port = connector.port,
            "Context requires a secure connector but no redirect port is set"
        );
    }

    let serve = ServeDir::new(&context.doc_root)
        .append_index_html_on_directories(context.descriptor.index_html);
    let mut router = Router::new().fallback_service(serve);

    for (name, value) in &context.descriptor.response_headers {
        let invalid = || ContextError::InvalidHeader {
            context: context.path.to_string(),
            name: name.clone(),
        };
        let name = HeaderName::try_from(name.as_str()).map_err(|_| invalid())?;
        let value = HeaderValue::try_from(value.as_str()).map_err(|_| invalid())?;
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }
    Ok(router)
}

/// Send the client to the same URL on the HTTPS connector.
async fn redirect_to_secure(
    State(port): State<u16>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.parse::<axum::http::uri::Authority>().ok())
        .map(|authority| authority.host().to_string())
        .unwrap_or_else(|| "localhost".to_string());
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let location = format!("https://{}:{}{}", host, port, path);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unpack_writes_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("app.war");
        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("css/", options).unwrap();
        zip.start_file("css/site.css", options).unwrap();
        zip.write_all(b"body{}").unwrap();
        zip.start_file("index.html", options).unwrap();
        zip.write_all(b"<h1>hi</h1>").unwrap();
        zip.start_file("../escape.txt", options).unwrap();
        zip.write_all(b"nope").unwrap();
        zip.finish().unwrap();

        let target = dir.path().join("work/app");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.html"), "old").unwrap();

        let files = unpack_archive(&archive, &target).unwrap();
        assert_eq!(files, 2);
        assert_eq!(fs::read_to_string(target.join("css/site.css")).unwrap(), "body{}");
        assert!(target.join("index.html").exists());
        assert!(!target.join("stale.html").exists());
        assert!(!dir.path().join("work/escape.txt").exists());
    }

    #[test]
    fn unpack_rejects_non_archives() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.war");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(unpack_archive(&archive, &dir.path().join("out")).is_err());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let mut descriptor = ContextDescriptor::default();
        descriptor
            .response_headers
            .insert("bad header".into(), "x".into());
        let context = MountedContext {
            path: ContextPath::root(),
            doc_root: PathBuf::from("/tmp"),
            descriptor,
        };
        let err = context_router(&context, &ConnectorSpec::http(8080, "HTTP/1.1")).unwrap_err();
        assert!(matches!(err, ContextError::InvalidHeader { .. }));
    }
}
