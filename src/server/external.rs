//! External descriptor mode.
//!
//! Converts a [`ServerDescriptor`] into an [`EmbeddedPlan`]. Relative paths
//! resolve against the working directory; relative `doc_base` values resolve
//! against the host's app base. With `auto_deploy`, every `*.war` in the app
//! base that is not mounted explicitly is deployed under its file stem
//! (`ROOT.war` → `/`, `a#b.war` → `/a/b`).

use std::fs;
use std::path::Path;

use crate::config::schema::{Scheme, ServerDescriptor};
use crate::deploy::layout::ROOT_ARCHIVE;
use crate::deploy::spec::ContextPath;
use crate::server::plan::{read_context_descriptor, AccessLogSpec, ConnectorSpec, EmbeddedPlan};
use crate::server::{ExternalSpec, ServerError};

/// Build the plan described by `descriptor`.
pub fn plan_from_descriptor(
    descriptor: &ServerDescriptor,
    spec: &ExternalSpec,
) -> Result<EmbeddedPlan, ServerError> {
    let base = &spec.base_dir;
    let app_base = base.join(&descriptor.host.app_base);
    let mut plan = EmbeddedPlan::new(base, &app_base, base.join("work"));
    plan.naming_enabled = spec.naming_enabled;

    for config in &descriptor.connectors {
        let mut connector = match (config.scheme, &config.tls) {
            (Scheme::Https, Some(tls)) => {
                ConnectorSpec::https(config.port, &config.protocol, tls.to_settings(base))
            }
            _ => ConnectorSpec::http(config.port, &config.protocol),
        };
        if let Some(port) = config.redirect_port {
            connector = connector.with_redirect_port(port);
        }
        let index = plan.add_connector(connector);
        if config.default {
            plan.set_default_connector(index);
        }
    }
    if plan.default_connector().is_none() {
        plan.set_default_connector(0);
    }

    plan.access_log = descriptor.access_log.as_ref().map(|log| AccessLogSpec {
        directory: base.join(log.directory.as_deref().unwrap_or("logs")),
        pattern: log.pattern.clone(),
    });

    for context in &descriptor.contexts {
        let path = ContextPath::parse(&context.path)?;
        plan.add_webapp(path, app_base.join(&context.doc_base));
    }

    if descriptor.host.auto_deploy {
        auto_deploy(&mut plan, &app_base)?;
    }

    for context in &mut plan.contexts {
        context.descriptor = read_context_descriptor(&context.doc_base)?;
    }

    Ok(plan)
}

/// Context path for an archive found in the app base.
pub fn context_for_archive(file_name: &str) -> Option<ContextPath> {
    if file_name == ROOT_ARCHIVE {
        return Some(ContextPath::root());
    }
    let stem = file_name.strip_suffix(".war")?;
    if stem.is_empty() {
        return None;
    }
    ContextPath::parse(&stem.replace('#', "/")).ok()
}

fn auto_deploy(plan: &mut EmbeddedPlan, app_base: &Path) -> Result<(), ServerError> {
    if !app_base.is_dir() {
        return Ok(());
    }
    let entries = fs::read_dir(app_base).map_err(|source| ServerError::AppBase {
        path: app_base.to_path_buf(),
        source,
    })?;

    let mut archives: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    archives.sort();

    for archive in archives {
        let Some(name) = archive.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(path) = context_for_archive(name) else {
            continue;
        };
        let taken = plan
            .contexts
            .iter()
            .any(|c| c.path == path || c.doc_base == archive);
        if taken {
            continue;
        }
        tracing::debug!(context = %path, archive = %archive.display(), "Auto-deploying archive");
        plan.add_webapp(path, archive);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::plan::ConnectorKind;
    use std::path::PathBuf;

    fn spec(base: &Path) -> ExternalSpec {
        ExternalSpec {
            config_path: base.join("conf/server.toml"),
            base_dir: base.to_path_buf(),
            naming_enabled: true,
        }
    }

    #[test]
    fn archive_names_map_to_contexts() {
        assert_eq!(context_for_archive("ROOT.war"), Some(ContextPath::root()));
        assert_eq!(context_for_archive("shop.war").unwrap().as_str(), "/shop");
        assert_eq!(context_for_archive("api#v1.war").unwrap().as_str(), "/api/v1");
        assert_eq!(context_for_archive("notes.txt"), None);
        assert_eq!(context_for_archive(".war"), None);
    }

    #[test]
    fn descriptor_connectors_and_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor: ServerDescriptor = toml::from_str(
            r#"
            [host]
            auto_deploy = false

            [[connector]]
            port = 8080
            redirect_port = 8443

            [[connector]]
            port = 8443
            scheme = "https"
            default = true
            tls = { keystore_file = "conf/server.pem" }

            [[context]]
            path = "/shop"
            doc_base = "shop.war"

            [access_log]
            pattern = "combined"
            "#,
        )
        .unwrap();

        let plan = plan_from_descriptor(&descriptor, &spec(dir.path())).unwrap();
        assert!(plan.naming_enabled);
        assert_eq!(plan.connectors.len(), 2);
        assert_eq!(plan.connectors[0].redirect_port, Some(8443));
        assert_eq!(plan.default_connector().unwrap().kind, ConnectorKind::Https);
        assert_eq!(
            plan.connectors[1].tls.as_ref().unwrap().keystore_file,
            Some(dir.path().join("conf/server.pem"))
        );
        assert_eq!(plan.contexts.len(), 1);
        assert_eq!(plan.contexts[0].doc_base, dir.path().join("webapps/shop.war"));
        let log = plan.access_log.unwrap();
        assert_eq!(log.directory, dir.path().join("logs"));
        assert_eq!(log.pattern.as_deref(), Some("combined"));
    }

    #[test]
    fn auto_deploy_skips_explicit_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let webapps = dir.path().join("webapps");
        fs::create_dir_all(&webapps).unwrap();
        for name in ["ROOT.war", "shop.war", "blog.war", "README"] {
            fs::write(webapps.join(name), b"").unwrap();
        }

        let descriptor: ServerDescriptor = toml::from_str(
            r#"
            [[connector]]
            port = 8080

            [[context]]
            path = "/store"
            doc_base = "shop.war"
            "#,
        )
        .unwrap();

        let plan = plan_from_descriptor(&descriptor, &spec(dir.path())).unwrap();
        let mounted: Vec<(String, PathBuf)> = plan
            .contexts
            .iter()
            .map(|c| (c.path.to_string(), c.doc_base.clone()))
            .collect();
        assert_eq!(
            mounted,
            vec![
                ("/store".to_string(), webapps.join("shop.war")),
                ("/".to_string(), webapps.join("ROOT.war")),
                ("/blog".to_string(), webapps.join("blog.war")),
            ]
        );
        // First connector becomes the default.
        assert_eq!(plan.default_connector_index(), Some(0));
    }
}
