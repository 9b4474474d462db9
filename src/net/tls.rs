//! TLS configuration and certificate loading.
//!
//! The keystore is a PEM file carrying the certificate chain and the private
//! key. The truststore is a PEM bundle of CA certificates used to verify
//! client certificates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

use crate::config::runtime::{TlsSettings, DEFAULT_STORE_TYPE};

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("no keystore file configured")]
    MissingKeystore,

    #[error("{store} type '{store_type}' is not supported, expected PEM")]
    UnsupportedStoreType {
        store: &'static str,
        store_type: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {}", path.display())]
    NoCertificates { path: PathBuf },

    #[error("no private key found in {}", path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("client authentication requires a truststore")]
    ClientAuthWithoutTruststore,

    #[error("client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Load TLS configuration for an HTTPS connector.
pub async fn load_tls_config(settings: &TlsSettings) -> Result<RustlsConfig, TlsError> {
    let config = build_server_config(settings)?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

/// Build a rustls server configuration from launcher TLS settings.
pub fn build_server_config(settings: &TlsSettings) -> Result<ServerConfig, TlsError> {
    check_store_type("keystore", &settings.keystore_type)?;
    let keystore = settings
        .keystore_file
        .as_deref()
        .ok_or(TlsError::MissingKeystore)?;

    if settings.keystore_password.is_some() {
        tracing::debug!("Keystore password ignored for unencrypted PEM keystore");
    }
    if let Some(alias) = &settings.key_alias {
        tracing::debug!(key_alias = %alias, "Using the single key of the PEM keystore");
    }

    let pem = read(keystore)?;
    let certs = certificates(keystore, &pem)?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| TlsError::Read {
            path: keystore.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: keystore.to_path_buf(),
        })?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let builder = match settings.truststore_file.as_deref() {
        Some(truststore) => {
            check_store_type("truststore", &settings.truststore_type)?;
            let mut roots = RootCertStore::empty();
            for cert in certificates(truststore, &read(truststore)?)? {
                roots.add(cert)?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
            let verifier = if settings.client_auth {
                verifier.build()?
            } else {
                verifier.allow_unauthenticated().build()?
            };
            builder.with_client_cert_verifier(verifier)
        }
        None if settings.client_auth => return Err(TlsError::ClientAuthWithoutTruststore),
        None => builder.with_no_client_auth(),
    };

    let mut config = builder.with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

fn check_store_type(store: &'static str, store_type: &str) -> Result<(), TlsError> {
    if store_type.eq_ignore_ascii_case(DEFAULT_STORE_TYPE) {
        Ok(())
    } else {
        Err(TlsError::UnsupportedStoreType {
            store,
            store_type: store_type.to_string(),
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn certificates(path: &Path, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}
