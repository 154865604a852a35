//! TLS Transport
//!
//! Loads the server certificate chain and private key (PEM) into a
//! `tokio_rustls::TlsAcceptor`, and wraps accepted sockets either in TLS or,
//! for local development and tests, leaves them as plain TCP.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::network::connection::{BoxedStream, PeerStream};

/// Errors while building the TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    /// File could not be read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// PEM could not be parsed.
    #[error("Invalid PEM: {0}")]
    Pem(io::Error),

    /// Certificate file contained no certificates.
    #[error("Certificate chain is empty")]
    NoCertificates,

    /// Key file contained no supported private key.
    #[error("No supported private key (expected PKCS#8, PKCS#1 or SEC1)")]
    NoPrivateKey,

    /// rustls rejected the certificate/key pair.
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// How accepted sockets are wrapped.
#[derive(Clone)]
pub enum Transport {
    /// Unencrypted TCP.
    Plain,
    /// TLS over TCP.
    Tls(TlsAcceptor),
}

impl Transport {
    /// Build the transport described by the configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, TlsConfigError> {
        if config.plaintext {
            warn!("TLS disabled, accepting plaintext connections");
            return Ok(Transport::Plain);
        }
        let acceptor = load_acceptor(&config.cert_path, &config.key_path)?;
        info!(
            "TLS configured: cert='{}' key='{}'",
            config.cert_path.display(),
            config.key_path.display()
        );
        Ok(Transport::Tls(acceptor))
    }

    /// Run the server side of the transport handshake.
    pub async fn accept<S: PeerStream>(&self, stream: S) -> io::Result<BoxedStream> {
        match self {
            Transport::Plain => Ok(Box::new(stream)),
            Transport::Tls(acceptor) => {
                let tls = acceptor.accept(stream).await?;
                Ok(Box::new(tls))
            }
        }
    }

    /// Whether connections are encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }
}

/// Load a PEM certificate chain and private key from disk.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsConfigError> {
    let cert_pem = read_file(cert_path)?;
    let key_pem = read_file(key_path)?;
    acceptor_from_pem(&cert_pem, &key_pem)
}

/// Build an acceptor from in-memory PEM data.
pub fn acceptor_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<TlsAcceptor, TlsConfigError> {
    let certs = parse_certs(cert_pem)?;
    let key = parse_private_key(key_pem)?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Parse every certificate in a PEM bundle.
pub fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let mut reader = pem;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsConfigError::Pem)?;

    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificates);
    }
    Ok(certs)
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let mut reader = pem;
    rustls_pemfile::private_key(&mut reader)
        .map_err(TlsConfigError::Pem)?
        .ok_or(TlsConfigError::NoPrivateKey)
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsConfigError> {
    fs::read(path).map_err(|source| TlsConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
