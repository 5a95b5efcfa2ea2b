use crate::config::TlsConfig;
use reqwest::{Certificate, Client, Identity};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const PEM_CERTIFICATE_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("не удалось прочитать {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("в {0} нет ни одного PEM-сертификата")]
    NoCertificates(String),
    #[error("некорректная пара сертификат/ключ клиента: {0}")]
    Identity(reqwest::Error),
    #[error("некорректный сертификат CA: {0}")]
    CaCertificate(reqwest::Error),
    #[error("не удалось собрать HTTPS-клиент: {0}")]
    Build(reqwest::Error),
}

pub fn build_client(tls: &TlsConfig) -> Result<Client, TransportError> {
    let cert_pem = read_pem(&tls.client_cert)?;
    let key_pem = read_pem(&tls.client_key)?;
    let ca_pem = read_pem(&tls.ca_cert)?;

    if !contains_certificate(&ca_pem) {
        return Err(TransportError::NoCertificates(
            tls.ca_cert.display().to_string(),
        ));
    }
    if !contains_certificate(&cert_pem) {
        return Err(TransportError::NoCertificates(
            tls.client_cert.display().to_string(),
        ));
    }

    let mut identity_pem = cert_pem;
    identity_pem.push(b'\n');
    identity_pem.extend_from_slice(&key_pem);
    let identity = Identity::from_pem(&identity_pem).map_err(TransportError::Identity)?;
    let ca = Certificate::from_pem(&ca_pem).map_err(TransportError::CaCertificate)?;

    let client = Client::builder()
        .user_agent(concat!("healthagent/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .https_only(true)
        .add_root_certificate(ca)
        .identity(identity)
        .build()
        .map_err(TransportError::Build)?;

    info!(
        client_cert = %tls.client_cert.display(),
        ca_cert = %tls.ca_cert.display(),
        "mTLS-клиент инициализирован"
    );
    Ok(client)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    fs::read(path).map_err(|source| TransportError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn contains_certificate(pem: &[u8]) -> bool {
    pem.windows(PEM_CERTIFICATE_MARKER.len())
        .any(|w| w == PEM_CERTIFICATE_MARKER)
}
