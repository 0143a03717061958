// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info};

use crate::config::PanelConfig;
use crate::error::{PanelError, Result};

/// Panels present self-signed certificates, so the peer is never verified.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client config with the ring provider and verification disabled.
pub fn tls_config() -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| PanelError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();
    Ok(config)
}

/// Open the TCP connection and run the TLS handshake, bounded by the
/// configured connect timeout.
pub async fn open(config: &PanelConfig) -> Result<TlsStream<TcpStream>> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Connecting to panel at {}", addr);

    let connector = TlsConnector::from(Arc::new(tls_config()?));
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| PanelError::Tls(format!("invalid server name {}: {}", config.host, e)))?;

    let handshake = async {
        let tcp = TcpStream::connect(&addr).await?;
        tcp.set_nodelay(true)?;
        debug!("TCP socket connected, starting TLS handshake");
        connector.connect(server_name, tcp).await
    };

    match timeout(config.connect_timeout(), handshake).await {
        Ok(Ok(stream)) => {
            debug!("TLS session established");
            Ok(stream)
        }
        Ok(Err(e)) => {
            error!("Connect to {} failed: {}", addr, e);
            Err(PanelError::Io(e))
        }
        Err(_) => {
            error!("Connect to {} timed out", addr);
            Err(PanelError::ConnectionTimeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_config_builds() {
        let config = tls_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
    }
}
