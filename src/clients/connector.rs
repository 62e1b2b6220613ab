use std::{future::Future, sync::Arc};

use anyhow::{Error, Result, anyhow};
use rustls::{
    ClientConfig, RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, pem::PemObject},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::{debug, info};

use crate::{
    models::{apns::Environment, retry::RetryConfig},
    utils::retry_with_backoff,
};

/// Opens transport sessions to the binary gateway.
///
/// A session is released by dropping it, so every exit path of a connection
/// attempt gives the socket back.
pub trait GatewayConnector: Send + Sync {
    type Session: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self) -> impl Future<Output = Result<Self::Session, Error>> + Send;
}

/// TCP + TLS connector authenticating with a client certificate.
pub struct TlsGatewayConnector {
    host: String,
    port: u16,
    tls: TlsConnector,
    retry_config: RetryConfig,
}

impl TlsGatewayConnector {
    pub fn new(
        environment: Environment,
        certificate_pem: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, Error> {
        let (host, port) = environment.legacy_gateway();
        Self::with_address(host, port, certificate_pem, retry_config)
    }

    /// `certificate_pem` must hold the client certificate chain and its private key.
    pub fn with_address(
        host: &str,
        port: u16,
        certificate_pem: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, Error> {
        let certs = CertificateDer::pem_slice_iter(certificate_pem.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Invalid client certificate: {}", e))?;
        if certs.is_empty() {
            return Err(anyhow!("Client certificate missing from PEM data"));
        }

        let key = PrivateKeyDer::from_pem_slice(certificate_pem.as_bytes())
            .map_err(|e| anyhow!("Invalid client private key: {}", e))?;

        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)?;

        info!(host, port, "Binary gateway connector initialized");

        Ok(Self {
            host: host.to_string(),
            port,
            tls: TlsConnector::from(Arc::new(config)),
            retry_config,
        })
    }

    async fn connect_once(&self) -> Result<TlsStream<TcpStream>, Error> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let server_name = ServerName::try_from(self.host.clone())?;
        let session = self.tls.connect(server_name, stream).await?;

        debug!(host = %self.host, "TLS session established");
        Ok(session)
    }
}

impl GatewayConnector for TlsGatewayConnector {
    type Session = TlsStream<TcpStream>;

    async fn connect(&self) -> Result<Self::Session, Error> {
        retry_with_backoff(&self.retry_config, || self.connect_once()).await
    }
}
