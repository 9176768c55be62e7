use std::sync::Arc;

use alex_common::tls::{crypto_provider, load_certs, load_private_key, load_root_store};
use anyhow::{anyhow, Context};
use rustls::{client::danger::ServerCertVerifier, pki_types::ServerName, ClientConfig};
use tokio::{
    io::{self, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    time::timeout,
};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{
    config::ConnectionConfig,
    error::{ClientError, Result},
    verifier::{presented_names, PeerIdentity, TrustAnchorVerifier, UnverifiedServer},
};

/// The encrypted stream the reader and writer halves come from
pub type SessionStream = TlsStream<TcpStream>;

/// An established, verified TLS session with the robot
pub struct Session {
    stream: SessionStream,
    peer:   Option<PeerIdentity>,
}

impl Session {
    /// Identity the server presented, when verification was requested
    pub fn peer_identity(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    /// Split into independently usable read and write halves
    pub fn split(self) -> (ReadHalf<SessionStream>, WriteHalf<SessionStream>) {
        io::split(self.stream)
    }

    /// Send close-notify and close the transport
    pub async fn close(stream: &mut SessionStream) {
        if let Err(e) = stream.shutdown().await {
            tracing::debug!("TLS shutdown did not complete cleanly: {}", e);
        }
    }
}

/// Builds TLS sessions for one connection configuration
pub struct SessionFactory {
    connector:          TlsConnector,
    server_name:        ServerName<'static>,
    verify_peer:        bool,
    expected_peer_name: String,
    handshake_timeout:  std::time::Duration,
}

impl SessionFactory {
    /// Builds the client TLS context.
    ///
    /// Loads the trust anchor when the peer is to be verified and the client
    /// identity when one is to be presented. Any unreadable file is a
    /// configuration error.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let provider = crypto_provider();

        let verifier: Arc<dyn ServerCertVerifier> = if config.verify_peer {
            tracing::info!("Loading CA certificate: {:?}", config.trust_anchor);
            let roots = load_root_store(&config.trust_anchor).map_err(ClientError::Configuration)?;
            Arc::new(
                TrustAnchorVerifier::new(roots, provider.clone())
                    .context("Failed to build server verifier")
                    .map_err(ClientError::Configuration)?,
            )
        } else {
            tracing::warn!("⚠️  Server certificate verification is disabled");
            Arc::new(UnverifiedServer::new(provider.clone()))
        };

        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")
            .map_err(ClientError::Configuration)?
            .dangerous()
            .with_custom_certificate_verifier(verifier);

        let tls_config = if config.present_identity {
            tracing::info!("Loading client certificates...");
            tracing::info!("  - Client cert: {:?}", config.identity.cert_path);
            tracing::info!("  - Client key: {:?}", config.identity.key_path);
            let cert_chain =
                load_certs(&config.identity.cert_path).map_err(ClientError::Configuration)?;
            let private_key =
                load_private_key(&config.identity.key_path).map_err(ClientError::Configuration)?;
            builder
                .with_client_auth_cert(cert_chain, private_key)
                .context("Failed to build TLS client configuration")
                .map_err(ClientError::Configuration)?
        } else {
            builder.with_no_client_auth()
        };

        // SNI carries the certificate name when we check it, the dialled address otherwise
        let sni = if config.verify_peer {
            &config.expected_peer_name
        } else {
            &config.server_address
        };
        let server_name = ServerName::try_from(sni.clone())
            .map_err(|_| ClientError::Configuration(anyhow!("Invalid server name {:?}", sni)))?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
            server_name,
            verify_peer: config.verify_peer,
            expected_peer_name: config.expected_peer_name.clone(),
            handshake_timeout: config.handshake_timeout,
        })
    }

    /// Performs the handshake over an already connected transport and checks
    /// the peer's name.
    ///
    /// The transport is consumed: on any failure it is dropped, which closes it,
    /// and no application data has been exchanged.
    pub async fn establish(&self, transport: TcpStream) -> Result<Session> {
        let mut stream = timeout(
            self.handshake_timeout,
            self.connector.connect(self.server_name.clone(), transport),
        )
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "TLS handshake",
        })?
        .map_err(ClientError::Handshake)?;

        tracing::info!("✓ TLS handshake complete");

        if !self.verify_peer {
            return Ok(Session { stream, peer: None });
        }

        let peer = match self.inspect_peer(&stream) {
            Ok(peer) => peer,
            Err(e) => {
                Session::close(&mut stream).await;
                return Err(e);
            }
        };

        tracing::info!("Server certificate:");
        tracing::info!("  - Subject: {}", peer.subject);
        tracing::info!("  - Issuer: {}", peer.issuer);
        tracing::info!("  - Names: {:?}", peer.names);

        if !peer.presents(&self.expected_peer_name) {
            tracing::error!(
                "✗ Server certificate names {:?} do not include {:?}",
                peer.names,
                self.expected_peer_name
            );
            Session::close(&mut stream).await;
            return Err(ClientError::Verification {
                expected:  self.expected_peer_name.clone(),
                presented: peer.names,
            });
        }

        tracing::info!("✓ Server certificate is valid for {}", self.expected_peer_name);
        Ok(Session {
            stream,
            peer: Some(peer),
        })
    }

    fn inspect_peer(&self, stream: &SessionStream) -> Result<PeerIdentity> {
        let (_, connection) = stream.get_ref();
        let end_entity = connection
            .peer_certificates()
            .and_then(|chain| chain.first())
            .ok_or_else(|| ClientError::Verification {
                expected:  self.expected_peer_name.clone(),
                presented: Vec::new(),
            })?;

        presented_names(end_entity).map_err(|e| ClientError::Verification {
            expected:  self.expected_peer_name.clone(),
            presented: vec![e],
        })
    }
}
