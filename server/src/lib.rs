//! Robot-side endpoint of the Alex command channel.
//!
//! [`RobotSimulator`] accepts mutually authenticated TLS connections from the
//! operator console and answers command frames the way the robot's controller
//! does, so the console can be exercised without hardware.

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use alex_common::{
    frame::MAX_FRAME_LEN,
    tls::{crypto_provider, load_certs, load_private_key, load_root_store},
    CertPaths, Frame, FrameBuffer, StatusReport,
};
use anyhow::{Context, Result};
use rustls::{server::WebPkiClientVerifier, ServerConfig};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;

pub mod robot;

pub use robot::Robot;

/// Settings for the simulated robot endpoint
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Address to listen on
    pub bind_addr:           SocketAddr,
    /// Robot certificate, key and the CA that signs operator certificates
    pub cert_paths:          CertPaths,
    /// Refuse clients that do not present a certificate signed by the CA
    pub require_client_cert: bool,
}

impl SimulatorConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            cert_paths: CertPaths::robot(),
            require_client_cert: true,
        }
    }

    /// Set the certificate paths
    pub fn with_cert_paths(mut self, cert_paths: CertPaths) -> Self {
        self.cert_paths = cert_paths;
        self
    }

    /// Enable or disable client certificate verification
    pub fn with_client_auth(mut self, required: bool) -> Self {
        self.require_client_cert = required;
        self
    }
}

/// A TLS server that behaves like the robot's controller
pub struct RobotSimulator {
    acceptor: TlsAcceptor,
    listener: TcpListener,
    robot:    Mutex<Robot>,
    handled:  AtomicUsize,
}

impl RobotSimulator {
    /// Loads the certificates and binds the listening socket
    pub async fn bind(config: SimulatorConfig) -> Result<Self> {
        let tls_config = build_tls_config(&config)?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
        tracing::info!(
            "✓ Robot simulator listening on {}",
            listener.local_addr().context("Failed to read bound address")?
        );

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            listener,
            robot: Mutex::new(Robot::new()),
            handled: AtomicUsize::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read bound address")
    }

    /// Current counters of the simulated robot
    pub fn status(&self) -> StatusReport {
        self.robot().status()
    }

    /// Number of frames received from clients so far, including rejected ones
    pub fn frames_handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    /// Accept one client and serve it until it disconnects
    pub async fn serve_one(&self) -> Result<()> {
        let (tcp, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        tracing::info!("New connection from {}", peer);

        let stream = self
            .acceptor
            .accept(tcp)
            .await
            .with_context(|| format!("TLS handshake with {} failed", peer))?;

        match stream.get_ref().1.peer_certificates() {
            Some(chain) => tracing::info!(
                "✓ TLS connection established, client presented {} certificate(s)",
                chain.len()
            ),
            None => tracing::info!("✓ TLS connection established without client certificate"),
        }

        self.serve_connection(stream).await
    }

    /// Serve clients one after another until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping gracefully");
                    return Ok(());
                }
                result = self.serve_one() => {
                    if let Err(e) = result {
                        tracing::error!("Client error: {:#}", e);
                    }
                }
            }
        }
    }

    /// Answer frames on an established stream until the client closes it
    pub async fn serve_connection<S>(&self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut frames = FrameBuffer::new();
        let mut buf = [0u8; MAX_FRAME_LEN];

        loop {
            let n = stream
                .read(&mut buf)
                .await
                .context("Failed to read from client")?;
            if n == 0 {
                tracing::info!("Client closed connection");
                break;
            }
            frames.extend(&buf[..n]);

            let replies = self.answer(&mut frames);
            for reply in replies {
                tracing::debug!("Replying with {:?}", reply);
                stream
                    .write_all(&reply.encode())
                    .await
                    .context("Failed to write to client")?;
            }
            stream.flush().await.context("Failed to flush reply")?;
        }

        if let Err(e) = stream.shutdown().await {
            tracing::debug!("TLS shutdown did not complete cleanly: {}", e);
        }
        Ok(())
    }

    fn answer(&self, frames: &mut FrameBuffer) -> Vec<Frame> {
        let mut robot = self.robot();
        let mut replies = Vec::new();

        while let Some(next) = frames.next_frame() {
            self.handled.fetch_add(1, Ordering::SeqCst);
            match next {
                Ok(frame) => replies.extend(robot.handle(&frame)),
                Err(e) => replies.push(robot.reject(&e)),
            }
        }
        replies
    }

    fn robot(&self) -> MutexGuard<'_, Robot> {
        self.robot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn build_tls_config(config: &SimulatorConfig) -> Result<ServerConfig> {
    let paths = &config.cert_paths;
    let provider = crypto_provider();

    tracing::info!("Creating robot endpoint with certificates:");
    tracing::info!("  - Robot cert: {:?}", paths.cert_path);
    tracing::info!("  - Robot key: {:?}", paths.key_path);
    let cert_chain = load_certs(&paths.cert_path)?;
    let private_key = load_private_key(&paths.key_path)?;

    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?;

    let builder = if config.require_client_cert {
        tracing::info!("  - CA cert: {:?}", paths.ca_path);
        let roots = load_root_store(&paths.ca_path)?;
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .context("Failed to build client certificate verifier")?;
        builder.with_client_cert_verifier(verifier)
    } else {
        tracing::warn!("⚠️  Client certificates are not required");
        builder.with_no_client_auth()
    };

    builder
        .with_single_cert(cert_chain, private_key)
        .context("Failed to build TLS server configuration")
}
