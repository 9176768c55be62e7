use std::{
    io,
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use tokio::{
    io::{ReadHalf, WriteHalf},
    net::{lookup_host, TcpStream},
    task::JoinHandle,
    time::timeout,
};

use crate::{
    config::ConnectionConfig,
    control::ControlState,
    dispatch::FrameHandler,
    error::{ClientError, Result},
    io::{Reader, Writer},
    session::{Session, SessionFactory, SessionStream},
    source::CommandSource,
    verifier::PeerIdentity,
};

/// A running connection to the robot.
///
/// The connection is driven by a background supervisor task that resolves the
/// server, connects, establishes the TLS session, runs the reader and writer
/// and finally closes the session once shutdown is requested.
pub struct Client {
    control:    ControlState,
    peer:       Arc<OnceLock<PeerIdentity>>,
    supervisor: Option<JoinHandle<Result<()>>>,
}

impl Client {
    /// Starts a connection in the background and returns immediately.
    ///
    /// Either task may be left out; its half of the session then stays idle.
    /// Must be called from within a Tokio runtime.
    pub fn start<H, S>(config: ConnectionConfig, reader: Option<H>, writer: Option<S>) -> Self
    where
        H: FrameHandler,
        S: CommandSource,
    {
        Self::start_with_control(config, ControlState::new(), reader, writer)
    }

    /// Like [`start`](Self::start) but shares an existing control state, for
    /// example one that signal handlers were installed on
    pub fn start_with_control<H, S>(
        config: ConnectionConfig,
        control: ControlState,
        reader: Option<H>,
        writer: Option<S>,
    ) -> Self
    where
        H: FrameHandler,
        S: CommandSource,
    {
        let peer = Arc::new(OnceLock::new());
        let supervisor = tokio::spawn(supervise(
            config,
            control.clone(),
            peer.clone(),
            reader,
            writer,
        ));
        Self {
            control,
            peer,
            supervisor: Some(supervisor),
        }
    }

    /// Whether the supervisor is still working, including during teardown
    pub fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Request the end of the session. Safe to call any number of times.
    pub fn stop(&self) {
        if self.control.request_shutdown() {
            tracing::info!("Stop requested");
        }
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Identity the robot presented, once a verified session is established.
    ///
    /// Stays `None` when verification is disabled or setup failed.
    pub fn peer_identity(&self) -> Option<&PeerIdentity> {
        self.peer.get()
    }

    /// Wait for the supervisor to finish and return how the session ended.
    ///
    /// Setup failures and protocol violations are errors; the peer closing the
    /// connection or the operator quitting are not.
    pub async fn wait(mut self) -> Result<()> {
        match self.supervisor.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // A detached supervisor still tears the session down
        self.control.request_shutdown();
    }
}

/// Half of the session that is either owned by a running task or unused
enum TaskSlot<T> {
    Idle(T),
    Running(JoinHandle<(T, Result<()>)>),
}

impl<T> TaskSlot<T> {
    async fn reclaim(self) -> Result<(T, Result<()>)> {
        match self {
            Self::Idle(half) => Ok((half, Ok(()))),
            Self::Running(handle) => Ok(handle.await?),
        }
    }
}

async fn supervise<H, S>(
    config: ConnectionConfig,
    control: ControlState,
    peer: Arc<OnceLock<PeerIdentity>>,
    reader: Option<H>,
    writer: Option<S>,
) -> Result<()>
where
    H: FrameHandler,
    S: CommandSource,
{
    let result = run_session(&config, &control, &peer, reader, writer).await;
    control.request_shutdown();

    match result {
        Err(e) if e.is_disconnect() => {
            tracing::warn!("Session ended: {}", e);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            Err(e)
        }
        Ok(()) => Ok(()),
    }
}

async fn run_session<H, S>(
    config: &ConnectionConfig,
    control: &ControlState,
    peer: &OnceLock<PeerIdentity>,
    reader: Option<H>,
    writer: Option<S>,
) -> Result<()>
where
    H: FrameHandler,
    S: CommandSource,
{
    config.validate()?;
    let factory = SessionFactory::new(config)?;

    let addr = resolve(config).await?;
    let transport = connect(config, addr).await?;
    let session = factory.establish(transport).await?;
    tracing::info!("✓ Secure connection established");
    if let Some(identity) = session.peer_identity() {
        let _ = peer.set(identity.clone());
    }

    let (read_half, write_half) = session.split();

    let writer: TaskSlot<WriteHalf<SessionStream>> = match writer {
        Some(source) => TaskSlot::Running(tokio::spawn(
            Writer::new(write_half, source, control.clone()).run(),
        )),
        None => TaskSlot::Idle(write_half),
    };
    let reader: TaskSlot<ReadHalf<SessionStream>> = match reader {
        Some(handler) => TaskSlot::Running(tokio::spawn(
            Reader::new(read_half, handler, control.clone(), config.unknown_tags).run(),
        )),
        None => TaskSlot::Idle(read_half),
    };

    control.wait().await;
    tracing::info!("Shutdown requested, stopping I/O tasks");

    let (read_half, read_result) = reader.reclaim().await?;
    let (write_half, write_result) = writer.reclaim().await?;

    let mut stream = read_half.unsplit(write_half);
    Session::close(&mut stream).await;
    drop(stream);
    tracing::info!("Closing socket and exiting.");

    // A protocol violation outranks the disconnect it usually causes
    match (read_result, write_result) {
        (Err(e), _) | (_, Err(e)) if !e.is_disconnect() => Err(e),
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

async fn resolve(config: &ConnectionConfig) -> Result<SocketAddr> {
    let host = config.server_address.as_str();
    let resolution_error = |source| ClientError::Resolution {
        host: host.to_string(),
        source,
    };

    let addr = lookup_host((host, config.port))
        .await
        .map_err(resolution_error)?
        .next()
        .ok_or_else(|| {
            resolution_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })?;

    tracing::info!("Host {} IP address is {}", host, addr.ip());
    Ok(addr)
}

async fn connect(config: &ConnectionConfig, addr: SocketAddr) -> Result<TcpStream> {
    tracing::info!("Connecting to {}...", addr);
    let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "TCP connect",
        })?
        .map_err(|source| ClientError::Connect { addr, source })?;

    tracing::info!("✓ Connected, establishing TLS...");
    Ok(stream)
}
