mod common;

use std::time::Duration;

use alex_client::{
    ChannelHandler, ChannelSource, Client, ClientError, Command, CommandCode, ConnectionConfig,
    SessionFactory,
};
use common::{Pki, ROBOT_NAME};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};

const LIMIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_untrusted_robot_fails_handshake() {
    let robot_pki = Pki::new(&[ROBOT_NAME]);
    let other_pki = Pki::new(&[ROBOT_NAME]);
    let simulator = robot_pki.simulator(true).await;
    let addr = simulator.local_addr().unwrap();
    let server = tokio::spawn({
        let simulator = simulator.clone();
        async move { simulator.serve_one().await }
    });

    // Trust a CA that did not sign the robot
    let config = other_pki.client_config(addr);
    let client = Client::start(config, None::<()>, None::<()>);

    let result = timeout(LIMIT, client.wait()).await.unwrap();
    assert!(matches!(result, Err(ClientError::Handshake(_))), "{result:?}");

    let served = timeout(LIMIT, server).await.unwrap().unwrap();
    assert!(served.is_err());
    assert_eq!(simulator.frames_handled(), 0);
}

#[tokio::test]
async fn test_name_mismatch_sends_no_frames() {
    let pki = Pki::new(&["other.robot.local"]);
    let simulator = pki.simulator(true).await;
    let addr = simulator.local_addr().unwrap();
    let server = tokio::spawn({
        let simulator = simulator.clone();
        async move { simulator.serve_one().await }
    });

    let (commands, source) = ChannelSource::channel(4);
    commands
        .send(Command::bare(CommandCode::GetStats))
        .await
        .unwrap();
    let (handler, _frames) = ChannelHandler::channel();
    let client = Client::start(pki.client_config(addr), Some(handler), Some(source));

    let result = timeout(LIMIT, client.wait()).await.unwrap();
    match result {
        Err(ClientError::Verification {
            expected,
            presented,
        }) => {
            assert_eq!(expected, ROBOT_NAME);
            assert_eq!(presented, vec!["other.robot.local".to_string()]);
        }
        other => panic!("expected verification failure, got {other:?}"),
    }

    let _ = timeout(LIMIT, server).await.unwrap().unwrap();
    assert_eq!(simulator.frames_handled(), 0);
}

#[tokio::test]
async fn test_name_match_is_case_sensitive() {
    let pki = Pki::new(&["Alex.Robot.Local"]);
    let simulator = pki.simulator(true).await;
    let addr = simulator.local_addr().unwrap();
    let server = tokio::spawn({
        let simulator = simulator.clone();
        async move { simulator.serve_one().await }
    });

    let client = Client::start(pki.client_config(addr), None::<()>, None::<()>);

    let result = timeout(LIMIT, client.wait()).await.unwrap();
    assert!(matches!(result, Err(ClientError::Verification { .. })), "{result:?}");
    let _ = timeout(LIMIT, server).await.unwrap();
}

#[tokio::test]
async fn test_missing_client_identity_is_refused_by_robot() {
    let pki = Pki::new(&[ROBOT_NAME]);
    let simulator = pki.simulator(true).await;
    let addr = simulator.local_addr().unwrap();
    let server = tokio::spawn({
        let simulator = simulator.clone();
        async move { simulator.serve_one().await }
    });

    let config = pki.client_config(addr).without_identity();
    let client = Client::start(config, None::<()>, None::<()>);

    let served = timeout(LIMIT, server).await.unwrap().unwrap();
    assert!(served.is_err());

    client.stop();
    let _ = timeout(LIMIT, client.wait()).await.unwrap();
}

#[tokio::test]
async fn test_unverified_session_without_identity() {
    let pki = Pki::new(&["somewhere.else"]);
    let simulator = pki.simulator(false).await;
    let addr = simulator.local_addr().unwrap();
    let server = tokio::spawn({
        let simulator = simulator.clone();
        async move { simulator.serve_one().await }
    });

    let config = pki
        .client_config(addr)
        .with_verify_peer(false)
        .without_identity();
    let (commands, source) = ChannelSource::channel(4);
    let (handler, mut frames) = ChannelHandler::channel();
    let client = Client::start(config, Some(handler), Some(source));

    commands
        .send(Command::new(CommandCode::Forward, 10, 50))
        .await
        .unwrap();
    let reply = timeout(LIMIT, frames.recv()).await.unwrap().unwrap();
    assert_eq!(reply, alex_client::Frame::Error(alex_client::ResponseCode::Ok));
    assert!(client.peer_identity().is_none());

    drop(commands);
    assert!(timeout(LIMIT, client.wait()).await.unwrap().is_ok());
    assert!(timeout(LIMIT, server).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_failed_handshake_closes_the_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A peer that answers the ClientHello with plain text, then waits for EOF
    let peer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n")
            .await
            .unwrap();
        let mut rest = Vec::new();
        // Either a clean EOF or a reset means the client let go of the socket
        let _ = socket.read_to_end(&mut rest).await;
    });

    let config = ConnectionConfig::new("127.0.0.1", addr.port())
        .with_verify_peer(false)
        .without_identity();
    let factory = SessionFactory::new(&config).unwrap();
    let transport = TcpStream::connect(addr).await.unwrap();

    let result = timeout(LIMIT, factory.establish(transport)).await.unwrap();
    assert!(matches!(result, Err(ClientError::Handshake(_))));

    timeout(LIMIT, peer)
        .await
        .expect("peer should see the connection end")
        .unwrap();
}
