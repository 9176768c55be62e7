use std::{path::PathBuf, time::Duration};

use alex_common::{CertPaths, DEFAULT_ROBOT_NAME};
use anyhow::anyhow;

use crate::error::{ClientError, Result};

/// What the reader does with a byte that is not a known frame tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownTagPolicy {
    /// Log the byte and skip it
    #[default]
    Drop,
    /// End the session with a protocol error
    Reject,
}

/// Certificate and key the client presents to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert_path: PathBuf,
    pub key_path:  PathBuf,
}

/// Configuration for one connection to the robot
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host name or literal IP of the robot endpoint
    pub server_address:     String,
    /// TCP port of the robot endpoint
    pub port:               u16,
    /// Validate the server chain and name before exchanging frames
    pub verify_peer:        bool,
    /// CA certificate used when `verify_peer` is set
    pub trust_anchor:       PathBuf,
    /// Name the server must present; may differ from `server_address`
    pub expected_peer_name: String,
    /// Send `identity` during the handshake
    pub present_identity:   bool,
    /// Client certificate and key
    pub identity:           ClientIdentity,
    /// Limit on opening the TCP connection
    pub connect_timeout:    Duration,
    /// Limit on completing the TLS handshake
    pub handshake_timeout:  Duration,
    /// Handling of unknown frame tags
    pub unknown_tags:       UnknownTagPolicy,
}

impl ConnectionConfig {
    /// Creates a configuration for the given endpoint with mutual
    /// authentication enabled and the default certificate locations
    pub fn new<S: Into<String>>(server_address: S, port: u16) -> Self {
        let certs = CertPaths::operator();
        Self {
            server_address:     server_address.into(),
            port,
            verify_peer:        true,
            trust_anchor:       certs.ca_path,
            expected_peer_name: DEFAULT_ROBOT_NAME.to_string(),
            present_identity:   true,
            identity:           ClientIdentity {
                cert_path: certs.cert_path,
                key_path:  certs.key_path,
            },
            connect_timeout:    Duration::from_secs(30),
            handshake_timeout:  Duration::from_secs(30),
            unknown_tags:       UnknownTagPolicy::Drop,
        }
    }

    /// Enable or disable server verification
    pub fn with_verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Set the CA certificate path
    pub fn with_trust_anchor<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.trust_anchor = path.into();
        self
    }

    /// Set the name the server certificate must carry
    pub fn with_expected_peer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.expected_peer_name = name.into();
        self
    }

    /// Present the given certificate and key to the server
    pub fn with_identity<P: Into<PathBuf>>(mut self, cert_path: P, key_path: P) -> Self {
        self.present_identity = true;
        self.identity = ClientIdentity {
            cert_path: cert_path.into(),
            key_path:  key_path.into(),
        };
        self
    }

    /// Connect without a client certificate
    pub fn without_identity(mut self) -> Self {
        self.present_identity = false;
        self
    }

    /// Set the TCP connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the TLS handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the unknown frame tag policy
    pub fn with_unknown_tags(mut self, policy: UnknownTagPolicy) -> Self {
        self.unknown_tags = policy;
        self
    }

    /// Reject settings that cannot produce a connection
    pub fn validate(&self) -> Result<()> {
        if self.server_address.trim().is_empty() {
            return Err(ClientError::Configuration(anyhow!(
                "server address must not be empty"
            )));
        }
        if self.port == 0 {
            return Err(ClientError::Configuration(anyhow!("port must not be 0")));
        }
        if self.verify_peer && self.expected_peer_name.is_empty() {
            return Err(ClientError::Configuration(anyhow!(
                "an expected peer name is required when verifying the server"
            )));
        }
        Ok(())
    }
}
