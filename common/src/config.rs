use std::{env, path::PathBuf};

/// Port the robot endpoint listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 5000;

/// Name the robot presents in its certificate
pub const DEFAULT_ROBOT_NAME: &str = "alex.robot.local";

const CERTS_DIR_ENV: &str = "ALEX_CERTS_DIR";
const DEFAULT_CERTS_DIR: &str = "certs";

// The signing CA is shared; each side has its own identity pair
const CA_CERT_FILE: &str = "signing.pem";
const OPERATOR_CERT_FILE: &str = "laptop.crt";
const OPERATOR_KEY_FILE: &str = "laptop.key";
const ROBOT_CERT_FILE: &str = "robot.crt";
const ROBOT_KEY_FILE: &str = "robot.key";

fn get_certs_dir() -> PathBuf {
    env::var(CERTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CERTS_DIR))
}

/// Certificate material for one end of the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    /// Path to this side's certificate chain
    pub cert_path: PathBuf,
    /// Path to this side's private key
    pub key_path:  PathBuf,
    /// Path to the signing CA used to verify the other side
    pub ca_path:   PathBuf,
}

impl CertPaths {
    /// Operator console (laptop) certificates in the certs directory
    pub fn operator() -> Self {
        Self::in_dir(get_certs_dir(), OPERATOR_CERT_FILE, OPERATOR_KEY_FILE)
    }

    /// Robot endpoint certificates in the certs directory
    pub fn robot() -> Self {
        Self::in_dir(get_certs_dir(), ROBOT_CERT_FILE, ROBOT_KEY_FILE)
    }

    fn in_dir(base: PathBuf, cert: &str, key: &str) -> Self {
        Self {
            cert_path: base.join(cert),
            key_path:  base.join(key),
            ca_path:   base.join(CA_CERT_FILE),
        }
    }
}
