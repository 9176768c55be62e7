//! Throwaway PKI and simulator helpers shared by the integration tests.

#![allow(dead_code)]

use std::{fs, net::SocketAddr, path::PathBuf, sync::Arc};

use alex_client::ConnectionConfig;
use alex_common::CertPaths;
use alex_robot_sim::{RobotSimulator, SimulatorConfig};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use tempfile::TempDir;

pub const ROBOT_NAME: &str = "alex.robot.local";

/// A CA with one robot and one operator certificate, written as PEM files
pub struct Pki {
    _dir:         TempDir,
    pub robot:    CertPaths,
    pub operator: CertPaths,
}

impl Pki {
    /// Robot certificate carrying `robot_names` as DNS names
    pub fn new(robot_names: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();

        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "Alex Test CA");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();
        let ca_path = write(base, "signing.pem", &ca_cert.pem());

        let names: Vec<String> = robot_names.iter().map(|n| n.to_string()).collect();
        let (robot_cert, robot_key) = leaf(
            names,
            "alex-robot",
            ExtendedKeyUsagePurpose::ServerAuth,
            &ca_cert,
            &ca_key,
        );
        let (operator_cert, operator_key) = leaf(
            Vec::new(),
            "alex-operator",
            ExtendedKeyUsagePurpose::ClientAuth,
            &ca_cert,
            &ca_key,
        );

        Self {
            robot: CertPaths {
                cert_path: write(base, "robot.crt", &robot_cert),
                key_path:  write(base, "robot.key", &robot_key),
                ca_path:   ca_path.clone(),
            },
            operator: CertPaths {
                cert_path: write(base, "laptop.crt", &operator_cert),
                key_path:  write(base, "laptop.key", &operator_key),
                ca_path,
            },
            _dir: dir,
        }
    }

    /// Client configuration that trusts this CA and presents the operator identity
    pub fn client_config(&self, addr: SocketAddr) -> ConnectionConfig {
        ConnectionConfig::new(addr.ip().to_string(), addr.port())
            .with_trust_anchor(self.operator.ca_path.clone())
            .with_identity(
                self.operator.cert_path.clone(),
                self.operator.key_path.clone(),
            )
            .with_expected_peer_name(ROBOT_NAME)
    }

    /// Simulator on an ephemeral loopback port using this CA
    pub async fn simulator(&self, require_client_cert: bool) -> Arc<RobotSimulator> {
        let config = SimulatorConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
            .with_cert_paths(self.robot.clone())
            .with_client_auth(require_client_cert);
        Arc::new(RobotSimulator::bind(config).await.unwrap())
    }
}

fn leaf(
    names: Vec<String>,
    common_name: &str,
    usage: ExtendedKeyUsagePurpose,
    ca_cert: &Certificate,
    ca_key: &KeyPair,
) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(names).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.extended_key_usages = vec![usage];
    let cert = params.signed_by(&key, ca_cert, ca_key).unwrap();
    (cert.pem(), key.serialize_pem())
}

fn write(base: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = base.join(name);
    fs::write(&path, contents).unwrap();
    path
}
