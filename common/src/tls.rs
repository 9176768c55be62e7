use std::{fs, io::BufReader, path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use rustls::{
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer},
    RootCertStore,
};
use rustls_pemfile::{certs, private_key};

/// Crypto provider used for every TLS config built by this workspace
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Read a PEM certificate chain
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let pem = fs::read(path)
        .with_context(|| format!("Failed to read certificate from {:?}", path))?;

    let chain = certs(&mut BufReader::new(&*pem))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificate PEM data in {:?}", path))?;

    if chain.is_empty() {
        return Err(anyhow!("No certificates found in {:?}", path));
    }
    tracing::debug!("Loaded {} certificate(s) from {:?}", chain.len(), path);
    Ok(chain)
}

/// Read a PEM private key (PKCS#1, PKCS#8 or SEC1)
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let pem = fs::read(path)
        .with_context(|| format!("Failed to read private key from {:?}", path))?;

    let key = private_key(&mut BufReader::new(&*pem))
        .with_context(|| format!("Failed to parse private key PEM data in {:?}", path))?
        .ok_or_else(|| anyhow!("No private key found in {:?}", path))?;
    tracing::debug!("Loaded private key from {:?}", path);
    Ok(key)
}

/// Build a trust store from a PEM file of CA certificates
pub fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    let ca_certs = load_certs(path)?;
    let (added, ignored) = root_store.add_parsable_certificates(ca_certs);
    if ignored > 0 {
        tracing::warn!("⚠️  Ignored {} unparsable CA certificate(s) in {:?}", ignored, path);
    }
    tracing::debug!("Trusting {} CA certificate(s) from {:?}", added, path);

    if root_store.is_empty() {
        return Err(anyhow!(
            "No valid CA certificates found in {:?}. Please check the CA certificate file.",
            path
        ));
    }
    Ok(root_store)
}
