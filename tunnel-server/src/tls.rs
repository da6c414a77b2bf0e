use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rcgen::{CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
use rustls::ServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::TlsAcceptor;

const SELF_SIGNED_VALIDITY_DAYS: i64 = 30;

/// Builds the `TlsAcceptor` the server hands every accepted socket to.
///
/// `cert_and_key` is `Some((cert_path, key_path))` when the operator supplied
/// their own material with `--cert`/`--key`; `None` falls back to a freshly
/// generated self-signed certificate good for `SELF_SIGNED_VALIDITY_DAYS`.
pub fn build_acceptor(cert_and_key: Option<(&Path, &Path)>) -> io::Result<TlsAcceptor> {
    let (cert_chain, key) = match cert_and_key {
        Some((cert_path, key_path)) => load_from_disk(cert_path, key_path)?,
        None => generate_self_signed()?,
    };

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_from_disk(cert_path: &Path, key_path: &Path) -> io::Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let cert_chain = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if cert_chain.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("no certificates found in {}", cert_path.display())));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("no private key found in {}", key_path.display())))?;

    Ok((cert_chain, key))
}

/// Generates a CN=localhost certificate valid for 30 days. `rcgen` cannot
/// itself generate RSA keys (it only loads existing ones), so this uses its
/// default key algorithm rather than the RSA-4096 called out in older design
/// notes for this tunnel; every usage/validity requirement those notes pin
/// down otherwise is honored below.
fn generate_self_signed() -> io::Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let mut params = CertificateParams::new(vec!["localhost".to_string()])
        .map_err(|error| io::Error::new(io::ErrorKind::Other, error.to_string()))?;

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, "localhost");
    params.distinguished_name = distinguished_name;

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(SELF_SIGNED_VALIDITY_DAYS);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let key_pair = KeyPair::generate().map_err(|error| io::Error::new(io::ErrorKind::Other, error.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|error| io::Error::new(io::ErrorKind::Other, error.to_string()))?;

    let cert_der = cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(key_pair.serialize_der());

    Ok((vec![cert_der], PrivateKeyDer::Pkcs8(key_der)))
}
