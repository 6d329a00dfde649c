//! Optional TLS for the OcrLink server
//!
//! Either loads a PEM certificate/key pair from disk or generates a
//! self-signed one and keeps it in the config directory across restarts.

use axum_server::tls_rustls::RustlsConfig;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use tracing::info;

type TlsResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Default directory for generated certificates (~/.config/ocrlink)
pub fn default_cert_dir() -> TlsResult<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("ocrlink"))
}

/// Load `server.crt`/`server.key` from `dir`, generating them if missing
///
/// Returns `(cert_pem, key_pem)`.
pub fn load_or_generate_cert(dir: &Path, hostnames: &[String]) -> TlsResult<(String, String)> {
    let cert_path = dir.join("server.crt");
    let key_path = dir.join("server.key");

    if cert_path.exists() && key_path.exists() {
        info!("Loading certificate from {:?}", cert_path);
        let cert_pem = std::fs::read_to_string(&cert_path)?;
        let key_pem = std::fs::read_to_string(&key_path)?;
        return Ok((cert_pem, key_pem));
    }

    info!("Generating new self-signed certificate...");
    std::fs::create_dir_all(dir)?;
    let (cert_pem, key_pem) = generate_self_signed_cert(hostnames)?;
    std::fs::write(&cert_path, &cert_pem)?;
    std::fs::write(&key_path, &key_pem)?;
    info!("Certificate saved to {:?}", cert_path);

    Ok((cert_pem, key_pem))
}

/// Generate a self-signed certificate covering localhost and `hostnames`
pub fn generate_self_signed_cert(hostnames: &[String]) -> TlsResult<(String, String)> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "OcrLink");
    params.distinguished_name = dn;

    let mut san_list = vec![
        SanType::DnsName("localhost".try_into()?),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ];
    for hostname in hostnames {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            san_list.push(SanType::IpAddress(ip));
        } else if let Ok(dns) = hostname.as_str().try_into() {
            san_list.push(SanType::DnsName(dns));
        }
    }
    params.subject_alt_names = san_list;

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// SHA-256 fingerprint of a PEM certificate as colon-separated hex
pub fn calculate_cert_fingerprint(cert_pem: &str) -> String {
    Sha256::digest(cert_pem.as_bytes())
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Create RustlsConfig from PEM strings
pub async fn create_rustls_config(cert_pem: &str, key_pem: &str) -> TlsResult<RustlsConfig> {
    let config =
        RustlsConfig::from_pem(cert_pem.as_bytes().to_vec(), key_pem.as_bytes().to_vec()).await?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cert_generation() {
        let hostnames = vec!["192.168.1.100".to_string(), "ocr.local".to_string()];
        let (cert, key) = generate_self_signed_cert(&hostnames).unwrap();
        assert!(cert.contains("BEGIN CERTIFICATE"));
        assert!(key.contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = calculate_cert_fingerprint("-----BEGIN CERTIFICATE-----\ntest\n");
        assert_eq!(fp.len(), 95); // 32 bytes * 2 hex + 31 colons
        assert_eq!(fp.matches(':').count(), 31);
    }

    #[test]
    fn test_load_or_generate_reuses_files() {
        let dir = tempdir().unwrap();
        let hostnames = vec!["localhost".to_string()];

        let (cert1, key1) = load_or_generate_cert(dir.path(), &hostnames).unwrap();
        let (cert2, key2) = load_or_generate_cert(dir.path(), &hostnames).unwrap();
        assert_eq!(cert1, cert2);
        assert_eq!(key1, key2);
        assert!(dir.path().join("server.crt").exists());
    }
}
