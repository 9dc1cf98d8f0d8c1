//! private certificate authority for meshdir.
//!
//! two phases: bootstrap (generate or load an rsa-2048 root, persisted
//! as pem next to the process) and leaf signing (short-lived server
//! certificates minted from client pkcs#10 csrs, with the subject
//! common name bound to the authenticated user id).
//!
//! the ca issues trust, it does not measure liveness: nothing here
//! probes the endpoints a certificate will front.

#![warn(missing_docs)]

mod error;

pub use error::CaError;

use std::net::IpAddr;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber,
};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use ::time::OffsetDateTime;
use tracing::info;
use x509_parser::prelude::*;

use meshdir_types::CaConfig;

/// root key modulus size.
const ROOT_KEY_BITS: usize = 2048;

/// root certificate lifetime in days (ten years).
const ROOT_VALIDITY_DAYS: i64 = 3650;

/// a leaf certificate signed by the ca.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// pem-encoded leaf certificate.
    pub certificate_pem: String,
    /// expiry of the leaf.
    pub not_after: DateTime<Utc>,
}

/// the in-process certificate authority.
///
/// constructed once at startup by [`CertificateAuthority::bootstrap`];
/// read-only afterwards, so it can be shared across handlers without
/// locking.
pub struct CertificateAuthority {
    issuer: Issuer<'static, KeyPair>,
    ca_cert_pem: String,
    validity_hours: u64,
}

impl CertificateAuthority {
    /// load the root from disk, generating and persisting it first if
    /// either file is missing. a parse failure of existing files is
    /// fatal.
    pub async fn bootstrap(config: &CaConfig) -> Result<Self, CaError> {
        let cert_exists = tokio::fs::metadata(&config.cert_path).await.is_ok();
        let key_exists = tokio::fs::metadata(&config.key_path).await.is_ok();

        let (ca_cert_pem, key_pem) = if cert_exists && key_exists {
            info!(cert = %config.cert_path.display(), "loading existing ca root");
            let cert_pem = tokio::fs::read_to_string(&config.cert_path).await?;
            let key_pem = tokio::fs::read_to_string(&config.key_path).await?;
            (cert_pem, key_pem)
        } else {
            info!(cert = %config.cert_path.display(), "generating new ca root");
            let generated = Self::generate_root(config).await?;
            Self::persist(config, &generated.0, &generated.1).await?;
            generated
        };

        let key_pair =
            KeyPair::from_pem(&key_pem).map_err(|e| CaError::Parse(e.to_string()))?;
        let issuer = Issuer::from_ca_cert_pem(&ca_cert_pem, key_pair)
            .map_err(|e| CaError::Parse(e.to_string()))?;

        Ok(Self {
            issuer,
            ca_cert_pem,
            validity_hours: config.validity_hours,
        })
    }

    /// generate the self-signed root; returns `(cert_pem, key_pem)`.
    async fn generate_root(config: &CaConfig) -> Result<(String, String), CaError> {
        // rsa keygen takes a moment; keep it off the runtime threads
        let key_pem = tokio::task::spawn_blocking(|| -> Result<String, CaError> {
            let key = RsaPrivateKey::new(&mut OsRng, ROOT_KEY_BITS)
                .map_err(|e| CaError::Generation(e.to_string()))?;
            let pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| CaError::Generation(e.to_string()))?;
            Ok(pem.to_string())
        })
        .await
        .map_err(|e| CaError::Generation(e.to_string()))??;

        let key_pair =
            KeyPair::from_pem(&key_pem).map_err(|e| CaError::Generation(e.to_string()))?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, config.common_name.clone());
        dn.push(DnType::OrganizationName, config.organization.clone());
        dn.push(
            DnType::OrganizationalUnitName,
            config.organizational_unit.clone(),
        );
        params.distinguished_name = dn;
        params.serial_number = Some(SerialNumber::from_slice(&[1]));
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + ::time::Duration::days(ROOT_VALIDITY_DAYS);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CaError::Generation(e.to_string()))?;

        Ok((cert.pem(), key_pem))
    }

    /// write the pem files, creating parent directories; the key file
    /// is readable by the owner only.
    async fn persist(config: &CaConfig, cert_pem: &str, key_pem: &str) -> Result<(), CaError> {
        for path in [&config.cert_path, &config.key_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        tokio::fs::write(&config.cert_path, cert_pem).await?;
        tokio::fs::write(&config.key_path, key_pem).await?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;

            tokio::fs::set_permissions(&config.cert_path, Permissions::from_mode(0o644)).await?;
            tokio::fs::set_permissions(&config.key_path, Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }

    /// the cached pem bytes of the root certificate.
    pub fn ca_certificate_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    /// sign a leaf certificate from a pem-encoded csr.
    ///
    /// the csr's self-signature must verify and its subject common name
    /// must equal `user_id`. the subject is carried into the leaf
    /// verbatim; the san list is rebuilt: `*.<server_domain>` when
    /// configured, `*.nip.io` always, and the caller's public ip when
    /// provided.
    pub fn sign_csr(
        &self,
        csr_pem: &str,
        user_id: &str,
        server_domain: Option<&str>,
        public_ip: Option<&str>,
    ) -> Result<IssuedCertificate, CaError> {
        let common_name = verify_csr(csr_pem)?;
        if common_name != user_id {
            return Err(CaError::CommonNameMismatch {
                expected: user_id.to_string(),
                found: common_name,
            });
        }

        let mut csr = CertificateSigningRequestParams::from_pem(csr_pem)
            .map_err(|e| CaError::CsrParse(e.to_string()))?;

        csr.params.serial_number = Some(SerialNumber::from_slice(&leaf_serial()));
        csr.params.is_ca = IsCa::ExplicitNoCa;
        csr.params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        csr.params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        csr.params.use_authority_key_identifier_extension = true;
        csr.params.subject_alt_names = build_san_list(server_domain, public_ip)?;

        let not_before = Utc::now();
        let not_after = not_before + chrono::Duration::hours(self.validity_hours as i64);
        csr.params.not_before =
            OffsetDateTime::from_unix_timestamp(not_before.timestamp()).map_err(|_| CaError::Time)?;
        csr.params.not_after =
            OffsetDateTime::from_unix_timestamp(not_after.timestamp()).map_err(|_| CaError::Time)?;

        let cert = csr
            .signed_by(&self.issuer)
            .map_err(|e| CaError::Signing(e.to_string()))?;

        Ok(IssuedCertificate {
            certificate_pem: cert.pem(),
            not_after,
        })
    }
}

/// leaf serial: a zero lead byte followed by 15 random bytes. the zero
/// keeps the der integer positive.
fn leaf_serial() -> [u8; 16] {
    let mut serial = [0u8; 16];
    OsRng.fill_bytes(&mut serial[1..]);
    serial[0] = 0;
    serial
}

/// parse the csr, verify its self-signature and return the subject
/// common name.
fn verify_csr(csr_pem: &str) -> Result<String, CaError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(csr_pem.as_bytes())
        .map_err(|e| CaError::CsrParse(e.to_string()))?;
    let (_, csr) = X509CertificationRequest::from_der(&pem.contents)
        .map_err(|e| CaError::CsrParse(e.to_string()))?;

    csr.verify_signature()
        .map_err(|e| CaError::CsrSignature(e.to_string()))?;

    csr.certification_request_info
        .subject
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string)
        .ok_or(CaError::MissingCommonName)
}

/// assemble the san list in its fixed order, skipping items with no
/// data.
fn build_san_list(
    server_domain: Option<&str>,
    public_ip: Option<&str>,
) -> Result<Vec<SanType>, CaError> {
    let mut sans = Vec::new();

    if let Some(domain) = server_domain.filter(|d| !d.is_empty()) {
        let wildcard = format!("*.{domain}");
        sans.push(SanType::DnsName(
            wildcard
                .try_into()
                .map_err(|_| CaError::Generation("invalid server domain".to_string()))?,
        ));
    }

    sans.push(SanType::DnsName(
        "*.nip.io"
            .try_into()
            .map_err(|_| CaError::Generation("invalid san".to_string()))?,
    ));

    if let Some(ip) = public_ip.and_then(|s| s.parse::<IpAddr>().ok()) {
        sans.push(SanType::IpAddress(ip));
    }

    Ok(sans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::public_key::PublicKey;

    fn test_config(dir: &Path) -> CaConfig {
        CaConfig {
            cert_path: dir.join("ca-cert.pem"),
            key_path: dir.join("ca-key.pem"),
            ..Default::default()
        }
    }

    /// a csr for the given common name, signed with a fresh key.
    fn make_csr(common_name: &str) -> String {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    fn parse_cert(pem: &str) -> Vec<u8> {
        let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).unwrap();
        parsed.contents
    }

    #[tokio::test]
    async fn test_bootstrap_generates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let ca = CertificateAuthority::bootstrap(&config).await.unwrap();
        assert!(ca.ca_certificate_pem().contains("BEGIN CERTIFICATE"));
        assert!(config.cert_path.exists());
        assert!(config.key_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&config.key_path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let der = parse_cert(ca.ca_certificate_pem());
        let (_, cert) = parse_x509_certificate(&der).unwrap();
        let bc = cert.basic_constraints().unwrap().unwrap();
        assert!(bc.value.ca);
        assert_eq!(cert.tbs_certificate.raw_serial(), &[1]);
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .unwrap()
            .as_str()
            .unwrap();
        assert_eq!(cn, config.common_name);
        // root key is rsa-2048
        match cert.public_key().parsed().unwrap() {
            PublicKey::RSA(rsa) => assert_eq!(rsa.key_size(), 2048),
            other => panic!("expected rsa root key, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_reloads_same_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let first = CertificateAuthority::bootstrap(&config).await.unwrap();
        let second = CertificateAuthority::bootstrap(&config).await.unwrap();
        assert_eq!(first.ca_certificate_pem(), second.ca_certificate_pem());
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::write(&config.cert_path, "not a certificate").unwrap();
        std::fs::write(&config.key_path, "not a key").unwrap();

        let result = CertificateAuthority::bootstrap(&config).await;
        assert!(matches!(result, Err(CaError::Parse(_))));
    }

    #[tokio::test]
    async fn test_sign_csr_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::bootstrap(&test_config(dir.path()))
            .await
            .unwrap();

        let issued = ca
            .sign_csr(
                &make_csr("user-1"),
                "user-1",
                Some("mesh.example.com"),
                Some("203.0.113.9"),
            )
            .unwrap();

        let der = parse_cert(&issued.certificate_pem);
        let (_, cert) = parse_x509_certificate(&der).unwrap();

        // subject carried over verbatim
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .unwrap()
            .as_str()
            .unwrap();
        assert_eq!(cn, "user-1");

        // issuer is the root subject
        let issuer_cn = cert
            .issuer()
            .iter_common_name()
            .next()
            .unwrap()
            .as_str()
            .unwrap();
        assert_eq!(issuer_cn, CaConfig::default().common_name);

        let leaf_is_ca = cert
            .basic_constraints()
            .unwrap()
            .map(|bc| bc.value.ca)
            .unwrap_or(false);
        assert!(!leaf_is_ca);

        // serial: 16 bytes with a zero lead keeping the integer positive
        let serial = cert.tbs_certificate.raw_serial();
        assert_eq!(serial.len(), 16);
        assert_eq!(serial[0], 0);

        // validity window matches the configured hours
        let lifetime = cert.validity().not_after.timestamp()
            - cert.validity().not_before.timestamp();
        assert_eq!(lifetime, 72 * 3600);
        assert_eq!(
            issued.not_after.timestamp(),
            cert.validity().not_after.timestamp()
        );

        // san order: server wildcard, nip.io, then the public ip
        let san = cert
            .subject_alternative_name()
            .unwrap()
            .expect("leaf must carry a san extension");
        let names: Vec<String> = san
            .value
            .general_names
            .iter()
            .map(|n| match n {
                GeneralName::DNSName(d) => d.to_string(),
                GeneralName::IPAddress(b) => format!("ip:{}", b.len()),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(names[0], "*.mesh.example.com");
        assert_eq!(names[1], "*.nip.io");
        assert_eq!(names[2], "ip:4");
    }

    #[tokio::test]
    async fn test_sign_csr_without_optional_sans() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::bootstrap(&test_config(dir.path()))
            .await
            .unwrap();

        let issued = ca.sign_csr(&make_csr("user-1"), "user-1", None, None).unwrap();
        let der = parse_cert(&issued.certificate_pem);
        let (_, cert) = parse_x509_certificate(&der).unwrap();
        let san = cert.subject_alternative_name().unwrap().unwrap();
        let names: Vec<_> = san
            .value
            .general_names
            .iter()
            .filter_map(|n| match n {
                GeneralName::DNSName(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["*.nip.io"]);
    }

    #[tokio::test]
    async fn test_sign_csr_cn_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::bootstrap(&test_config(dir.path()))
            .await
            .unwrap();

        let err = ca
            .sign_csr(&make_csr("user-2"), "user-1", None, None)
            .unwrap_err();
        assert!(err.is_client_error());
        // the message names both ids
        let message = err.to_string();
        assert!(message.contains("user-1"));
        assert!(message.contains("user-2"));
    }

    #[tokio::test]
    async fn test_sign_csr_garbage_is_client_error() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::bootstrap(&test_config(dir.path()))
            .await
            .unwrap();

        let err = ca
            .sign_csr("-----BEGIN NONSENSE-----", "user-1", None, None)
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_sign_csr_ignores_unparseable_public_ip() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::bootstrap(&test_config(dir.path()))
            .await
            .unwrap();

        let issued = ca
            .sign_csr(&make_csr("user-1"), "user-1", None, Some("not-an-ip"))
            .unwrap();
        let der = parse_cert(&issued.certificate_pem);
        let (_, cert) = parse_x509_certificate(&der).unwrap();
        let san = cert.subject_alternative_name().unwrap().unwrap();
        assert!(
            san.value
                .general_names
                .iter()
                .all(|n| !matches!(n, GeneralName::IPAddress(_)))
        );
    }
}
