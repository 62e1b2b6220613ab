use anyhow::{Error, Result, anyhow};
use rustls::pki_types::{CertificateDer, pem::PemObject};
use tracing::{debug, warn};
use x509_parser::{der_parser::parse_der, parse_x509_certificate};

/// Extension listing the topics a push certificate may deliver to.
pub const TOPICS_EXTENSION_OID: &str = "1.2.840.113635.100.6.3.6";

/// Returns the first topic listed in the certificate's topics extension.
///
/// Failures are logged and yield `None`; providers continue without a topic.
pub fn extract_first_topic(certificate_pem: &str) -> Option<String> {
    let der = match pem_to_der(certificate_pem) {
        Ok(der) => der,
        Err(e) => {
            warn!(error = %e, "Unable to extract topic from certificate");
            return None;
        }
    };

    let certificate = match parse_x509_certificate(&der) {
        Ok((_, certificate)) => certificate,
        Err(e) => {
            warn!(error = %e, "Unable to extract topic from certificate - not a valid X.509 certificate");
            return None;
        }
    };

    let Some(extension) = certificate
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == TOPICS_EXTENSION_OID)
    else {
        debug!("Certificate has no topics extension");
        return None;
    };

    let topic = first_string(extension.value);
    if topic.is_none() {
        warn!("Unable to extract topic from certificate - could not parse extension data");
    }
    topic
}

/// Decodes the first `CERTIFICATE` block of a PEM document.
pub fn pem_to_der(certificate_pem: &str) -> Result<CertificateDer<'static>, Error> {
    CertificateDer::from_pem_slice(certificate_pem.as_bytes())
        .map_err(|e| anyhow!("Certificate block missing or invalid: {}", e))
}

/// The extension holds `SEQUENCE { topic, SEQUENCE { .. }, topic, .. }`.
fn first_string(extension: &[u8]) -> Option<String> {
    let (_, value) = parse_der(extension).ok()?;

    value
        .as_sequence()
        .ok()?
        .iter()
        .find_map(|item| item.as_str().ok())
        .map(str::to_string)
}
