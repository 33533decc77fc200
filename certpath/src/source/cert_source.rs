//! The cert_source module provides [`CertificateBundle`], an in-memory [`CertificateSource`]
//! implementation, and [`build_path`], which assembles a [`CertificationPath`] connecting a trust
//! anchor to a target using certificates from a source.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use alloc::{format, vec};

use der::Decode;
use log::{debug, info};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoOwned;
use subtle_encoding::hex;
use x509_cert::name::Name;

use crate::{
    environment::pki_environment::PkiEnvironment, pdv_certificate::*, util::error::*,
    util::pdv_utilities::*, CertificateSource, CertificationPath, PS_MAX_PATH_LENGTH_CONSTRAINT,
};

/// `buffer_to_hex` takes a byte array and returns a string featuring upper case ASCII hex characters (without
/// commas, spaces, or brackets).
/// ```
/// use certpath::buffer_to_hex;
/// let buf :[u8; 3] = [1,2,3];
/// let bufhex = buffer_to_hex(&buf);
/// assert_eq!(bufhex, "010203");
/// ```
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    String::from_utf8(hex::encode_upper(buffer)).unwrap_or_default()
}

/// `hex_skid_from_cert` takes a certificate and returns a string featuring upper case ASCII hex
/// characters representing either the value of the SKID extension or, where the extension is
/// absent, a SHA256 hash of the subject public key.
pub fn hex_skid_from_cert(cert: &PDVCertificate) -> String {
    match cert.subject_key_identifier() {
        Some(skid) => buffer_to_hex(skid.0.as_bytes()),
        None => {
            let spki = &cert.decoded_cert.tbs_certificate.subject_public_key_info;
            let digest = Sha256::digest(spki.subject_public_key.raw_bytes()).to_vec();
            buffer_to_hex(digest.as_slice())
        }
    }
}

/// `CertificateBundle` is a set of candidate certificates indexed by subject name and by subject
/// key identifier.
#[derive(Clone, Debug, Default)]
pub struct CertificateBundle {
    certs: Vec<PDVCertificate>,
    /// Maps subject names (as strings) to indices in certs
    name_map: BTreeMap<String, Vec<usize>>,
    /// Maps hex SKID values to indices in certs
    skid_map: BTreeMap<String, Vec<usize>>,
}

impl CertificateBundle {
    /// Creates an empty bundle
    pub fn new() -> CertificateBundle {
        CertificateBundle::default()
    }

    /// `add` appends a certificate to the bundle and indexes it. Certificates already present are
    /// ignored.
    pub fn add(&mut self, cert: PDVCertificate) {
        if self
            .certs
            .iter()
            .any(|c| c.encoded_cert == cert.encoded_cert)
        {
            return;
        }

        let index = self.certs.len();
        self.name_map
            .entry(name_to_string(cert.subject()))
            .or_default()
            .push(index);
        self.skid_map
            .entry(hex_skid_from_cert(&cert))
            .or_default()
            .push(index);
        self.certs.push(cert);
    }

    /// `add_buffer` parses a DER-encoded certificate and adds it to the bundle.
    pub fn add_buffer(&mut self, buffer: &[u8], locator: &str) -> Result<()> {
        let cert = parse_cert(buffer, locator)?;
        self.add(cert);
        Ok(())
    }

    /// Number of certificates in the bundle
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns true if the bundle contains no certificates
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

impl From<Vec<PDVCertificate>> for CertificateBundle {
    fn from(certs: Vec<PDVCertificate>) -> Self {
        let mut bundle = CertificateBundle::new();
        for c in certs {
            bundle.add(c);
        }
        bundle
    }
}

impl CertificateSource for CertificateBundle {
    fn get_certificates(&'_ self) -> Vec<&PDVCertificate> {
        self.certs.iter().collect()
    }

    fn get_certificates_for_skid(&self, skid: &[u8]) -> Vec<&PDVCertificate> {
        match self.skid_map.get(&buffer_to_hex(skid)) {
            Some(indices) => indices.iter().map(|i| &self.certs[*i]).collect(),
            None => vec![],
        }
    }

    fn get_certificates_for_name(&self, name: &Name) -> Vec<&PDVCertificate> {
        if let Some(indices) = self.name_map.get(&name_to_string(name)) {
            return indices.iter().map(|i| &self.certs[*i]).collect();
        }

        // names that differ only in case or whitespace are not found via the map
        self.certs
            .iter()
            .filter(|c| compare_names(c.subject(), name))
            .collect()
    }
}

/// `find_prospective_issuers` returns certificates from the source whose subject name matches the
/// issuer name of the given certificate. Where the certificate has an authority key identifier with
/// a keyIdentifier, candidates with a matching subject key identifier are listed first.
pub fn find_prospective_issuers<'a>(
    source: &'a dyn CertificateSource,
    cert: &PDVCertificate,
) -> Vec<&'a PDVCertificate> {
    let mut candidates = source.get_certificates_for_name(cert.issuer());

    let akid_hex = cert
        .authority_key_identifier()
        .and_then(|akid| akid.key_identifier.as_ref())
        .map(|kid| buffer_to_hex(kid.as_bytes()));
    if let Some(akid_hex) = akid_hex {
        // stable sort keeps bundle order among equally ranked candidates
        candidates.sort_by_key(|c| hex_skid_from_cert(c) != akid_hex);
    }
    candidates
}

fn issued_by(pe: &PkiEnvironment, cert: &PDVCertificate, spki: &SubjectPublicKeyInfoOwned) -> bool {
    match DeferDecodeSigned::from_der(cert.encoded_cert.as_slice()) {
        Ok(defer_cert) => pe
            .verify_signature_message(
                &defer_cert.tbs_field,
                defer_cert.signature.raw_bytes(),
                &defer_cert.signature_algorithm,
                spki,
            )
            .is_ok(),
        Err(_) => false,
    }
}

fn pub_key_in_path(candidate: &PDVCertificate, partial_path: &[&PDVCertificate]) -> bool {
    let spki = &candidate.decoded_cert.tbs_certificate.subject_public_key_info;
    partial_path
        .iter()
        .any(|c| &c.decoded_cert.tbs_certificate.subject_public_key_info == spki)
}

// partial_path runs from the target toward the anchor
fn find_chains<'a>(
    pe: &PkiEnvironment,
    anchor: &PDVCertificate,
    source: &'a dyn CertificateSource,
    partial_path: &mut Vec<&'a PDVCertificate>,
    shortest: &mut Option<Vec<&'a PDVCertificate>>,
) {
    if let Some(s) = shortest {
        if partial_path.len() >= s.len() {
            return;
        }
    }

    let current = match partial_path.last() {
        Some(c) => *c,
        None => return,
    };

    let anchor_spki = &anchor.decoded_cert.tbs_certificate.subject_public_key_info;
    if compare_names(current.issuer(), anchor.subject()) && issued_by(pe, current, anchor_spki) {
        *shortest = Some(partial_path.clone());
        return;
    }

    // the target plus intermediates may not exceed the maximum path length
    if partial_path.len() > PS_MAX_PATH_LENGTH_CONSTRAINT as usize {
        return;
    }

    for candidate in find_prospective_issuers(source, current) {
        if candidate.encoded_cert == anchor.encoded_cert
            || is_self_signed(pe, candidate)
            || pub_key_in_path(candidate, partial_path)
            || candidate.decoded_cert.tbs_certificate.subject_public_key_info == *anchor_spki
        {
            continue;
        }
        let candidate_spki = &candidate.decoded_cert.tbs_certificate.subject_public_key_info;
        if !issued_by(pe, current, candidate_spki) {
            continue;
        }

        partial_path.push(candidate);
        find_chains(pe, anchor, source, partial_path, shortest);
        partial_path.pop();
    }
}

/// `build_path` searches the source for a chain of certificates connecting the anchor to the target.
///
/// The search proceeds from the target toward the anchor. At each step, candidates whose subject
/// name matches the issuer name of the current certificate and whose public key verifies the
/// signature on the current certificate are considered. Self-signed candidates and candidates whose
/// public key already appears in the partial path are skipped. The search depth is bounded by
/// [`PS_MAX_PATH_LENGTH_CONSTRAINT`]. Where more than one chain is found, the shortest is returned.
///
/// Where anchor and target are the same certificate, the resulting path contains that certificate
/// only. A [`Error::PathBuilding`] error is returned if no chain could be found.
pub fn build_path(
    pe: &PkiEnvironment,
    anchor: &PDVCertificate,
    target: &PDVCertificate,
    source: &dyn CertificateSource,
) -> Result<CertificationPath> {
    if anchor.encoded_cert == target.encoded_cert {
        return CertificationPath::new(vec![anchor.clone()]);
    }

    let mut partial_path = vec![target];
    let mut shortest = None;
    find_chains(pe, anchor, source, &mut partial_path, &mut shortest);

    match shortest {
        Some(chain) => {
            let mut certificates = Vec::with_capacity(chain.len() + 1);
            certificates.push(anchor.clone());
            certificates.extend(chain.into_iter().rev().cloned());
            debug!(
                "Built path with {} certificates for {}",
                certificates.len(),
                name_to_string(target.subject())
            );
            CertificationPath::new(certificates)
        }
        None => {
            let msg = format!(
                "no path found from {} to {}",
                name_to_string(anchor.subject()),
                name_to_string(target.subject())
            );
            info!("{}", msg);
            Err(Error::PathBuilding(msg))
        }
    }
}

#[test]
fn hex_test() {
    assert_eq!("", buffer_to_hex(&[]));
    assert_eq!("00FFA0", buffer_to_hex(&[0x00, 0xff, 0xa0]));
    let bundle = CertificateBundle::new();
    assert!(bundle.is_empty());
    assert!(bundle.get_certificates_for_skid(&[1, 2, 3]).is_empty());
}
