//! Provides a structure that represents a certification path, i.e., a trust anchor, zero or more
//! intermediate CA certificates and a target certificate.

use alloc::vec::Vec;

use crate::{
    source::cert_source::build_path, util::error::*, CertificateSource, PDVCertificate,
    PathValidationConfig, PathValidationResult, PkiEnvironment,
};

/// `CertificationPath` is an ordered sequence of certificates beginning with a trust anchor and
/// ending with a target certificate. A path always contains at least one certificate. Where a path
/// contains exactly one certificate, that certificate is both the trust anchor and the target.
///
/// Each adjacent pair is expected to represent an issuer and subject, but that is not checked
/// until the path is validated.
#[derive(Clone, Debug, Eq, PartialEq)]
#[readonly::make]
pub struct CertificationPath {
    /// `certificates` contains the trust anchor at index 0 followed by intermediate CA certificates
    /// and the target certificate in the last position
    #[readonly]
    pub certificates: Vec<PDVCertificate>,
}

impl CertificationPath {
    /// Creates a new `CertificationPath` from the given certificates, which must be ordered from
    /// the trust anchor to the target. An empty vector yields a MissingCertificate error.
    pub fn new(certificates: Vec<PDVCertificate>) -> Result<Self> {
        if certificates.is_empty() {
            return Err(Error::path(
                PathValidationStatus::MissingCertificate,
                0,
                "a certification path requires at least one certificate",
            ));
        }
        Ok(CertificationPath { certificates })
    }

    /// `from_trust_anchor_to_target` builds a path connecting anchor to target using certificates
    /// from the given source. See [`build_path`].
    pub fn from_trust_anchor_to_target(
        pe: &PkiEnvironment,
        anchor: &PDVCertificate,
        target: &PDVCertificate,
        source: &dyn CertificateSource,
    ) -> Result<Self> {
        build_path(pe, anchor, target, source)
    }

    /// Number of certificates in the path, including the trust anchor
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always false, since a path contains at least one certificate
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Iterates over the certificates from the trust anchor to the target
    pub fn iter(&self) -> core::slice::Iter<'_, PDVCertificate> {
        self.certificates.iter()
    }

    /// First certificate in the path
    pub fn trust_anchor(&self) -> &PDVCertificate {
        &self.certificates[0]
    }

    /// Last certificate in the path
    pub fn target(&self) -> &PDVCertificate {
        &self.certificates[self.certificates.len() - 1]
    }

    /// Certificates between the trust anchor and the target
    pub fn intermediates(&self) -> &[PDVCertificate] {
        if self.certificates.len() < 3 {
            &[]
        } else {
            &self.certificates[1..self.certificates.len() - 1]
        }
    }

    /// `starts_with` returns true if the leading certificates of the path are exactly the given
    /// certificates, in order.
    pub fn starts_with(&self, certs: &[PDVCertificate]) -> bool {
        if certs.len() > self.certificates.len() {
            return false;
        }
        self.certificates
            .iter()
            .zip(certs.iter())
            .all(|(l, r)| l.encoded_cert == r.encoded_cert)
    }

    /// `validate` validates the path using the given environment and configuration.
    pub fn validate(
        &self,
        pe: &PkiEnvironment,
        config: &PathValidationConfig,
    ) -> Result<PathValidationResult> {
        pe.validate_path(config, self)
    }
}
