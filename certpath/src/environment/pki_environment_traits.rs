//! The pki_environment_traits module features trait definitions and type definitions that are used
//! by [`PkiEnvironment`] to provide functionality that supports building and/or validating X.509
//! certification paths.

use alloc::{string::String, vec::Vec};

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;

use crate::util::error::*;
use crate::{
    CertificationPath, PDVCertificate, PathValidationConfig, PathValidationResult, PkiEnvironment,
};

/// `ValidatePath` provides a function signature for implementations that perform certification path
/// validation.
pub type ValidatePath = fn(
    &PkiEnvironment,
    &PathValidationConfig, // configuration to govern validation
    &CertificationPath,    // path to verify
) -> Result<PathValidationResult>;

/// `CalculateHash` provides a function signature for implementations that perform hashing
pub type CalculateHash = fn(
    &PkiEnvironment,
    &AlgorithmIdentifierOwned, // hash alg
    &[u8],                     // buffer to hash
) -> Result<Vec<u8>>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform signature
/// verification over a message.
pub type VerifySignatureMessage = fn(
    &PkiEnvironment,
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `OidLookup` implementations take an OID and returns either a friendly name for the OID or a
/// NotFound error. Where NotFound is returned by all OidLookup implementations, the
/// [`PkiEnvironment`] returns a dot notation version of the OID.
pub type OidLookup = fn(&ObjectIdentifier) -> Result<String>;

/// The [`CertificateSource`] trait enables trait objects to provide access to candidate certificates
/// used when building certification paths.
pub trait CertificateSource {
    /// get_certificates returns a vector with references to available certificates.
    fn get_certificates(&'_ self) -> Vec<&PDVCertificate>;

    /// get_certificates_for_skid returns a vector of references to certificates corresponding to the presented SKID.
    fn get_certificates_for_skid(&self, skid: &[u8]) -> Vec<&PDVCertificate>;

    /// get_certificates_for_name returns a vector of references to certificates corresponding to the presented subject name.
    fn get_certificates_for_name(&self, name: &Name) -> Vec<&PDVCertificate>;
}
