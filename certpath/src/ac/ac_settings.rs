//! Configuration for attribute certificate validation

use alloc::vec::Vec;

use crate::{asn1::attribute_certificate::Target, CertificationPath, PathValidationConfig};

/// `AcValidationConfig` aggregates the inputs to attribute certificate validation other than the
/// attribute certificate itself.
///
/// The holder and issuer paths are each validated using `path_config`. The time of interest from
/// `path_config` is also used when evaluating the validity period of the attribute certificate.
#[derive(Clone, Debug)]
pub struct AcValidationConfig {
    /// Path from a trust anchor to the holder's public key certificate
    pub holder_path: CertificationPath,
    /// Path from a trust anchor to the AC issuer's public key certificate
    pub issuer_path: CertificationPath,
    /// Targets acceptable to the caller, if targeting is to be checked
    pub targets: Option<Vec<Target>>,
    /// Configuration used when validating the holder and issuer paths
    pub path_config: PathValidationConfig,
}

impl AcValidationConfig {
    /// Creates a configuration with default path validation settings and no targets
    pub fn new(holder_path: CertificationPath, issuer_path: CertificationPath) -> Self {
        AcValidationConfig {
            holder_path,
            issuer_path,
            targets: None,
            path_config: PathValidationConfig::default(),
        }
    }

    /// Sets the targets to check against a targetInformation extension in the attribute certificate
    pub fn with_targets(mut self, targets: &[Target]) -> Self {
        self.targets = Some(targets.to_vec());
        self
    }

    /// Sets the configuration used to validate the holder and issuer paths
    pub fn with_path_config(mut self, path_config: PathValidationConfig) -> Self {
        self.path_config = path_config;
        self
    }

    /// Time of interest, as seconds since the Unix epoch. Zero disables validity checks.
    pub fn time_of_interest(&self) -> u64 {
        self.path_config.time_of_interest
    }
}
