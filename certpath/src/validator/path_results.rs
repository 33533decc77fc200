//! Structures related to results from certification path processing operations

use alloc::vec::Vec;

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;
use spki::SubjectPublicKeyInfoOwned;

use crate::{CertificationPath, PDVCertificate, PolicyTree};

/// `PathValidationResult` is returned by a successful path validation operation. Failures are
/// reported as errors and no partial results are returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathValidationResult {
    /// The path that was validated
    pub certification_path: CertificationPath,
    /// valid_policy_tree after wrap-up, None when NULL
    pub policy_tree: Option<PolicyTree>,
    /// Public key from the target certificate
    pub working_public_key: SubjectPublicKeyInfoOwned,
    policies: Vec<ObjectIdentifier>,
}

impl PathValidationResult {
    /// Creates a result from a validated path and the final valid_policy_tree
    pub fn new(certification_path: CertificationPath, policy_tree: Option<PolicyTree>) -> Self {
        let n = certification_path.len() - 1;
        let policies = match &policy_tree {
            Some(t) => t
                .policies_at_depth(n)
                .into_iter()
                .filter(|p| *p != ANY_POLICY)
                .collect(),
            None => Vec::new(),
        };
        let working_public_key = certification_path
            .target()
            .decoded_cert
            .tbs_certificate
            .subject_public_key_info
            .clone();
        PathValidationResult {
            certification_path,
            policy_tree,
            working_public_key,
            policies,
        }
    }

    /// Authorized policies, i.e., the valid_policy values at the final depth of the
    /// valid_policy_tree other than anyPolicy, in tree order. The list is empty when the tree is
    /// NULL or contains only anyPolicy at the final depth.
    pub fn policies(&self) -> &[ObjectIdentifier] {
        &self.policies
    }

    /// Target certificate of the validated path
    pub fn certificate(&self) -> &PDVCertificate {
        self.certification_path.target()
    }
}
