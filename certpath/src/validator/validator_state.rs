//! State variables carried across iterations of the certification path validation algorithm

use const_oid::db::rfc5912::ID_CE_NAME_CONSTRAINTS;
use log::debug;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::name::Name;

use crate::{
    cert_path::CertificationPath, name_constraints_set::*, path_settings::*,
    pdv_extension::*, policy_tree::PolicyTree, util::error::*,
};

/// `ValidatorState` holds the state variables described in [RFC 5280 Section 6.1.2]. A fresh
/// instance is created for each validation operation and updated once per certificate.
///
/// [RFC 5280 Section 6.1.2]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.2>
#[derive(Clone, Debug)]
pub struct ValidatorState {
    /// Position of the certificate currently being processed (the trust anchor is at 0)
    pub index: usize,
    /// Number of certificates following the trust anchor, i.e., n
    pub path_length: usize,
    /// Number of certificates processed so far
    pub certificate_count: usize,
    /// Number of non-self-issued intermediate CA certificates that may yet appear
    pub max_path_length: u32,
    /// valid_policy_tree, None when NULL
    pub valid_policy_tree: Option<PolicyTree>,
    /// explicit_policy counter
    pub explicit_policy: u32,
    /// policy_mapping counter
    pub policy_mapping: u32,
    /// inhibit_anyPolicy counter
    pub inhibit_any_policy: u32,
    /// permitted_subtrees
    pub permitted_subtrees: NameConstraintsSet,
    /// excluded_subtrees
    pub excluded_subtrees: NameConstraintsSet,
    /// working_public_key along with working_public_key_algorithm and parameters
    pub working_public_key: SubjectPublicKeyInfoOwned,
    /// working_issuer_name
    pub working_issuer_name: Name,
    /// user-initial-policy-set used during wrap-up
    pub initial_policy_set: ObjectIdentifierSet,
}

impl ValidatorState {
    /// `initialize` prepares state for validating the given path using the given configuration
    /// as described in RFC 5280 Section 6.1.2. The trust anchor seeds working_public_key and
    /// working_issuer_name. When enforce_trust_anchor_constraints is set, pathLenConstraint and name
    /// constraints from the trust anchor are factored into the initial state as per RFC 5937.
    pub fn initialize(config: &PathValidationConfig, path: &CertificationPath) -> Result<Self> {
        let ta = path.trust_anchor();
        let n = path.len() - 1;
        let counter_start = (n + 1) as u32;

        let mut max_path_length = config.max_path_length;
        let mut permitted_subtrees = config.get_initial_permitted_subtrees()?;
        let mut excluded_subtrees = config.get_initial_excluded_subtrees()?;

        if config.enforce_trust_anchor_constraints {
            if let Some(pl) = ta.basic_constraints().and_then(|bc| bc.path_len_constraint) {
                if (pl as u32) < max_path_length {
                    debug!("Trust anchor sets max_path_length to {}", pl);
                    max_path_length = pl as u32;
                }
            }
            if let Some(PDVExtension::NameConstraints(nc)) =
                ta.get_extension(&ID_CE_NAME_CONSTRAINTS)
            {
                if let Some(permitted) = &nc.permitted_subtrees {
                    check_name_forms(permitted, 0)?;
                    permitted_subtrees.calculate_intersection(permitted);
                }
                if let Some(excluded) = &nc.excluded_subtrees {
                    check_name_forms(excluded, 0)?;
                    excluded_subtrees.calculate_union(excluded);
                }
            }
        }

        Ok(ValidatorState {
            index: 0,
            path_length: n,
            certificate_count: 0,
            max_path_length,
            valid_policy_tree: Some(PolicyTree::new()),
            explicit_policy: if config.initial_explicit_policy {
                0
            } else {
                counter_start
            },
            policy_mapping: if config.initial_policy_mapping_inhibit {
                0
            } else {
                counter_start
            },
            inhibit_any_policy: if config.initial_any_policy_inhibit {
                0
            } else {
                counter_start
            },
            permitted_subtrees,
            excluded_subtrees,
            working_public_key: ta
                .decoded_cert
                .tbs_certificate
                .subject_public_key_info
                .clone(),
            working_issuer_name: ta.subject().clone(),
            initial_policy_set: config.get_initial_policy_set_as_oid_set()?,
        })
    }

    /// Returns true if the certificate at the current index is the target
    pub fn is_final(&self) -> bool {
        self.index == self.path_length
    }
}
