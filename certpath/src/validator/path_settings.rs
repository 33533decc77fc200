//! Structures and functions related to configuring certification path processing operations

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::{vec, vec::Vec};
use core::str::FromStr;
use std::path::Path;

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;
use log::error;
use serde::{Deserialize, Serialize};

use crate::{util::error::*, NameConstraintsSet, NameConstraintsSettings};

/// `ObjectIdentifierSet` is a typedef for a set of ObjectIdentifier values.
pub type ObjectIdentifierSet = BTreeSet<ObjectIdentifier>;

/// Default value for the `max_path_length` field of [`PathValidationConfig`]
pub const PS_MAX_PATH_LENGTH_CONSTRAINT: u32 = 15;

fn default_initial_policy_set() -> Vec<String> {
    vec![ANY_POLICY.to_string()]
}

fn default_max_path_length() -> u32 {
    PS_MAX_PATH_LENGTH_CONSTRAINT
}

fn default_true() -> bool {
    true
}

/// `PathValidationConfig` collects the inputs to the certification path validation algorithm
/// described in [RFC 5280 Section 6.1.1]. Values are created once per validation call and are not
/// altered by validation.
///
/// The structure is serializable so that configurations can be stored as JSON and read with
/// [`read_config`]. Fields that are absent from a JSON configuration take default values.
///
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathValidationConfig {
    /// Time of interest expressed as seconds since the Unix epoch. Zero disables validity checks.
    pub time_of_interest: u64,
    /// user-initial-policy-set as dotted OID strings
    #[serde(default = "default_initial_policy_set")]
    pub initial_policy_set: Vec<String>,
    /// initial-explicit-policy
    pub initial_explicit_policy: bool,
    /// initial-policy-mapping-inhibit
    pub initial_policy_mapping_inhibit: bool,
    /// initial-any-policy-inhibit
    pub initial_any_policy_inhibit: bool,
    /// initial-permitted-subtrees, absent for an unlimited set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_permitted_subtrees: Option<NameConstraintsSettings>,
    /// initial-excluded-subtrees, absent for an empty set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_excluded_subtrees: Option<NameConstraintsSettings>,
    /// Largest number of non-self-issued intermediate CA certificates permitted
    #[serde(default = "default_max_path_length")]
    pub max_path_length: u32,
    /// Apply the path length and name constraints asserted by the trust anchor (as per RFC 5937)
    #[serde(default = "default_true")]
    pub enforce_trust_anchor_constraints: bool,
}

impl Default for PathValidationConfig {
    fn default() -> Self {
        PathValidationConfig {
            time_of_interest: 0,
            initial_policy_set: default_initial_policy_set(),
            initial_explicit_policy: false,
            initial_policy_mapping_inhibit: false,
            initial_any_policy_inhibit: false,
            initial_permitted_subtrees: None,
            initial_excluded_subtrees: None,
            max_path_length: PS_MAX_PATH_LENGTH_CONSTRAINT,
            enforce_trust_anchor_constraints: true,
        }
    }
}

impl PathValidationConfig {
    /// Creates a [`PathValidationConfig`] with the given time of interest and maximum path length
    /// and default values for other fields.
    pub fn new(time_of_interest: u64, max_path_length: u32) -> Self {
        PathValidationConfig {
            time_of_interest,
            max_path_length,
            ..Default::default()
        }
    }

    /// `get_initial_policy_set_as_oid_set` returns the initial policy set as a set of OIDs. A value
    /// that is not a valid OID, or an empty list, yields [`Error::Misconfiguration`].
    pub fn get_initial_policy_set_as_oid_set(&self) -> Result<ObjectIdentifierSet> {
        if self.initial_policy_set.is_empty() {
            error!("Initial policy set is empty");
            return Err(Error::Misconfiguration);
        }
        let mut oids = ObjectIdentifierSet::new();
        for s in &self.initial_policy_set {
            match ObjectIdentifier::from_str(s.as_str()) {
                Ok(oid) => {
                    oids.insert(oid);
                }
                Err(e) => {
                    error!("Malformed initial policy value {}: {}", s, e);
                    return Err(Error::Misconfiguration);
                }
            }
        }
        Ok(oids)
    }

    /// `set_initial_policy_set_from_oid_set` replaces the initial policy set.
    pub fn set_initial_policy_set_from_oid_set(&mut self, oids: &ObjectIdentifierSet) {
        self.initial_policy_set = oids.iter().map(|o| o.to_string()).collect();
    }

    /// Returns the initial permitted subtrees as a [`NameConstraintsSet`]
    pub fn get_initial_permitted_subtrees(&self) -> Result<NameConstraintsSet> {
        match &self.initial_permitted_subtrees {
            Some(ncs) => NameConstraintsSet::try_from(ncs),
            None => Ok(NameConstraintsSet::default()),
        }
    }

    /// Returns the initial excluded subtrees as a [`NameConstraintsSet`]
    pub fn get_initial_excluded_subtrees(&self) -> Result<NameConstraintsSet> {
        match &self.initial_excluded_subtrees {
            Some(ncs) => NameConstraintsSet::try_from(ncs),
            None => Ok(NameConstraintsSet::default()),
        }
    }

    /// Builder-style setter for initial-explicit-policy
    pub fn with_explicit_policy(mut self, v: bool) -> Self {
        self.initial_explicit_policy = v;
        self
    }

    /// Builder-style setter for the initial policy set
    pub fn with_policy_set(mut self, oids: &[ObjectIdentifier]) -> Self {
        self.initial_policy_set = oids.iter().map(|o| o.to_string()).collect();
        self
    }
}

/// `read_config` reads a JSON-encoded [`PathValidationConfig`] from the indicated file.
pub fn read_config(fname: &Path) -> Result<PathValidationConfig> {
    let json = std::fs::read(fname)?;
    serde_json::from_slice(&json).map_err(|e| {
        error!("Failed to parse {}: {}", fname.display(), e);
        Error::ParseError
    })
}

#[test]
fn default_config() {
    let config = PathValidationConfig::default();
    assert_eq!(0, config.time_of_interest);
    assert_eq!(15, config.max_path_length);
    assert!(config.enforce_trust_anchor_constraints);
    assert_eq!(
        ObjectIdentifierSet::from([ANY_POLICY]),
        config.get_initial_policy_set_as_oid_set().unwrap()
    );
    assert!(config.get_initial_permitted_subtrees().unwrap().is_empty());

    let config: PathValidationConfig = serde_json::from_str("{\"initial_explicit_policy\": true}").unwrap();
    assert!(config.initial_explicit_policy);
    assert_eq!(vec![ANY_POLICY.to_string()], config.initial_policy_set);
    assert_eq!(15, config.max_path_length);
}

#[test]
fn malformed_initial_policy_set() {
    let mut config = PathValidationConfig::default();
    config.initial_policy_set = vec!["1.3.6.1.3.1".to_string(), "not-an-oid".to_string()];
    assert_eq!(
        Err(Error::Misconfiguration),
        config.get_initial_policy_set_as_oid_set()
    );

    config.initial_policy_set.clear();
    assert_eq!(
        Err(Error::Misconfiguration),
        config.get_initial_policy_set_as_oid_set()
    );
}
