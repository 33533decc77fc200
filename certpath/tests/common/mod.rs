//! Certificate fixtures shared by the integration tests.
//!
//! Certificates are assembled from x509-cert structures and signed with a deterministic test
//! scheme: the signature is the SHA256 hash of the signer's public key bytes followed by the
//! to-be-signed bytes. `verify_test_signature` is registered with the PkiEnvironment to check it.

#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use certpath::*;
use der::asn1::{BitString, GeneralizedTime, Ia5String, ObjectIdentifier, OctetString, UtcTime};
use der::Encode;
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, CertificatePolicies, KeyUsage, KeyUsages, NameConstraints, PolicyMapping,
    PolicyMappings,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES, ID_CE_KEY_USAGE, ID_CE_NAME_CONSTRAINTS,
    ID_CE_POLICY_MAPPINGS,
};

pub const TEST_SIGNATURE_ALGORITHM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1.1");
pub const TEST_KEY_ALGORITHM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1.2");

/// 2020-01-01T00:00:00Z
pub const NOT_BEFORE: u64 = 1_577_836_800;
/// 2030-01-01T00:00:00Z
pub const NOT_AFTER: u64 = 1_893_456_000;
/// 2023-11-14T22:13:20Z
pub const TOI: u64 = 1_700_000_000;

pub fn test_key(seed: &str) -> SubjectPublicKeyInfoOwned {
    SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: TEST_KEY_ALGORITHM,
            parameters: None,
        },
        subject_public_key: BitString::from_bytes(&Sha256::digest(seed.as_bytes())).unwrap(),
    }
}

pub fn test_signature(signer: &SubjectPublicKeyInfoOwned, tbs: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(signer.subject_public_key.raw_bytes());
    hasher.update(tbs);
    hasher.finalize().to_vec()
}

pub fn verify_test_signature(
    _pe: &PkiEnvironment,
    message: &[u8],
    signature: &[u8],
    alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> certpath::Result<()> {
    if alg.oid != TEST_SIGNATURE_ALGORITHM || spki.algorithm.oid != TEST_KEY_ALGORITHM {
        return Err(Error::Unrecognized);
    }
    if test_signature(spki, message).as_slice() == signature {
        Ok(())
    } else {
        Err(Error::Unrecognized)
    }
}

pub fn test_environment() -> PkiEnvironment {
    let mut pe = PkiEnvironment::default();
    pe.add_validate_path_callback(validate_path_rfc5280);
    pe.add_verify_signature_message_callback(verify_test_signature);
    pe
}

pub fn test_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: TEST_SIGNATURE_ALGORITHM,
        parameters: None,
    }
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

pub fn oid(s: &str) -> ObjectIdentifier {
    ObjectIdentifier::new_unwrap(s)
}

pub fn extension<T: Encode>(extn_id: ObjectIdentifier, critical: bool, value: &T) -> Extension {
    Extension {
        extn_id,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

pub fn basic_constraints(ca: bool, path_len_constraint: Option<u8>) -> Extension {
    extension(
        ID_CE_BASIC_CONSTRAINTS,
        true,
        &BasicConstraints {
            ca,
            path_len_constraint,
        },
    )
}

pub fn key_usage(ku: KeyUsage) -> Extension {
    extension(ID_CE_KEY_USAGE, true, &ku)
}

pub fn ca_key_usage() -> Extension {
    key_usage(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
}

pub fn policies(oids: &[&str]) -> Extension {
    let cp = CertificatePolicies(
        oids.iter()
            .map(|o| PolicyInformation {
                policy_identifier: oid(o),
                policy_qualifiers: None,
            })
            .collect(),
    );
    extension(ID_CE_CERTIFICATE_POLICIES, false, &cp)
}

pub fn policy_mappings(pairs: &[(&str, &str)]) -> Extension {
    let pm = PolicyMappings(
        pairs
            .iter()
            .map(|(i, s)| PolicyMapping {
                issuer_domain_policy: oid(i),
                subject_domain_policy: oid(s),
            })
            .collect(),
    );
    extension(ID_CE_POLICY_MAPPINGS, true, &pm)
}

pub fn subtree(base: GeneralName) -> GeneralSubtree {
    GeneralSubtree {
        base,
        minimum: 0,
        maximum: None,
    }
}

pub fn dn_subtree(dn: &str) -> GeneralSubtree {
    subtree(GeneralName::DirectoryName(name(dn)))
}

pub fn dns_subtree(dns: &str) -> GeneralSubtree {
    subtree(GeneralName::DnsName(Ia5String::new(dns).unwrap()))
}

pub fn name_constraints(
    permitted: Vec<GeneralSubtree>,
    excluded: Vec<GeneralSubtree>,
) -> Extension {
    let nc = NameConstraints {
        permitted_subtrees: if permitted.is_empty() {
            None
        } else {
            Some(permitted)
        },
        excluded_subtrees: if excluded.is_empty() {
            None
        } else {
            Some(excluded)
        },
    };
    extension(ID_CE_NAME_CONSTRAINTS, true, &nc)
}

pub fn utc(secs: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

pub fn generalized(secs: u64) -> GeneralizedTime {
    GeneralizedTime::from_unix_duration(Duration::from_secs(secs)).unwrap()
}

/// Describes a certificate to be generated. The issuer defaults to the subject, i.e., self-issued.
#[derive(Clone)]
pub struct CertSpec {
    pub subject: Name,
    pub issuer: Name,
    pub serial: u32,
    pub key: SubjectPublicKeyInfoOwned,
    pub not_before: u64,
    pub not_after: u64,
    pub extensions: Vec<Extension>,
}

impl CertSpec {
    pub fn new(subject: &str, key_seed: &str) -> Self {
        CertSpec {
            subject: name(subject),
            issuer: name(subject),
            serial: 1,
            key: test_key(key_seed),
            not_before: NOT_BEFORE,
            not_after: NOT_AFTER,
            extensions: vec![],
        }
    }

    /// A CA certificate with basicConstraints and a keyUsage asserting keyCertSign
    pub fn ca(subject: &str, key_seed: &str) -> Self {
        CertSpec::new(subject, key_seed)
            .with_extension(basic_constraints(true, None))
            .with_extension(ca_key_usage())
    }

    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = name(issuer);
        self
    }

    pub fn serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn validity(mut self, not_before: u64, not_after: u64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn with_extension(mut self, ext: Extension) -> Self {
        self.extensions.push(ext);
        self
    }

    /// Replaces any existing extension of the same type
    pub fn replace_extension(mut self, ext: Extension) -> Self {
        self.extensions.retain(|e| e.extn_id != ext.extn_id);
        self.extensions.push(ext);
        self
    }

    /// Signs the certificate using the key identified by signer_seed
    pub fn sign(&self, signer_seed: &str) -> PDVCertificate {
        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::from(self.serial),
            signature: test_algorithm(),
            issuer: self.issuer.clone(),
            validity: Validity {
                not_before: utc(self.not_before),
                not_after: utc(self.not_after),
            },
            subject: self.subject.clone(),
            subject_public_key_info: self.key.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if self.extensions.is_empty() {
                None
            } else {
                Some(self.extensions.clone())
            },
        };
        let signature = test_signature(&test_key(signer_seed), &tbs.to_der().unwrap());
        let cert = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: test_algorithm(),
            signature: BitString::from_bytes(&signature).unwrap(),
        };
        PDVCertificate::try_from(cert).unwrap()
    }
}

/// Returns a self-signed CA certificate suitable for use as a trust anchor
pub fn trust_anchor(subject: &str, key_seed: &str) -> PDVCertificate {
    CertSpec::ca(subject, key_seed).sign(key_seed)
}

pub fn path(certs: &[&PDVCertificate]) -> CertificationPath {
    CertificationPath::new(certs.iter().map(|c| (*c).clone()).collect()).unwrap()
}

pub fn config() -> PathValidationConfig {
    PathValidationConfig::new(TOI, PS_MAX_PATH_LENGTH_CONSTRAINT)
}

pub fn path_status(r: certpath::Result<PathValidationResult>) -> PathValidationStatus {
    match r {
        Err(e) => e.path_validation_status().unwrap(),
        Ok(_) => panic!("expected path validation to fail"),
    }
}

pub fn failure_index(r: &certpath::Result<PathValidationResult>) -> usize {
    match r {
        Err(Error::PathValidation(pvf)) => pvf.index,
        _ => panic!("expected a path validation failure"),
    }
}
