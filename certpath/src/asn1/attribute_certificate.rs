//! Structures from [RFC 5755] to enable processing of DER-encoded attribute certificates.
//!
//! [RFC 5755]: https://datatracker.ietf.org/doc/html/rfc5755

use alloc::vec::Vec;

use der::asn1::{BitString, GeneralizedTime, Null, ObjectIdentifier};
use der::{Choice, Enumerated, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::name::{GeneralName, GeneralNames};
use x509_cert::ext::Extensions;
use x509_cert::serial_number::SerialNumber;

/// OID for the targetInformation extension: 2.5.29.55. See [`TargetInformation`].
pub const ID_CE_TARGET_INFORMATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.55");

/// OID for the noRevAvail extension: 2.5.29.56. See [`NoRevAvail`].
pub const ID_CE_NO_REV_AVAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.56");

/// OID for the aaControls extension: 1.3.6.1.5.5.7.1.6. See [`AaControls`].
pub const ID_PE_AA_CONTROLS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.6");

/// AttributeCertificate structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// AttributeCertificate ::= SEQUENCE {
///   acinfo               AttributeCertificateInfo,
///   signatureAlgorithm   AlgorithmIdentifier,
///   signatureValue       BIT STRING }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AttributeCertificate {
    pub acinfo: AttributeCertificateInfo,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature_value: BitString,
}

/// AttributeCertificateInfo structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// AttributeCertificateInfo ::= SEQUENCE {
///   version                 AttCertVersion, -- version is v2
///   holder                  Holder,
///   issuer                  AttCertIssuer,
///   signature               AlgorithmIdentifier,
///   serialNumber            CertificateSerialNumber,
///   attrCertValidityPeriod  AttCertValidityPeriod,
///   attributes              SEQUENCE OF Attribute,
///   issuerUniqueID          UniqueIdentifier OPTIONAL,
///   extensions              Extensions OPTIONAL }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AttributeCertificateInfo {
    pub version: AttCertVersion,
    pub holder: Holder,
    pub issuer: AttCertIssuer,
    pub signature: AlgorithmIdentifierOwned,
    pub serial_number: SerialNumber,
    pub attr_cert_validity_period: AttCertValidityPeriod,
    pub attributes: Vec<Attribute>,
    pub issuer_unique_id: Option<BitString>,
    pub extensions: Option<Extensions>,
}

/// AttCertVersion as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// AttCertVersion ::= INTEGER { v2(1) }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Copy, PartialEq, Eq, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum AttCertVersion {
    /// Version 2
    V2 = 1,
}

/// Holder structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// Holder ::= SEQUENCE {
///   baseCertificateID   [0] IssuerSerial OPTIONAL,
///   entityName          [1] GeneralNames OPTIONAL,
///   objectDigestInfo    [2] ObjectDigestInfo OPTIONAL }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct Holder {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub base_certificate_id: Option<IssuerSerial>,

    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub entity_name: Option<GeneralNames>,

    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub object_digest_info: Option<ObjectDigestInfo>,
}

/// DigestedObjectType as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// digestedObjectType  ENUMERATED {
///   publicKey            (0),
///   publicKeyCert        (1),
///   otherObjectTypes     (2) }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Copy, PartialEq, Eq, Enumerated)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum DigestedObjectType {
    PublicKey = 0,
    PublicKeyCert = 1,
    OtherObjectTypes = 2,
}

/// ObjectDigestInfo structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// ObjectDigestInfo ::= SEQUENCE {
///   digestedObjectType  ENUMERATED { ... },
///   otherObjectTypeID   OBJECT IDENTIFIER OPTIONAL,
///   digestAlgorithm     AlgorithmIdentifier,
///   objectDigest        BIT STRING }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct ObjectDigestInfo {
    pub digested_object_type: DigestedObjectType,
    pub other_object_type_id: Option<ObjectIdentifier>,
    pub digest_algorithm: AlgorithmIdentifierOwned,
    pub object_digest: BitString,
}

/// AttCertIssuer structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// AttCertIssuer ::= CHOICE {
///   v1Form   GeneralNames,  -- MUST NOT be used in this profile
///   v2Form   [0] V2Form }   -- v2 only
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
#[allow(missing_docs)]
pub enum AttCertIssuer {
    V1Form(GeneralNames),

    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", constructed = "true")]
    V2Form(V2Form),
}

/// V2Form structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// V2Form ::= SEQUENCE {
///   issuerName            GeneralNames  OPTIONAL,
///   baseCertificateID     [0] IssuerSerial  OPTIONAL,
///   objectDigestInfo      [1] ObjectDigestInfo  OPTIONAL }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct V2Form {
    pub issuer_name: Option<GeneralNames>,

    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub base_certificate_id: Option<IssuerSerial>,

    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub object_digest_info: Option<ObjectDigestInfo>,
}

/// IssuerSerial structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// IssuerSerial ::= SEQUENCE {
///   issuer         GeneralNames,
///   serial         CertificateSerialNumber,
///   issuerUID      UniqueIdentifier OPTIONAL }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct IssuerSerial {
    pub issuer: GeneralNames,
    pub serial: SerialNumber,
    pub issuer_uid: Option<BitString>,
}

/// AttCertValidityPeriod structure as defined in [RFC 5755 Section 4.1].
///
/// ```text
/// AttCertValidityPeriod  ::= SEQUENCE {
///   notBeforeTime  GeneralizedTime,
///   notAfterTime   GeneralizedTime }
/// ```
///
/// [RFC 5755 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.1
#[derive(Clone, Debug, Copy, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AttCertValidityPeriod {
    pub not_before_time: GeneralizedTime,
    pub not_after_time: GeneralizedTime,
}

/// TargetInformation extension as defined in [RFC 5755 Section 4.3.2].
///
/// ```text
/// TargetInformation ::= SEQUENCE OF Targets
/// ```
///
/// [RFC 5755 Section 4.3.2]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.3.2
pub type TargetInformation = Vec<Targets>;

/// Targets as defined in [RFC 5755 Section 4.3.2].
///
/// ```text
/// Targets ::= SEQUENCE OF Target
/// ```
///
/// [RFC 5755 Section 4.3.2]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.3.2
pub type Targets = Vec<Target>;

/// Target structure as defined in [RFC 5755 Section 4.3.2].
///
/// ```text
/// Target ::= CHOICE {
///   targetName     [0] GeneralName,
///   targetGroup    [1] GeneralName,
///   targetCert     [2] TargetCert }
/// ```
///
/// GeneralName is a CHOICE, so the tags on targetName and targetGroup are explicit.
///
/// [RFC 5755 Section 4.3.2]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.3.2
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
#[allow(missing_docs)]
pub enum Target {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", constructed = "true")]
    TargetName(GeneralName),

    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "true")]
    TargetGroup(GeneralName),

    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", constructed = "true")]
    TargetCert(TargetCert),
}

/// TargetCert structure as defined in [RFC 5755 Section 4.3.2].
///
/// ```text
/// TargetCert ::= SEQUENCE {
///   targetCertificate  IssuerSerial,
///   targetName         GeneralName OPTIONAL,
///   certDigestInfo     ObjectDigestInfo OPTIONAL }
/// ```
///
/// [RFC 5755 Section 4.3.2]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.3.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct TargetCert {
    pub target_certificate: IssuerSerial,
    pub target_name: Option<GeneralName>,
    pub cert_digest_info: Option<ObjectDigestInfo>,
}

/// NoRevAvail extension as defined in [RFC 5755 Section 4.3.6].
///
/// ```text
/// NoRevAvail ::= NULL
/// ```
///
/// [RFC 5755 Section 4.3.6]: https://datatracker.ietf.org/doc/html/rfc5755#section-4.3.6
pub type NoRevAvail = Null;

/// AAControls extension as defined in [RFC 5755 Section 7.4].
///
/// ```text
/// AAControls ::= SEQUENCE {
///   pathLenConstraint INTEGER (0..MAX) OPTIONAL,
///   permittedAttrs    [0] AttrSpec OPTIONAL,
///   excludedAttrs     [1] AttrSpec OPTIONAL,
///   permitUnSpecified BOOLEAN DEFAULT TRUE }
/// ```
///
/// [RFC 5755 Section 7.4]: https://datatracker.ietf.org/doc/html/rfc5755#section-7.4
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AaControls {
    pub path_len_constraint: Option<u32>,

    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub permitted_attrs: Option<AttrSpec>,

    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub excluded_attrs: Option<AttrSpec>,

    #[asn1(default = "default_true")]
    pub permit_unspecified: bool,
}

fn default_true() -> bool {
    true
}

impl AaControls {
    /// Returns true if the attribute type is acceptable per these controls: it must not be excluded
    /// and must either be permitted or unspecified with permitUnSpecified set.
    pub fn attribute_allowed(&self, attr_type: &ObjectIdentifier) -> bool {
        if let Some(excluded) = &self.excluded_attrs {
            if excluded.contains(attr_type) {
                return false;
            }
        }
        if let Some(permitted) = &self.permitted_attrs {
            if permitted.contains(attr_type) {
                return true;
            }
        }
        self.permit_unspecified
    }
}

/// AttrSpec as defined in [RFC 5755 Section 7.4].
///
/// ```text
/// AttrSpec::= SEQUENCE OF OBJECT IDENTIFIER
/// ```
///
/// [RFC 5755 Section 7.4]: https://datatracker.ietf.org/doc/html/rfc5755#section-7.4
pub type AttrSpec = Vec<ObjectIdentifier>;
