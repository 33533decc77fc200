//! Wrappers around asn.1 encoder/decoder structures to support certification path processing

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_INHIBIT_ANY_POLICY, ID_CE_KEY_USAGE, ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS,
    ID_CE_POLICY_MAPPINGS, ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use der::asn1::ObjectIdentifier;
use der::Decode;
use log::warn;
use x509_cert::ext::{pkix::*, Extension};

use crate::asn1::attribute_certificate::*;

/// The [`ExtensionProcessing`] trait provides a common means of extracting extensions from objects that
/// feature extensions, like Certificate or AttributeCertificate, and that retain copies of the
/// decoded extension structures, like `PDVCertificate` or `PDVAttributeCertificate`.
///
/// Extensions are decoded once when the wrapping object is created and accessed via the
/// get_extension function thereafter.
pub trait ExtensionProcessing {
    /// `get_extension` takes an ObjectIdentifier that identifies an extension type and returns
    /// a previously parsed PDVExtension instance containing the decoded extension if the extension was present.
    fn get_extension(&self, oid: &ObjectIdentifier) -> Option<&'_ PDVExtension>;

    /// `unrecognized_critical_extensions` returns the types of extensions that are marked critical but
    /// that were not understood when decoding.
    fn unrecognized_critical_extensions(&self) -> Vec<ObjectIdentifier>;
}

/// [`ParsedExtensions`] is a typedef of a BTreeMap map that associates [`PDVExtension`] objects with object
/// identifier values. This is used to avoid parsing extensions repeatedly when performing certification
/// path processing.
pub type ParsedExtensions = BTreeMap<ObjectIdentifier, PDVExtension>;

/// [`PDVExtension`] provides a wrapper for supported extension types.
#[derive(PartialEq, Clone, Eq, Debug)]
pub enum PDVExtension {
    /// Parsed BasicConstraints extension
    BasicConstraints(BasicConstraints),
    /// Parsed SubjectKeyIdentifier extension
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    /// Parsed KeyUsage extension
    KeyUsage(KeyUsage),
    /// Parsed SubjectAltName extension
    SubjectAltName(SubjectAltName),
    /// Parsed NameConstraints extension
    NameConstraints(NameConstraints),
    /// Parsed CertificatePolicies extension
    CertificatePolicies(CertificatePolicies),
    /// Parsed PolicyMappings extension
    PolicyMappings(PolicyMappings),
    /// Parsed AuthorityKeyIdentifier extension
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
    /// Parsed PolicyConstraints extension
    PolicyConstraints(PolicyConstraints),
    /// Parsed InhibitAnyPolicy extension
    InhibitAnyPolicy(InhibitAnyPolicy),
    /// Parsed AAControls extension
    AaControls(AaControls),
    /// Parsed TargetInformation extension
    TargetInformation(TargetInformation),
    /// Parsed NoRevAvail extension
    NoRevAvail,
    /// Unparsed, unrecognized extension
    Unrecognized {
        /// Value of the critical field of the extension
        critical: bool,
    },
}

/// `parse_extension` decodes the value of the given extension into the corresponding [`PDVExtension`]
/// variant. Unrecognized extension types yield [`PDVExtension::Unrecognized`].
pub fn parse_extension(ext: &Extension) -> der::Result<PDVExtension> {
    macro_rules! decode_as {
        ($t:ident) => {
            PDVExtension::$t($t::from_der(ext.extn_value.as_bytes())?)
        };
    }

    let parsed = match ext.extn_id {
        ID_CE_BASIC_CONSTRAINTS => decode_as!(BasicConstraints),
        ID_CE_SUBJECT_KEY_IDENTIFIER => decode_as!(SubjectKeyIdentifier),
        ID_CE_KEY_USAGE => decode_as!(KeyUsage),
        ID_CE_SUBJECT_ALT_NAME => decode_as!(SubjectAltName),
        ID_CE_NAME_CONSTRAINTS => decode_as!(NameConstraints),
        ID_CE_CERTIFICATE_POLICIES => decode_as!(CertificatePolicies),
        ID_CE_POLICY_MAPPINGS => decode_as!(PolicyMappings),
        ID_CE_AUTHORITY_KEY_IDENTIFIER => decode_as!(AuthorityKeyIdentifier),
        ID_CE_POLICY_CONSTRAINTS => decode_as!(PolicyConstraints),
        ID_CE_INHIBIT_ANY_POLICY => decode_as!(InhibitAnyPolicy),
        ID_PE_AA_CONTROLS => decode_as!(AaControls),
        ID_CE_TARGET_INFORMATION => {
            PDVExtension::TargetInformation(TargetInformation::from_der(ext.extn_value.as_bytes())?)
        }
        ID_CE_NO_REV_AVAIL => {
            NoRevAvail::from_der(ext.extn_value.as_bytes())?;
            PDVExtension::NoRevAvail
        }
        _ => PDVExtension::Unrecognized {
            critical: ext.critical,
        },
    };
    Ok(parsed)
}

/// `parse_extensions` decodes each extension in the given list, keyed by extension type. Where an
/// extension type appears more than once, the first instance is retained.
pub fn parse_extensions(exts: Option<&Vec<Extension>>) -> der::Result<ParsedExtensions> {
    let mut parsed = ParsedExtensions::new();
    if let Some(exts) = exts {
        for ext in exts {
            if parsed.contains_key(&ext.extn_id) {
                warn!("Ignoring duplicate instance of extension {}", ext.extn_id);
                continue;
            }
            parsed.insert(ext.extn_id, parse_extension(ext)?);
        }
    }
    Ok(parsed)
}

/// `unrecognized_critical` returns the keys of [`PDVExtension::Unrecognized`] entries marked critical.
pub(crate) fn unrecognized_critical(parsed: &ParsedExtensions) -> Vec<ObjectIdentifier> {
    parsed
        .iter()
        .filter_map(|(oid, ext)| match ext {
            PDVExtension::Unrecognized { critical: true } => Some(*oid),
            _ => None,
        })
        .collect()
}
