//! Wrappers around asn.1 encoder/decoder structures to support certification path processing

use alloc::vec::Vec;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use der::asn1::{BitString, ObjectIdentifier};
use der::{Decode, Encode};
use log::error;
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::pdv_extension::*;
use crate::util::error::*;

/// [`PDVCertificate`] is used to aggregate a binary, DER-encoded Certificate, a parsed Certificate and
/// the parsed extensions from that Certificate in support of certification path development and
/// validation operations.
///
/// Every extension is decoded when the PDVCertificate is created. Extensions that are not
/// recognized are retained as [`PDVExtension::Unrecognized`] along with their criticality.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PDVCertificate {
    /// Binary, encoded Certificate object
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    pub decoded_cert: Certificate,
    /// Parsed extensions from the Certificate
    pub parsed_extensions: ParsedExtensions,
}

impl TryFrom<&[u8]> for PDVCertificate {
    type Error = der::Error;

    fn try_from(enc_cert: &[u8]) -> der::Result<Self> {
        let cert = Certificate::from_der(enc_cert)?;
        let parsed_extensions = parse_extensions(cert.tbs_certificate.extensions.as_ref())?;
        Ok(PDVCertificate {
            encoded_cert: enc_cert.to_vec(),
            decoded_cert: cert,
            parsed_extensions,
        })
    }
}

impl TryFrom<Certificate> for PDVCertificate {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let enc_cert = cert.to_der()?;
        let parsed_extensions = parse_extensions(cert.tbs_certificate.extensions.as_ref())?;
        Ok(PDVCertificate {
            encoded_cert: enc_cert,
            decoded_cert: cert,
            parsed_extensions,
        })
    }
}

impl ExtensionProcessing for PDVCertificate {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Option<&'_ PDVExtension> {
        self.parsed_extensions.get(oid)
    }

    fn unrecognized_critical_extensions(&self) -> Vec<ObjectIdentifier> {
        unrecognized_critical(&self.parsed_extensions)
    }
}

impl PDVCertificate {
    /// Subject name of the certificate
    pub fn subject(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.subject
    }

    /// Issuer name of the certificate
    pub fn issuer(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.issuer
    }

    /// BasicConstraints extension, if present
    pub fn basic_constraints(&self) -> Option<&BasicConstraints> {
        match self.get_extension(&ID_CE_BASIC_CONSTRAINTS) {
            Some(PDVExtension::BasicConstraints(bc)) => Some(bc),
            _ => None,
        }
    }

    /// KeyUsage extension, if present
    pub fn key_usage(&self) -> Option<&KeyUsage> {
        match self.get_extension(&ID_CE_KEY_USAGE) {
            Some(PDVExtension::KeyUsage(ku)) => Some(ku),
            _ => None,
        }
    }

    /// SubjectAltName extension, if present
    pub fn subject_alt_name(&self) -> Option<&SubjectAltName> {
        match self.get_extension(&ID_CE_SUBJECT_ALT_NAME) {
            Some(PDVExtension::SubjectAltName(san)) => Some(san),
            _ => None,
        }
    }

    /// SubjectKeyIdentifier extension, if present
    pub fn subject_key_identifier(&self) -> Option<&SubjectKeyIdentifier> {
        match self.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER) {
            Some(PDVExtension::SubjectKeyIdentifier(skid)) => Some(skid),
            _ => None,
        }
    }

    /// AuthorityKeyIdentifier extension, if present
    pub fn authority_key_identifier(&self) -> Option<&AuthorityKeyIdentifier> {
        match self.get_extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER) {
            Some(PDVExtension::AuthorityKeyIdentifier(akid)) => Some(akid),
            _ => None,
        }
    }
}

/// [`DeferDecodeSigned`] used to parse only the top-level structure of a signed object, i.e., a
/// Certificate or an AttributeCertificate, without parsing the details of the to-be-signed,
/// AlgorithmIdentifier or BIT STRING fields.
///
/// Deferred decoding is useful when verifying signatures to avoid re-encoding the to-be-signed field
/// (and potentially encountering problems with structures that were not DER-encoded prior to signing).
/// This is intended to be used in tandem with a [`PDVCertificate`] structure that contains a fully-decoded
/// Certificate structure.
pub struct DeferDecodeSigned {
    /// tbsCertificate       TBSCertificate,
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_certificate = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_certificate.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

/// `parse_cert` takes a buffer containing a binary DER encoded certificate and returns
/// a [`PDVCertificate`] containing the parsed certificate if parsing was successful. The locator
/// parameter is used for logging only.
pub fn parse_cert(buffer: &[u8], locator: &str) -> Result<PDVCertificate> {
    match PDVCertificate::try_from(buffer) {
        Ok(cert) => Ok(cert),
        Err(e) => {
            error!("Failed to parse certificate from {}: {}", locator, e);
            Err(Error::Asn1Error(e))
        }
    }
}
