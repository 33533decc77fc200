//! Wrapper around a decoded attribute certificate to support attribute certificate validation

use alloc::vec::Vec;

use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use log::error;

use crate::{asn1::attribute_certificate::*, pdv_extension::*, util::error::*};

/// [`PDVAttributeCertificate`] aggregates a binary, DER-encoded AttributeCertificate, the parsed
/// AttributeCertificate and the parsed extensions from it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PDVAttributeCertificate {
    /// Binary, encoded AttributeCertificate object
    pub encoded_ac: Vec<u8>,
    /// Decoded AttributeCertificate object
    pub decoded_ac: AttributeCertificate,
    /// Parsed extensions from the AttributeCertificate
    pub parsed_extensions: ParsedExtensions,
}

impl TryFrom<&[u8]> for PDVAttributeCertificate {
    type Error = der::Error;

    fn try_from(enc_ac: &[u8]) -> der::Result<Self> {
        let ac = AttributeCertificate::from_der(enc_ac)?;
        let parsed_extensions = parse_extensions(ac.acinfo.extensions.as_ref())?;
        Ok(PDVAttributeCertificate {
            encoded_ac: enc_ac.to_vec(),
            decoded_ac: ac,
            parsed_extensions,
        })
    }
}

impl TryFrom<AttributeCertificate> for PDVAttributeCertificate {
    type Error = der::Error;

    fn try_from(ac: AttributeCertificate) -> der::Result<Self> {
        let encoded_ac = ac.to_der()?;
        let parsed_extensions = parse_extensions(ac.acinfo.extensions.as_ref())?;
        Ok(PDVAttributeCertificate {
            encoded_ac,
            decoded_ac: ac,
            parsed_extensions,
        })
    }
}

impl ExtensionProcessing for PDVAttributeCertificate {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Option<&'_ PDVExtension> {
        self.parsed_extensions.get(oid)
    }

    fn unrecognized_critical_extensions(&self) -> Vec<ObjectIdentifier> {
        unrecognized_critical(&self.parsed_extensions)
    }
}

impl PDVAttributeCertificate {
    /// Holder field of the attribute certificate
    pub fn holder(&self) -> &Holder {
        &self.decoded_ac.acinfo.holder
    }

    /// AttCertIssuer field of the attribute certificate
    pub fn issuer(&self) -> &AttCertIssuer {
        &self.decoded_ac.acinfo.issuer
    }

    /// TargetInformation extension, if present
    pub fn target_information(&self) -> Option<&TargetInformation> {
        match self.get_extension(&ID_CE_TARGET_INFORMATION) {
            Some(PDVExtension::TargetInformation(ti)) => Some(ti),
            _ => None,
        }
    }

    /// Types of the attributes carried by the attribute certificate
    pub fn attribute_types(&self) -> Vec<ObjectIdentifier> {
        self.decoded_ac
            .acinfo
            .attributes
            .iter()
            .map(|a| a.oid)
            .collect()
    }
}

/// `parse_attribute_certificate` takes a buffer containing a binary DER encoded attribute
/// certificate and returns a [`PDVAttributeCertificate`]. The locator parameter is used for logging
/// only.
pub fn parse_attribute_certificate(buffer: &[u8], locator: &str) -> Result<PDVAttributeCertificate> {
    match PDVAttributeCertificate::try_from(buffer) {
        Ok(ac) => Ok(ac),
        Err(e) => {
            error!("Failed to parse attribute certificate from {}: {}", locator, e);
            Err(Error::Asn1Error(e))
        }
    }
}
