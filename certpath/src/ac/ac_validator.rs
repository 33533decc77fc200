//! Attribute certificate validation per [RFC 5755 Section 5]
//!
//! The holder and issuer certification paths are validated first. The attribute certificate is
//! then matched against the targets of those paths, its signature is verified using the AC
//! issuer's public key, and its validity period, targeting information and attributes are checked.
//!
//! [RFC 5755 Section 5]: <https://datatracker.ietf.org/doc/html/rfc5755#section-5>

use alloc::{format, string::String, vec::Vec};

use der::Decode;
use log::{debug, error};
use x509_cert::ext::pkix::name::{GeneralName, GeneralNames};
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::name::Name;

use crate::{
    ac::{ac_settings::*, pdv_attribute_certificate::*},
    asn1::attribute_certificate::*,
    environment::pki_environment::PkiEnvironment,
    pdv_extension::*,
    util::{error::*, pdv_utilities::*},
    validate_path, DeferDecodeSigned, PDVCertificate,
};

/// `AcValidator` validates an attribute certificate relative to the holder and issuer paths in an
/// [`AcValidationConfig`].
pub struct AcValidator<'a> {
    pe: &'a PkiEnvironment,
    ac: &'a PDVAttributeCertificate,
    config: &'a AcValidationConfig,
}

impl<'a> AcValidator<'a> {
    /// Creates a validator for the given attribute certificate and configuration
    pub fn new(
        pe: &'a PkiEnvironment,
        ac: &'a PDVAttributeCertificate,
        config: &'a AcValidationConfig,
    ) -> Self {
        AcValidator { pe, ac, config }
    }

    /// `validate` performs the following checks in order, failing at the first that does not pass:
    /// - the holder path validates ([`AcValidationStatus::InvalidHolderPath`])
    /// - the Holder field matches the target of the holder path ([`AcValidationStatus::HolderMismatch`])
    /// - the issuer path validates ([`AcValidationStatus::InvalidIssuerPath`])
    /// - the AttCertIssuer field matches the target of the issuer path ([`AcValidationStatus::IssuerMismatch`])
    /// - the target of the issuer path may issue attribute certificates ([`AcValidationStatus::InvalidIssuerPath`])
    /// - the signature verifies ([`AcValidationStatus::SignatureInvalid`])
    /// - no critical extension is unrecognized ([`AcValidationStatus::UnsupportedCriticalExtension`])
    /// - the validity period includes the time of interest ([`AcValidationStatus::NotYetValid`], [`AcValidationStatus::Expired`])
    /// - targeting information includes a configured target ([`AcValidationStatus::TargetMismatch`])
    /// - attributes are allowed by aaControls on the issuer path ([`AcValidationStatus::AttributeNotPermitted`])
    ///
    /// On success, the attribute certificate is returned unchanged.
    pub fn validate(&self) -> Result<&'a PDVAttributeCertificate> {
        let config = self.config;

        if let Err(e) = validate_path(self.pe, &config.path_config, &config.holder_path) {
            error!("Holder path failed validation: {}", error_summary(&e));
            return Err(AcValidationFailure::with_source(
                AcValidationStatus::InvalidHolderPath,
                "holder path failed validation",
                e,
            )
            .into());
        }
        self.check_holder(config.holder_path.target())?;

        if let Err(e) = validate_path(self.pe, &config.path_config, &config.issuer_path) {
            error!("Issuer path failed validation: {}", error_summary(&e));
            return Err(AcValidationFailure::with_source(
                AcValidationStatus::InvalidIssuerPath,
                "issuer path failed validation",
                e,
            )
            .into());
        }
        let issuer_cert = config.issuer_path.target();
        self.check_issuer(issuer_cert)?;
        self.check_issuer_profile()?;
        self.verify_signature(issuer_cert)?;
        self.check_critical_extensions()?;
        self.check_validity()?;
        self.check_targets()?;
        self.check_attributes()?;

        debug!(
            "Validated attribute certificate issued by {} to {}",
            name_to_string(issuer_cert.subject()),
            name_to_string(config.holder_path.target().subject())
        );
        Ok(self.ac)
    }

    // Each identifying form present in the Holder field must identify the holder certificate. A
    // Holder carrying only objectDigestInfo identifies no certificate.
    fn check_holder(&self, holder_cert: &PDVCertificate) -> Result<()> {
        let holder = self.ac.holder();
        let mut matched = holder.base_certificate_id.is_some() || holder.entity_name.is_some();
        if let Some(is) = &holder.base_certificate_id {
            matched &= issuer_serial_matches(is, holder_cert);
        }
        if let Some(names) = &holder.entity_name {
            let mut subjects = Vec::from([holder_cert.subject()]);
            if let Some(san) = holder_cert.subject_alt_name() {
                subjects.extend(san.0.iter().filter_map(|gn| match gn {
                    GeneralName::DirectoryName(dn) => Some(dn),
                    _ => None,
                }));
            }
            matched &= subjects.iter().any(|s| contains_dn(names, s));
        }

        if matched {
            return Ok(());
        }
        let msg = format!(
            "holder does not identify {}",
            name_to_string(holder_cert.subject())
        );
        error!("Holder mismatch: {}", msg);
        Err(Error::ac(AcValidationStatus::HolderMismatch, msg))
    }

    fn check_issuer(&self, issuer_cert: &PDVCertificate) -> Result<()> {
        let names = match self.ac.issuer() {
            AttCertIssuer::V1Form(names) => Some(names),
            AttCertIssuer::V2Form(v2) => v2.issuer_name.as_ref(),
        };
        if let Some(names) = names {
            if contains_dn(names, issuer_cert.subject()) {
                return Ok(());
            }
        }
        let msg = format!(
            "issuer does not identify {}",
            name_to_string(issuer_cert.subject())
        );
        error!("Issuer mismatch: {}", msg);
        Err(Error::ac(AcValidationStatus::IssuerMismatch, msg))
    }

    // The AC issuer must be an end entity with respect to the PKC hierarchy. pathLenConstraint
    // values in aaControls bound the number of certificates between the asserting certificate and
    // the AC issuer certificate.
    fn check_issuer_profile(&self) -> Result<()> {
        let path = &self.config.issuer_path;
        let issuer_cert = path.target();

        if let Some(bc) = issuer_cert.basic_constraints() {
            if bc.ca {
                log_error_for_ca(issuer_cert, "AC issuer certificate asserts cA");
                return Err(Error::ac(
                    AcValidationStatus::InvalidIssuerPath,
                    "AC issuer certificate asserts cA in basicConstraints",
                ));
            }
        }
        if let Some(ku) = issuer_cert.key_usage() {
            if !ku.0.contains(KeyUsages::DigitalSignature) {
                log_error_for_ca(issuer_cert, "AC issuer key usage lacks digitalSignature");
                return Err(Error::ac(
                    AcValidationStatus::InvalidIssuerPath,
                    "AC issuer keyUsage does not include digitalSignature",
                ));
            }
        }

        let last = path.len() - 1;
        for (pos, cert) in path.iter().enumerate() {
            if let Some(PDVExtension::AaControls(aac)) = cert.get_extension(&ID_PE_AA_CONTROLS) {
                if let Some(pl) = aac.path_len_constraint {
                    let below = last.saturating_sub(pos + 1);
                    if below > pl as usize {
                        log_error_for_ca(cert, "aaControls path length constraint violation");
                        return Err(Error::ac(
                            AcValidationStatus::InvalidIssuerPath,
                            format!(
                                "aaControls pathLenConstraint {} at certificate #{} exceeded by {} certificates",
                                pl, pos, below
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_signature(&self, issuer_cert: &PDVCertificate) -> Result<()> {
        let defer_ac = match DeferDecodeSigned::from_der(self.ac.encoded_ac.as_slice()) {
            Ok(d) => d,
            Err(e) => {
                return Err(Error::ac(
                    AcValidationStatus::SignatureInvalid,
                    format!("failed to locate signed content: {}", e),
                ))
            }
        };

        let spki = &issuer_cert.decoded_cert.tbs_certificate.subject_public_key_info;
        match self.pe.verify_signature_message(
            &defer_ac.tbs_field,
            defer_ac.signature.raw_bytes(),
            &defer_ac.signature_algorithm,
            spki,
        ) {
            Ok(()) => Ok(()),
            Err(_e) => {
                error!("Attribute certificate signature verification failed");
                Err(Error::ac(
                    AcValidationStatus::SignatureInvalid,
                    format!(
                        "{} signature did not verify",
                        self.pe.oid_lookup(&defer_ac.signature_algorithm.oid)
                    ),
                ))
            }
        }
    }

    fn check_critical_extensions(&self) -> Result<()> {
        let unrecognized = self.ac.unrecognized_critical_extensions();
        if unrecognized.is_empty() {
            return Ok(());
        }
        let oids: Vec<String> = unrecognized.iter().map(|o| o.to_string()).collect();
        error!(
            "Attribute certificate features unprocessed critical extension(s): {}",
            oids.join(", ")
        );
        Err(Error::ac(
            AcValidationStatus::UnsupportedCriticalExtension,
            oids.join(", "),
        ))
    }

    fn check_validity(&self) -> Result<()> {
        let period = &self.ac.decoded_ac.acinfo.attr_cert_validity_period;
        let toi = self.config.time_of_interest();
        let nb = period.not_before_time.to_unix_duration().as_secs();
        let na = period.not_after_time.to_unix_duration().as_secs();
        match check_validity_window(nb, na, toi) {
            Ok(_) => Ok(()),
            Err(ValidityWindowFault::NotYetValid) => Err(Error::ac(
                AcValidationStatus::NotYetValid,
                format!("notBeforeTime {} is after {}", nb, toi),
            )),
            Err(ValidityWindowFault::Expired) => Err(Error::ac(
                AcValidationStatus::Expired,
                format!("notAfterTime {} is before {}", na, toi),
            )),
        }
    }

    fn check_targets(&self) -> Result<()> {
        let (required, ti) = match (&self.config.targets, self.ac.target_information()) {
            (Some(required), Some(ti)) => (required, ti),
            _ => return Ok(()),
        };

        if ti.iter().flatten().any(|t| required.contains(t)) {
            return Ok(());
        }
        error!("Attribute certificate is not targeted at any configured target");
        Err(Error::ac(
            AcValidationStatus::TargetMismatch,
            "none of the configured targets appear in targetInformation",
        ))
    }

    fn check_attributes(&self) -> Result<()> {
        let controls: Vec<&AaControls> = self
            .config
            .issuer_path
            .iter()
            .filter_map(|c| match c.get_extension(&ID_PE_AA_CONTROLS) {
                Some(PDVExtension::AaControls(aac)) => Some(aac),
                _ => None,
            })
            .collect();
        if controls.is_empty() {
            return Ok(());
        }

        for attr_type in self.ac.attribute_types() {
            if !controls.iter().all(|aac| aac.attribute_allowed(&attr_type)) {
                let name: String = self.pe.oid_lookup(&attr_type);
                error!("Attribute {} is not permitted by aaControls", name);
                return Err(Error::ac(AcValidationStatus::AttributeNotPermitted, name));
            }
        }
        Ok(())
    }
}

fn contains_dn(names: &GeneralNames, dn: &Name) -> bool {
    names.iter().any(|gn| match gn {
        GeneralName::DirectoryName(n) => compare_names(n, dn),
        _ => false,
    })
}

fn issuer_serial_matches(is: &IssuerSerial, cert: &PDVCertificate) -> bool {
    let tbs = &cert.decoded_cert.tbs_certificate;
    if !contains_dn(&is.issuer, &tbs.issuer) || is.serial != tbs.serial_number {
        return false;
    }
    match &is.issuer_uid {
        Some(uid) => tbs.issuer_unique_id.as_ref() == Some(uid),
        None => true,
    }
}

/// `validate_attribute_certificate` validates an attribute certificate using the holder and issuer
/// paths from the given configuration. See [`AcValidator::validate`].
pub fn validate_attribute_certificate<'a>(
    pe: &'a PkiEnvironment,
    ac: &'a PDVAttributeCertificate,
    config: &'a AcValidationConfig,
) -> Result<&'a PDVAttributeCertificate> {
    AcValidator::new(pe, ac, config).validate()
}
