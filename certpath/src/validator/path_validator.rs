//! Certification path validation per [RFC 5280 Section 6.1]
//!
//! [`validate_path_rfc5280`] processes the certificates following the trust anchor one at a time,
//! failing at the first violated check. The trust anchor seeds the working public key and working
//! issuer name and is not itself subjected to the per-certificate checks.
//!
//! [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use const_oid::db::rfc5912::ID_CE_NAME_CONSTRAINTS;
use der::Decode;
use log::debug;
use x509_cert::ext::pkix::KeyUsages;

use crate::{
    environment::pki_environment::PkiEnvironment, name_constraints_set::*, path_results::*,
    path_settings::*, pdv_certificate::*, pdv_extension::*, policy_tree::PolicyTree,
    util::error::*, util::pdv_utilities::*, validator_state::ValidatorState, CertificationPath,
};

/// `validate_path` validates a certification path using the [`ValidatePath`](crate::ValidatePath)
/// callbacks registered with the [`PkiEnvironment`].
pub fn validate_path(
    pe: &PkiEnvironment,
    config: &PathValidationConfig,
    path: &CertificationPath,
) -> Result<PathValidationResult> {
    pe.validate_path(config, path)
}

/// `validate_path_rfc5280` implements the [`ValidatePath`](crate::ValidatePath) interface for
/// [`PkiEnvironment`]. Signatures are verified using the environment's
/// [`VerifySignatureMessage`](crate::VerifySignatureMessage) callbacks.
///
/// For each certificate following the trust anchor, the following checks are performed in order:
/// - issuer name matches working_issuer_name ([`check_issuer`])
/// - signature verifies using working_public_key ([`verify_signature`])
/// - validity period includes the time of interest ([`check_validity`])
/// - subject and subject alternative names satisfy name constraints ([`check_names`])
/// - certificate policy processing ([`PolicyTree::process_certificate`])
/// - for all but the target, basic constraints and key usage ([`check_basic_constraints`], [`check_key_usage`])
/// - no unrecognized critical extensions are present ([`check_critical_extensions`])
pub fn validate_path_rfc5280(
    pe: &PkiEnvironment,
    config: &PathValidationConfig,
    path: &CertificationPath,
) -> Result<PathValidationResult> {
    let mut state = ValidatorState::initialize(config, path)?;

    for (pos, cert) in path.iter().enumerate().skip(1) {
        state.index = pos;
        let is_final = state.is_final();

        check_issuer(&state, cert)?;
        verify_signature(pe, &state, cert)?;
        check_validity(config, &state, cert)?;
        check_names(&state, cert, is_final)?;
        PolicyTree::process_certificate(&mut state, cert, is_final).map_err(|e| {
            log_error_for_ca(cert, format!("certificate policy processing failed: {}", e).as_str());
            e
        })?;
        if !is_final {
            check_basic_constraints(&mut state, cert)?;
            check_key_usage(&state, cert)?;
            update_name_constraints(&mut state, cert)?;
        }
        check_critical_extensions(&state, cert)?;

        state.working_public_key = cert
            .decoded_cert
            .tbs_certificate
            .subject_public_key_info
            .clone();
        state.working_issuer_name = cert.subject().clone();
        state.certificate_count += 1;
    }

    debug!(
        "Validated path with {} certificates ending with {}",
        path.len(),
        name_to_string(path.target().subject())
    );
    Ok(PathValidationResult::new(
        path.clone(),
        state.valid_policy_tree,
    ))
}

/// `check_issuer` verifies the issuer name of the certificate matches working_issuer_name.
pub fn check_issuer(state: &ValidatorState, cert: &PDVCertificate) -> Result<()> {
    if compare_names(cert.issuer(), &state.working_issuer_name) {
        return Ok(());
    }
    log_error_for_ca(cert, "issuer name does not match subject name of the preceding certificate");
    Err(Error::path(
        PathValidationStatus::IssuerMismatch,
        state.index,
        format!(
            "expected issuer {}, found {}",
            name_to_string(&state.working_issuer_name),
            name_to_string(cert.issuer())
        ),
    ))
}

/// `verify_signature` verifies the signature of the certificate using working_public_key.
pub fn verify_signature(
    pe: &PkiEnvironment,
    state: &ValidatorState,
    cert: &PDVCertificate,
) -> Result<()> {
    let defer_cert = match DeferDecodeSigned::from_der(cert.encoded_cert.as_slice()) {
        Ok(d) => d,
        Err(e) => {
            log_error_for_ca(cert, format!("failed to decode certificate: {}", e).as_str());
            return Err(Error::path(
                PathValidationStatus::SignatureInvalid,
                state.index,
                format!("failed to locate signed content: {}", e),
            ));
        }
    };

    match pe.verify_signature_message(
        &defer_cert.tbs_field,
        defer_cert.signature.raw_bytes(),
        &defer_cert.signature_algorithm,
        &state.working_public_key,
    ) {
        Ok(()) => Ok(()),
        Err(_e) => {
            log_error_for_ca(cert, "signature verification failed");
            Err(Error::path(
                PathValidationStatus::SignatureInvalid,
                state.index,
                format!(
                    "{} signature did not verify",
                    pe.oid_lookup(&defer_cert.signature_algorithm.oid)
                ),
            ))
        }
    }
}

/// `check_validity` verifies the time of interest from the configuration falls within the
/// validity period of the certificate. A time of interest of zero disables the check.
pub fn check_validity(
    config: &PathValidationConfig,
    state: &ValidatorState,
    cert: &PDVCertificate,
) -> Result<()> {
    valid_at_time(
        &cert.decoded_cert.tbs_certificate,
        config.time_of_interest,
        state.index,
        false,
    )
    .map(|_| ())
}

/// `check_names` verifies the subject name, emailAddress attributes in the subject name and
/// subject alternative names of the certificate are within the permitted subtrees and not within
/// the excluded subtrees. Self-issued certificates other than the target are not checked.
pub fn check_names(state: &ValidatorState, cert: &PDVCertificate, is_final: bool) -> Result<()> {
    if !is_final && is_self_issued(&cert.decoded_cert) {
        return Ok(());
    }

    for name in names_for_constraint_checks(cert) {
        let reason = if !state.permitted_subtrees.permits(&name) {
            "is not within the permitted subtrees"
        } else if state.excluded_subtrees.excludes(&name) {
            "is within the excluded subtrees"
        } else {
            continue;
        };
        let gn = general_name_to_string(&name);
        log_error_for_ca(cert, format!("name constraints violation: {} {}", gn, reason).as_str());
        return Err(Error::path(
            PathValidationStatus::NameConstraintViolation,
            state.index,
            format!("{} {}", gn, reason),
        ));
    }
    Ok(())
}

/// `check_basic_constraints` verifies the certificate is a CA certificate and enforces
/// max_path_length, which is decremented for certificates that are not self-issued and reduced to
/// any pathLenConstraint found in the certificate.
pub fn check_basic_constraints(state: &mut ValidatorState, cert: &PDVCertificate) -> Result<()> {
    let bc = match cert.basic_constraints() {
        Some(bc) if bc.ca => bc,
        Some(_) => {
            log_error_for_ca(cert, "basic constraints extension does not assert cA");
            return Err(Error::path(
                PathValidationStatus::NotACertificateAuthority,
                state.index,
                "basicConstraints cA is false",
            ));
        }
        None => {
            log_error_for_ca(cert, "missing basic constraints");
            return Err(Error::path(
                PathValidationStatus::NotACertificateAuthority,
                state.index,
                "basicConstraints extension is absent",
            ));
        }
    };

    if !is_self_issued(&cert.decoded_cert) {
        if state.max_path_length == 0 {
            log_error_for_ca(cert, "path length constraint violation");
            return Err(Error::path(
                PathValidationStatus::PathLengthExceeded,
                state.index,
                "max_path_length is 0",
            ));
        }
        state.max_path_length -= 1;
    }

    if let Some(pl) = bc.path_len_constraint {
        state.max_path_length = state.max_path_length.min(pl as u32);
    }
    Ok(())
}

/// `check_key_usage` verifies that a key usage extension, if present, asserts keyCertSign.
pub fn check_key_usage(state: &ValidatorState, cert: &PDVCertificate) -> Result<()> {
    match cert.key_usage() {
        Some(ku) if !ku.0.contains(KeyUsages::KeyCertSign) => {
            log_error_for_ca(cert, "key usage does not assert keyCertSign");
            Err(Error::path(
                PathValidationStatus::KeyUsageViolation,
                state.index,
                "keyUsage does not include keyCertSign",
            ))
        }
        _ => Ok(()),
    }
}

/// `update_name_constraints` folds a name constraints extension, if present, into the permitted
/// and excluded subtrees.
pub fn update_name_constraints(state: &mut ValidatorState, cert: &PDVCertificate) -> Result<()> {
    if let Some(PDVExtension::NameConstraints(nc)) = cert.get_extension(&ID_CE_NAME_CONSTRAINTS) {
        if let Some(permitted) = &nc.permitted_subtrees {
            check_name_forms(permitted, state.index)?;
            state.permitted_subtrees.calculate_intersection(permitted);
        }
        if let Some(excluded) = &nc.excluded_subtrees {
            check_name_forms(excluded, state.index)?;
            state.excluded_subtrees.calculate_union(excluded);
        }
    }
    Ok(())
}

/// `check_critical_extensions` fails if the certificate features a critical extension that is not
/// recognized. Unrecognized non-critical extensions are ignored.
pub fn check_critical_extensions(state: &ValidatorState, cert: &PDVCertificate) -> Result<()> {
    let unrecognized = cert.unrecognized_critical_extensions();
    if unrecognized.is_empty() {
        return Ok(());
    }
    let oids: Vec<String> = unrecognized.iter().map(|o| o.to_string()).collect();
    log_error_for_ca(
        cert,
        format!("unprocessed critical extension(s): {}", oids.join(", ")).as_str(),
    );
    Err(Error::path(
        PathValidationStatus::UnsupportedCriticalExtension,
        state.index,
        oids.join(", "),
    ))
}
