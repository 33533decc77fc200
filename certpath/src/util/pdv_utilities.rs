//! Utility functions that support certification path processing

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::net::IpAddr;

use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;

use der::asn1::{Ia5String, ObjectIdentifier, PrintableString, Utf8StringRef};
use der::{Decode, Encode, Tagged};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::{constraints::name::GeneralSubtree, name::GeneralName};
use x509_cert::name::Name;
use x509_cert::{Certificate, TbsCertificate};

use crate::{
    environment::pki_environment::PkiEnvironment, pdv_certificate::*, util::error::*,
    util::pdv_alg_oids::*,
};

lazy_static! {
    static ref WHITESPACE_RE: Option<Regex> = Regex::new(r"\s+").ok();
    static ref EMAIL_RE: Option<Regex> =
        Regex::new("^[^@\\s]+@([a-z0-9]+([-.][a-z0-9]+)*)$").ok();
}

/// `is_self_signed_with_buffer` returns true if the public key in the parsed certificate can be
/// used to verify the TBSCertificate field as parsed from the encoded certificate object.
pub fn is_self_signed_with_buffer(
    pe: &PkiEnvironment,
    cert: &Certificate,
    enc_cert: &[u8],
) -> bool {
    match DeferDecodeSigned::from_der(enc_cert) {
        Ok(defer_cert) => pe
            .verify_signature_message(
                &defer_cert.tbs_field,
                cert.signature.raw_bytes(),
                &cert.tbs_certificate.signature,
                &cert.tbs_certificate.subject_public_key_info,
            )
            .is_ok(),
        Err(e) => {
            error!(
                "Failed to defer decode certificate in is_self_signed with: {}",
                e
            );
            false
        }
    }
}

/// `is_self_signed` returns true if the public key in the certificate can be used to verify the
/// signature on the certificate.
pub fn is_self_signed(pe: &PkiEnvironment, cert: &PDVCertificate) -> bool {
    is_self_issued(&cert.decoded_cert)
        && is_self_signed_with_buffer(pe, &cert.decoded_cert, cert.encoded_cert.as_slice())
}

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// Indicates which end of a validity window a time of interest fell outside of
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValidityWindowFault {
    /// The time of interest is before the start of the window
    NotYetValid,
    /// The time of interest is after the end of the window
    Expired,
}

/// `check_validity_window` compares a time of interest with a window expressed as seconds since the
/// Unix epoch. A time of interest of zero disables the check. The number of seconds left in the
/// window is returned on success. The start of the window is evaluated first.
pub fn check_validity_window(
    not_before: u64,
    not_after: u64,
    toi: u64,
) -> core::result::Result<u64, ValidityWindowFault> {
    if 0 == toi {
        return Ok(0);
    }
    if not_before > toi {
        return Err(ValidityWindowFault::NotYetValid);
    }
    if not_after < toi {
        return Err(ValidityWindowFault::Expired);
    }
    Ok(not_after - toi)
}

/// `valid_at_time` evaluates the not_before and not_after fields of the given TBSCertificate instance
/// and provides an indication of validity relative to presented time of interest.
///
/// It returns the number of seconds left to live if the certificate is valid at the given time or
/// an error indicating which field failed if the certificate is not valid. The not_before field is
/// evaluated first. The `index` parameter is the position of the certificate in the path being
/// validated and is included in the error.
///
/// To stifle logging output upon error, pass true for the stifle_log parameter.
pub fn valid_at_time(
    target: &TbsCertificate,
    toi: u64,
    index: usize,
    stifle_log: bool,
) -> Result<u64> {
    let nb = target.validity.not_before.to_unix_duration().as_secs();
    let na = target.validity.not_after.to_unix_duration().as_secs();
    match check_validity_window(nb, na, toi) {
        Ok(ttl) => Ok(ttl),
        Err(ValidityWindowFault::NotYetValid) => {
            if !stifle_log {
                log_error_for_name(&target.subject, "certificate is not yet valid, i.e., not_before is after the configured time of interest");
            }
            Err(Error::path(
                PathValidationStatus::NotYetValid,
                index,
                format!("notBefore {} is after {}", target.validity.not_before, toi),
            ))
        }
        Err(ValidityWindowFault::Expired) => {
            if !stifle_log {
                log_error_for_name(
                    &target.subject,
                    format!(
                        "certificate is expired relative to the configured time of interest: {}",
                        target.validity.not_after
                    )
                    .as_str(),
                );
            }
            Err(Error::path(
                PathValidationStatus::Expired,
                index,
                format!("notAfter {} is before {}", target.validity.not_after, toi),
            ))
        }
    }
}

/// `descended_from_host` returns true if `cand` is equal to or a subdomain of the host or domain
/// name given by `base`. Comparison is case-insensitive and respects label boundaries. A `base`
/// value with a leading period matches subdomains only. An empty `base` matches every host.
pub(crate) fn descended_from_host(base: &str, cand: &str) -> bool {
    let base = base.trim_end_matches('.').to_lowercase();
    let cand = cand.trim_end_matches('.').to_lowercase();

    if base.is_empty() {
        return true;
    }
    if base.starts_with('.') {
        return cand.len() > base.len() && cand.ends_with(base.as_str());
    }
    if cand == base {
        return true;
    }
    cand.len() > base.len()
        && cand.ends_with(base.as_str())
        && cand.as_bytes()[cand.len() - base.len() - 1] == b'.'
}

/// `is_email` returns true if addr looks like a mailbox, i.e., local-part@domain.
pub(crate) fn is_email(addr: &str) -> bool {
    match EMAIL_RE.as_ref() {
        Some(re) => re.is_match(addr.to_lowercase().as_str()),
        None => false,
    }
}

/// `descended_from_rfc822` returns true if new_name is equal to or descended from prev_name and false
/// otherwise.
///
/// A constraint containing an @ character matches that mailbox only. A constraint that begins with a
/// period matches any mailbox within a subdomain of the constraint. Other constraints match any
/// mailbox on that host.
pub(crate) fn descended_from_rfc822(prev_name: &Ia5String, new_name: &Ia5String) -> bool {
    let base = prev_name.to_string();
    let cand = new_name.to_string();

    if !is_email(cand.as_str()) {
        return false;
    }

    if base.contains('@') {
        // local part is case sensitive, host is not
        return match (base.rsplit_once('@'), cand.rsplit_once('@')) {
            (Some((bl, bh)), Some((cl, ch))) => bl == cl && bh.eq_ignore_ascii_case(ch),
            _ => false,
        };
    }

    let host = match cand.rsplit_once('@') {
        Some((_, h)) => h.to_lowercase(),
        None => return false,
    };
    let base = base.to_lowercase();
    if base.starts_with('.') {
        host.len() > base.len() && host.ends_with(base.as_str())
    } else {
        host == base
    }
}

/// `descended_from_dn` returns true if new_name is equal to or descended from prev_name and false otherwise.
///
/// The number of RDNs by which name extends subtree must be at least min and, if max is present, no
/// more than max.
pub(crate) fn descended_from_dn(subtree: &Name, name: &Name, min: u32, max: Option<u32>) -> bool {
    //if descendant fewer rdns then it is not a descendant
    if subtree.0.len() > name.0.len() {
        return false;
    }

    let diff = (name.0.len() - subtree.0.len()) as u32;
    if diff < min {
        return false;
    }
    if let Some(max) = max {
        if diff > max {
            return false;
        }
    }

    for (l, r) in subtree.0.iter().zip(name.0.iter()) {
        if l == r {
            continue;
        }

        // different number of attributes
        if l.0.len() != r.0.len() {
            return false;
        }

        for (la, ra) in l.0.iter().zip(r.0.iter()) {
            if la.oid != ra.oid {
                return false;
            }
            if la.value.value() == ra.value.value() {
                if la.value.tag() != ra.value.tag() {
                    debug!(
                        "Permitting a DN name constraint match despite different character sets"
                    );
                }
            } else if !atav_values_match(la, ra) {
                return false;
            }
        }
    }

    true
}

/// `ip_matches_constraint` returns true if the address in ip_bytes falls within the network
/// described by constraint, which is an address followed by a mask of the same length.
pub(crate) fn ip_matches_constraint(ip_bytes: &[u8], constraint: &[u8]) -> bool {
    let addr_len = ip_bytes.len();
    if constraint.len() != addr_len * 2 || (addr_len != 4 && addr_len != 16) {
        return false;
    }
    let (addr, mask) = constraint.split_at(addr_len);
    ip_bytes
        .iter()
        .zip(addr.iter())
        .zip(mask.iter())
        .all(|((ip, a), m)| (ip & m) == (a & m))
}

/// `ip_constraint_subset` returns true if every address in the network described by `inner` is also
/// within the network described by `outer`.
pub(crate) fn ip_constraint_subset(inner: &[u8], outer: &[u8]) -> bool {
    if inner.len() != outer.len() || (inner.len() != 8 && inner.len() != 32) {
        return false;
    }
    let half = inner.len() / 2;
    let (_, inner_mask) = inner.split_at(half);
    let (_, outer_mask) = outer.split_at(half);
    // inner must be at least as specific as outer
    let more_specific = inner_mask
        .iter()
        .zip(outer_mask.iter())
        .all(|(i, o)| i & o == *o);
    more_specific && ip_matches_constraint(&inner[..half], outer)
}

/// `ip_constraint_from_cidr` parses a string like 192.168.0.0/16 or fd00::/8 into the address and
/// mask form used by the iPAddress choice of GeneralName in a name constraint.
pub fn ip_constraint_from_cidr(cidr: &str) -> Result<Vec<u8>> {
    let (addr, prefix) = match cidr.split_once('/') {
        Some((a, p)) => (a, p),
        None => return Err(Error::ParseError),
    };
    let addr: IpAddr = addr.trim().parse().map_err(|_| Error::ParseError)?;
    let prefix: usize = prefix.trim().parse().map_err(|_| Error::ParseError)?;
    let mut bytes = match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    if prefix > bytes.len() * 8 {
        return Err(Error::ParseError);
    }
    let mut mask = alloc::vec![0u8; bytes.len()];
    for (i, m) in mask.iter_mut().enumerate() {
        let bits = prefix.saturating_sub(i * 8).min(8);
        *m = if bits == 0 { 0 } else { 0xFFu8 << (8 - bits) };
    }
    for (b, m) in bytes.iter_mut().zip(mask.iter()) {
        *b &= m;
    }
    bytes.extend_from_slice(&mask);
    Ok(bytes)
}

/// `ip_constraint_to_cidr` is the inverse of [`ip_constraint_from_cidr`].
pub fn ip_constraint_to_cidr(constraint: &[u8]) -> Result<String> {
    let (addr, mask) = constraint.split_at(constraint.len() / 2);
    let prefix: u32 = mask.iter().map(|m| m.count_ones()).sum();
    let ip = match addr.len() {
        4 => {
            let mut a = [0u8; 4];
            a.copy_from_slice(addr);
            IpAddr::from(a)
        }
        16 => {
            let mut a = [0u8; 16];
            a.copy_from_slice(addr);
            IpAddr::from(a)
        }
        _ => return Err(Error::ParseError),
    };
    Ok(format!("{}/{}", ip, prefix))
}

pub(crate) fn log_error_for_name(name: &Name, msg: &str) {
    let name_str = name_to_string(name);
    error!(
        "Encountered error while processing certificate with subject {}: {}",
        name_str, msg
    );
}

pub(crate) fn log_error_for_ca(ca: &PDVCertificate, msg: &str) {
    log_error_for_name(&ca.decoded_cert.tbs_certificate.subject, msg);
}

/// log a message with subject name of the certificate appended
pub fn log_error_for_subject(ca: &Certificate, msg: &str) {
    log_error_for_name(&ca.tbs_certificate.subject, msg);
}

/// `oid_lookup` takes an ObjectIdentifier and returns a string with a friendly name for the OID or
/// Error::NotFound.
pub fn oid_lookup(oid: &ObjectIdentifier) -> Result<String> {
    if *oid == PKIXALG_SHA224_WITH_RSA_ENCRYPTION {
        return Ok("SHA224 with RSA Encryption".to_string());
    } else if *oid == PKIXALG_SHA256_WITH_RSA_ENCRYPTION {
        return Ok("SHA256 with RSA Encryption".to_string());
    } else if *oid == PKIXALG_SHA384_WITH_RSA_ENCRYPTION {
        return Ok("SHA384 with RSA Encryption".to_string());
    } else if *oid == PKIXALG_SHA512_WITH_RSA_ENCRYPTION {
        return Ok("SHA512 with RSA Encryption".to_string());
    } else if *oid == PKIXALG_ECDSA_WITH_SHA256 {
        return Ok("ECDSA with SHA256".to_string());
    }
    match const_oid::db::DB.by_oid(oid) {
        Some(name) => Ok(name.to_string()),
        None => Err(Error::NotFound),
    }
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// get_value_from_rdn returns the value from AttributeTypeAndValue as a string for use in comparing
/// values where leading whitespace may be a factor
pub fn get_value_from_rdn(atav: &AttributeTypeAndValue) -> Result<String> {
    let val = match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    };

    match val {
        Some(val) => Ok(val),
        None => {
            let enc = atav.value.to_der()?;
            let mut s = format!("{}=#", atav.oid);
            for c in enc {
                s.push_str(format!("{:02x}", c).as_str());
            }
            Ok(s)
        }
    }
}

/// Compares attribute values ignoring case, leading and trailing whitespace and runs of internal
/// whitespace.
fn atav_values_match(l: &AttributeTypeAndValue, r: &AttributeTypeAndValue) -> bool {
    let (l_val, r_val) = match (get_value_from_rdn(l), get_value_from_rdn(r)) {
        (Ok(l), Ok(r)) => (l.trim().to_lowercase(), r.trim().to_lowercase()),
        _ => return false,
    };
    if l_val == r_val {
        return true;
    }

    //collapse multiple whitespace instances into one
    match WHITESPACE_RE.as_ref() {
        Some(re) => re.replace_all(l_val.as_str(), " ") == re.replace_all(r_val.as_str(), " "),
        None => false,
    }
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    // no match if not the same number of RDNs
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }

        // only do the whitespace and case insensitive stuff if simpler compare fails
        if lrdn != rrdn {
            for (l, r) in lrdn.0.iter().zip(rrdn.0.iter()) {
                if l.oid != r.oid || !atav_values_match(l, r) {
                    return false;
                }
            }
        }
    }
    true
}

pub(crate) fn general_name_to_string(gn: &GeneralName) -> String {
    match gn {
        GeneralName::DirectoryName(dn) => {
            format!("DirectoryName: {}", dn)
        }
        GeneralName::UniformResourceIdentifier(uri) => {
            format!("UniformResourceIdentifier: {}", uri)
        }
        GeneralName::DnsName(dns) => format!("DnsName: {}", dns),
        GeneralName::Rfc822Name(rfc822) => {
            format!("Rfc822Name: {}", rfc822)
        }
        GeneralName::IpAddress(ip) => match ip_constraint_to_cidr(ip.as_bytes()) {
            Ok(s) if ip.as_bytes().len() == 8 || ip.as_bytes().len() == 32 => {
                format!("IpAddress: {}", s)
            }
            _ => format!("IpAddress: {:02x?}", ip.as_bytes()),
        },
        GeneralName::OtherName(_on) => format!("OtherName: {:?}", gn),
        GeneralName::RegisteredId(_rid) => format!("RegisteredId: {:?}", gn),
        GeneralName::EdiPartyName(_ip) => format!("EdiPartyName: {:?}", gn),
    }
}

pub(crate) fn general_subtree_to_string(gs: &GeneralSubtree) -> String {
    general_name_to_string(&gs.base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn host_matching() {
        assert!(descended_from_host("example.com", "example.com"));
        assert!(descended_from_host("example.com", "WWW.Example.COM"));
        assert!(!descended_from_host("example.com", "badexample.com"));
        assert!(!descended_from_host("example.com", "example.org"));
        assert!(descended_from_host(".example.com", "a.example.com"));
        assert!(!descended_from_host(".example.com", "example.com"));
        assert!(descended_from_host("", "anything.example"));
    }

    #[test]
    fn rfc822_matching() {
        let mailbox = Ia5String::new("joe@example.com").unwrap();
        let host = Ia5String::new("example.com").unwrap();
        let domain = Ia5String::new(".example.com").unwrap();

        let joe = Ia5String::new("joe@EXAMPLE.com").unwrap();
        let sue = Ia5String::new("sue@example.com").unwrap();
        let sub = Ia5String::new("sue@mail.example.com").unwrap();

        assert!(descended_from_rfc822(&mailbox, &joe));
        assert!(!descended_from_rfc822(&mailbox, &sue));
        assert!(descended_from_rfc822(&host, &sue));
        assert!(!descended_from_rfc822(&host, &sub));
        assert!(descended_from_rfc822(&domain, &sub));
        assert!(!descended_from_rfc822(&domain, &sue));
    }

    #[test]
    fn dn_matching() {
        let base = Name::from_str("O=Org,C=US").unwrap();
        let child = Name::from_str("CN=Joe,O=Org,C=US").unwrap();
        let child_lc = Name::from_str("CN=Joe,O=org,C=US").unwrap();
        let other = Name::from_str("CN=Joe,O=Other,C=US").unwrap();
        assert!(descended_from_dn(&base, &child, 0, None));
        assert!(descended_from_dn(&base, &child_lc, 0, None));
        assert!(!descended_from_dn(&base, &other, 0, None));
        assert!(!descended_from_dn(&child, &base, 0, None));
        assert!(!descended_from_dn(&base, &child, 0, Some(0)));
        assert!(!descended_from_dn(&base, &base, 1, None));
    }

    #[test]
    fn compare_names_test() {
        let l = Name::from_str("CN=Joe  Smith,O=Org,C=US").unwrap();
        let r = Name::from_str("CN=joe smith,O=ORG,C=US").unwrap();
        let x = Name::from_str("CN=Joe,O=Org,C=US").unwrap();
        assert!(compare_names(&l, &r));
        assert!(!compare_names(&l, &x));
    }

    #[test]
    fn ip_constraints() {
        let net = ip_constraint_from_cidr("192.168.1.0/24").unwrap();
        assert_eq!(net, [192, 168, 1, 0, 255, 255, 255, 0]);
        assert!(ip_matches_constraint(&[192, 168, 1, 77], &net));
        assert!(!ip_matches_constraint(&[192, 168, 2, 77], &net));
        assert!(!ip_matches_constraint(&[0u8; 16], &net));
        assert_eq!("192.168.1.0/24", ip_constraint_to_cidr(&net).unwrap());

        let wide = ip_constraint_from_cidr("192.168.0.0/16").unwrap();
        assert!(ip_constraint_subset(&net, &wide));
        assert!(!ip_constraint_subset(&wide, &net));

        let v6 = ip_constraint_from_cidr("fd00::/8").unwrap();
        assert_eq!(32, v6.len());
        assert!(ip_constraint_from_cidr("10.0.0.0/33").is_err());
        assert!(ip_constraint_from_cidr("10.0.0.0").is_err());
    }

    #[test]
    fn validity_window() {
        assert_eq!(Ok(0), check_validity_window(10, 20, 0));
        assert_eq!(Ok(5), check_validity_window(10, 20, 15));
        assert_eq!(
            Err(ValidityWindowFault::NotYetValid),
            check_validity_window(10, 20, 5)
        );
        assert_eq!(
            Err(ValidityWindowFault::Expired),
            check_validity_window(10, 20, 25)
        );
    }

    #[test]
    fn oid_lookup_test() {
        assert_eq!(
            "SHA256 with RSA Encryption",
            oid_lookup(&PKIXALG_SHA256_WITH_RSA_ENCRYPTION).unwrap()
        );
        assert!(oid_lookup(&const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS).is_ok());
        assert_eq!(
            Err(Error::NotFound),
            oid_lookup(&ObjectIdentifier::new_unwrap("1.2.3.4.5.6.7.8.9"))
        );
    }
}
