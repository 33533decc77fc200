//! Structures and functions related to processing name constraints

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::mem::discriminant;
use core::str::FromStr;

use der::asn1::{Ia5String, ObjectIdentifier, OctetString};
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;
use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::GeneralName,
};
use x509_cert::name::Name;

use crate::{pdv_certificate::PDVCertificate, util::error::*, util::pdv_utilities::*};

/// PKCS #9 emailAddress attribute type (1.2.840.113549.1.9.1), which is checked against RFC822
/// name constraints when it appears in a subject name.
pub const PKCS9_EMAIL_ADDRESS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// The `NameConstraintsSet` structure is used to define inputs for path validation, i.e.,
/// initial-excluded-subtrees and initial-permitted-subtrees, as well as to track
/// permitted_subtrees and excluded_subtrees during path validation.
///
/// For each supported name form, an empty vector with the corresponding `_null` flag unset means
/// nothing has been set (i.e., no excluded names or unlimited permitted names). A `_null` flag that
/// is set indicates an intersection operation yielded the empty set, i.e., no names of that form
/// are permitted.
///
/// The not_supported field collects subtrees of unsupported name forms with a minimum of zero.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct NameConstraintsSet {
    /// rfc822_name governs use of email addresses in SANs and emailAddress subject attributes
    pub rfc822_name: Vec<GeneralSubtree>,
    /// rfc822_name_null is set when an intersection operation yields empty set
    pub rfc822_name_null: bool,
    /// dns_name governs use of DNS names in SANs
    pub dns_name: Vec<GeneralSubtree>,
    /// dns_name_null is set when an intersection operation yields empty set
    pub dns_name_null: bool,
    /// directory_name governs use of DNs in SANs and subject fields
    pub directory_name: Vec<GeneralSubtree>,
    /// directory_name_null is set when an intersection operation yields empty set
    pub directory_name_null: bool,
    /// uniform_resource_identifier governs use of URIs in SANs
    pub uniform_resource_identifier: Vec<GeneralSubtree>,
    /// uniform_resource_identifier_null is set when an intersection operation yields empty set
    pub uniform_resource_identifier_null: bool,
    /// ip_address governs use of IP addresses in SANs
    pub ip_address: Vec<GeneralSubtree>,
    /// ip_address_null is set when an intersection operation yields empty set
    pub ip_address_null: bool,
    /// not_supported collects subtrees of other name forms
    pub not_supported: Vec<GeneralSubtree>,
}

#[derive(PartialEq)]
enum Bucket {
    Rfc822,
    Dns,
    Dn,
    Uri,
    Ip,
}

fn bucket_for(gn: &GeneralName) -> Option<Bucket> {
    match gn {
        GeneralName::Rfc822Name(_) => Some(Bucket::Rfc822),
        GeneralName::DnsName(_) => Some(Bucket::Dns),
        GeneralName::DirectoryName(_) => Some(Bucket::Dn),
        GeneralName::UniformResourceIdentifier(_) => Some(Bucket::Uri),
        GeneralName::IpAddress(_) => Some(Bucket::Ip),
        _ => None,
    }
}

impl NameConstraintsSet {
    fn bucket(&self, b: &Bucket) -> (&Vec<GeneralSubtree>, bool) {
        match b {
            Bucket::Rfc822 => (&self.rfc822_name, self.rfc822_name_null),
            Bucket::Dns => (&self.dns_name, self.dns_name_null),
            Bucket::Dn => (&self.directory_name, self.directory_name_null),
            Bucket::Uri => (
                &self.uniform_resource_identifier,
                self.uniform_resource_identifier_null,
            ),
            Bucket::Ip => (&self.ip_address, self.ip_address_null),
        }
    }

    fn bucket_mut(&mut self, b: &Bucket) -> (&mut Vec<GeneralSubtree>, &mut bool) {
        match b {
            Bucket::Rfc822 => (&mut self.rfc822_name, &mut self.rfc822_name_null),
            Bucket::Dns => (&mut self.dns_name, &mut self.dns_name_null),
            Bucket::Dn => (&mut self.directory_name, &mut self.directory_name_null),
            Bucket::Uri => (
                &mut self.uniform_resource_identifier,
                &mut self.uniform_resource_identifier_null,
            ),
            Bucket::Ip => (&mut self.ip_address, &mut self.ip_address_null),
        }
    }

    /// `is_empty` returns true if no constraints of any form have been set.
    pub fn is_empty(&self) -> bool {
        self.rfc822_name.is_empty()
            && self.dns_name.is_empty()
            && self.directory_name.is_empty()
            && self.uniform_resource_identifier.is_empty()
            && self.ip_address.is_empty()
            && self.not_supported.is_empty()
            && !self.are_any_null()
    }

    /// `are_any_null` returns true if any supported name form has been intersected down to nothing.
    pub fn are_any_null(&self) -> bool {
        self.rfc822_name_null
            || self.dns_name_null
            || self.directory_name_null
            || self.uniform_resource_identifier_null
            || self.ip_address_null
    }

    /// `calculate_intersection` calculates the intersection of self and subtrees and saves the
    /// result in self. Name forms that do not appear in subtrees are left unchanged.
    pub fn calculate_intersection(&mut self, subtrees: &GeneralSubtrees) {
        for b in [Bucket::Rfc822, Bucket::Dns, Bucket::Dn, Bucket::Uri, Bucket::Ip] {
            let new_names: Vec<&GeneralSubtree> = subtrees
                .iter()
                .filter(|s| bucket_for(&s.base).as_ref() == Some(&b))
                .collect();
            if new_names.is_empty() {
                continue;
            }

            let (cur, null) = self.bucket_mut(&b);
            if *null {
                continue;
            }

            let mut new_set: Vec<GeneralSubtree> = Vec::new();
            if cur.is_empty() {
                new_set = new_names.into_iter().cloned().collect();
            } else {
                for new_name in &new_names {
                    for prev_name in cur.iter() {
                        let keep = if subtree_within(new_name, prev_name) {
                            Some(*new_name)
                        } else if subtree_within(prev_name, new_name) {
                            Some(prev_name)
                        } else {
                            None
                        };
                        if let Some(k) = keep {
                            if !new_set.contains(k) {
                                new_set.push(k.clone());
                            }
                        }
                    }
                }
            }

            if new_set.is_empty() {
                debug!("Name constraints intersection yielded empty set");
                cur.clear();
                *null = true;
            } else {
                *cur = new_set;
            }
        }

        for s in subtrees {
            if bucket_for(&s.base).is_none() && !self.not_supported.contains(s) {
                self.not_supported.push(s.clone());
            }
        }
    }

    /// `calculate_union` calculates the union of self and subtrees and saves the result in self.
    pub fn calculate_union(&mut self, subtrees: &GeneralSubtrees) {
        for s in subtrees {
            match bucket_for(&s.base) {
                Some(b) => {
                    let (cur, _) = self.bucket_mut(&b);
                    if !cur.contains(s) {
                        cur.push(s.clone());
                    }
                }
                None => {
                    if !self.not_supported.contains(s) {
                        self.not_supported.push(s.clone());
                    }
                }
            }
        }
    }

    /// `permits` returns true if name falls within at least one subtree of its form, or if no
    /// subtrees of its form have been set, when self is used as a permitted subtrees set.
    pub fn permits(&self, name: &GeneralName) -> bool {
        match bucket_for(name) {
            Some(b) => {
                let (cur, null) = self.bucket(&b);
                if null {
                    return false;
                }
                cur.is_empty() || cur.iter().any(|s| name_within(name, s))
            }
            None => !self
                .not_supported
                .iter()
                .any(|s| discriminant(&s.base) == discriminant(name)),
        }
    }

    /// `excludes` returns true if name falls within at least one subtree of its form when self is
    /// used as an excluded subtrees set.
    pub fn excludes(&self, name: &GeneralName) -> bool {
        match bucket_for(name) {
            Some(b) => {
                let (cur, _) = self.bucket(&b);
                cur.iter().any(|s| name_within(name, s))
            }
            None => self
                .not_supported
                .iter()
                .any(|s| discriminant(&s.base) == discriminant(name)),
        }
    }
}

/// `name_within` returns true if name is within the subtree. Names and subtrees of different forms
/// never match.
pub(crate) fn name_within(name: &GeneralName, subtree: &GeneralSubtree) -> bool {
    match (&subtree.base, name) {
        (GeneralName::DirectoryName(base), GeneralName::DirectoryName(n)) => {
            descended_from_dn(base, n, subtree.minimum, subtree.maximum)
        }
        (GeneralName::DnsName(base), GeneralName::DnsName(n)) => {
            descended_from_host(base.as_str(), n.as_str())
        }
        (GeneralName::Rfc822Name(base), GeneralName::Rfc822Name(n)) => {
            descended_from_rfc822(base, n)
        }
        (GeneralName::UniformResourceIdentifier(base), GeneralName::UniformResourceIdentifier(n)) => {
            match uri_host(n.as_str()) {
                Some(host) => descended_from_host(base.as_str(), host.as_str()),
                None => false,
            }
        }
        (GeneralName::IpAddress(base), GeneralName::IpAddress(n)) => {
            ip_matches_constraint(n.as_bytes(), base.as_bytes())
        }
        _ => false,
    }
}

/// `subtree_within` returns true if every name within inner is also within outer.
fn subtree_within(inner: &GeneralSubtree, outer: &GeneralSubtree) -> bool {
    if inner.base == outer.base {
        return true;
    }
    match (&outer.base, &inner.base) {
        (GeneralName::DirectoryName(o), GeneralName::DirectoryName(i)) => {
            descended_from_dn(o, i, 0, None)
        }
        (GeneralName::DnsName(o), GeneralName::DnsName(i))
        | (GeneralName::UniformResourceIdentifier(o), GeneralName::UniformResourceIdentifier(i)) => {
            descended_from_host(o.as_str(), i.as_str())
        }
        (GeneralName::Rfc822Name(o), GeneralName::Rfc822Name(i)) => {
            if i.as_str().contains('@') {
                descended_from_rfc822(o, i)
            } else if o.as_str().contains('@') {
                false
            } else if o.as_str().starts_with('.') {
                descended_from_host(o.as_str(), i.as_str().trim_start_matches('.'))
            } else {
                o.as_str().eq_ignore_ascii_case(i.as_str())
            }
        }
        (GeneralName::IpAddress(o), GeneralName::IpAddress(i)) => {
            ip_constraint_subset(i.as_bytes(), o.as_bytes())
        }
        _ => false,
    }
}

fn uri_host(uri: &str) -> Option<String> {
    match Url::parse(uri) {
        Ok(url) => url.host_str().map(|h| h.to_string()),
        Err(_) => None,
    }
}

/// `check_name_forms` returns an UnsupportedNameForm error if any subtree uses a name form that is
/// not supported and features a minimum other than zero.
pub(crate) fn check_name_forms(subtrees: &GeneralSubtrees, index: usize) -> Result<()> {
    for s in subtrees {
        if bucket_for(&s.base).is_none() && s.minimum != 0 {
            return Err(Error::path(
                PathValidationStatus::UnsupportedNameForm,
                index,
                format!(
                    "unsupported name constraint with minimum {}: {}",
                    s.minimum,
                    general_subtree_to_string(s)
                ),
            ));
        }
    }
    Ok(())
}

/// `names_for_constraint_checks` returns the names from a certificate that are subject to name
/// constraints: the subject name (if not empty), any emailAddress attributes in the subject name
/// and every subjectAltName entry.
pub fn names_for_constraint_checks(cert: &PDVCertificate) -> Vec<GeneralName> {
    let mut names = Vec::new();
    let subject = cert.subject();
    if !subject.0.is_empty() {
        names.push(GeneralName::DirectoryName(subject.clone()));
        for rdn in subject.0.iter() {
            for atav in rdn.0.iter() {
                if atav.oid == PKCS9_EMAIL_ADDRESS {
                    if let Ok(email) = atav.value.decode_as::<Ia5String>() {
                        names.push(GeneralName::Rfc822Name(email));
                    }
                }
            }
        }
    }
    if let Some(san) = cert.subject_alt_name() {
        names.extend(san.0.iter().cloned());
    }
    names
}

/// NameConstraintsSettings is a serializable equivalent of NameConstraintsSet. IP address
/// constraints are expressed in CIDR notation, i.e., 10.0.0.0/8, and directory names as RFC 4514
/// strings.
#[derive(Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct NameConstraintsSettings {
    /// rfc822_name governs use of email addresses
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rfc822_name: Option<Vec<String>>,
    /// dns_name governs use of DNS names
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dns_name: Option<Vec<String>>,
    /// directory_name governs use of DNs
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub directory_name: Option<Vec<String>>,
    /// uniform_resource_identifier governs use of URIs
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub uniform_resource_identifier: Option<Vec<String>>,
    /// ip_address governs use of IP addresses
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ip_address: Option<Vec<String>>,
}

fn subtree(base: GeneralName) -> GeneralSubtree {
    GeneralSubtree {
        base,
        minimum: 0,
        maximum: None,
    }
}

fn ia5_subtrees(
    values: &Option<Vec<String>>,
    f: fn(Ia5String) -> GeneralName,
    out: &mut Vec<GeneralSubtree>,
) -> Result<()> {
    if let Some(values) = values {
        for v in values {
            out.push(subtree(f(Ia5String::new(v.as_str())?)));
        }
    }
    Ok(())
}

impl TryFrom<&NameConstraintsSettings> for NameConstraintsSet {
    type Error = Error;

    fn try_from(settings: &NameConstraintsSettings) -> Result<Self> {
        let mut ncs = NameConstraintsSet::default();
        ia5_subtrees(
            &settings.rfc822_name,
            GeneralName::Rfc822Name,
            &mut ncs.rfc822_name,
        )?;
        ia5_subtrees(&settings.dns_name, GeneralName::DnsName, &mut ncs.dns_name)?;
        ia5_subtrees(
            &settings.uniform_resource_identifier,
            GeneralName::UniformResourceIdentifier,
            &mut ncs.uniform_resource_identifier,
        )?;
        if let Some(dns) = &settings.directory_name {
            for dn in dns {
                let name = Name::from_str(dn.as_str()).map_err(|e| {
                    debug!("Failed to parse directory name constraint {}: {}", dn, e);
                    Error::ParseError
                })?;
                ncs.directory_name
                    .push(subtree(GeneralName::DirectoryName(name)));
            }
        }
        if let Some(ips) = &settings.ip_address {
            for ip in ips {
                let c = ip_constraint_from_cidr(ip.as_str())?;
                ncs.ip_address
                    .push(subtree(GeneralName::IpAddress(OctetString::new(c)?)));
            }
        }
        Ok(ncs)
    }
}

impl From<&NameConstraintsSet> for NameConstraintsSettings {
    fn from(ncs: &NameConstraintsSet) -> Self {
        fn collect(
            subtrees: &[GeneralSubtree],
            f: fn(&GeneralName) -> Option<String>,
        ) -> Option<Vec<String>> {
            let v: Vec<String> = subtrees.iter().filter_map(|s| f(&s.base)).collect();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        }

        NameConstraintsSettings {
            rfc822_name: collect(&ncs.rfc822_name, |gn| match gn {
                GeneralName::Rfc822Name(n) => Some(n.to_string()),
                _ => None,
            }),
            dns_name: collect(&ncs.dns_name, |gn| match gn {
                GeneralName::DnsName(n) => Some(n.to_string()),
                _ => None,
            }),
            directory_name: collect(&ncs.directory_name, |gn| match gn {
                GeneralName::DirectoryName(n) => Some(n.to_string()),
                _ => None,
            }),
            uniform_resource_identifier: collect(&ncs.uniform_resource_identifier, |gn| {
                match gn {
                    GeneralName::UniformResourceIdentifier(n) => Some(n.to_string()),
                    _ => None,
                }
            }),
            ip_address: collect(&ncs.ip_address, |gn| match gn {
                GeneralName::IpAddress(n) => ip_constraint_to_cidr(n.as_bytes()).ok(),
                _ => None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns(s: &str) -> GeneralName {
        GeneralName::DnsName(Ia5String::new(s).unwrap())
    }

    fn dn(s: &str) -> GeneralName {
        GeneralName::DirectoryName(Name::from_str(s).unwrap())
    }

    fn uri(s: &str) -> GeneralName {
        GeneralName::UniformResourceIdentifier(Ia5String::new(s).unwrap())
    }

    fn ip(b: &[u8]) -> GeneralName {
        GeneralName::IpAddress(OctetString::new(b).unwrap())
    }

    #[test]
    fn permitted_intersection() {
        let mut permitted = NameConstraintsSet::default();
        assert!(permitted.permits(&dns("anything.example")));

        permitted.calculate_intersection(&alloc::vec![subtree(dns("example.com"))]);
        assert!(permitted.permits(&dns("www.example.com")));
        assert!(!permitted.permits(&dns("example.org")));
        // other forms are unaffected
        assert!(permitted.permits(&dn("CN=Joe,C=US")));

        permitted.calculate_intersection(&alloc::vec![
            subtree(dns("a.example.com")),
            subtree(dns("example.org"))
        ]);
        assert!(permitted.permits(&dns("x.a.example.com")));
        assert!(!permitted.permits(&dns("b.example.com")));

        permitted.calculate_intersection(&alloc::vec![subtree(dns("example.net"))]);
        assert!(permitted.dns_name_null);
        assert!(!permitted.permits(&dns("a.example.com")));
    }

    #[test]
    fn dn_constraints() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&alloc::vec![subtree(dn("C=FI"))]);
        assert!(permitted.permits(&dn("CN=EE,C=FI")));
        assert!(!permitted.permits(&dn("CN=EE")));

        let mut excluded = NameConstraintsSet::default();
        excluded.calculate_union(&alloc::vec![subtree(dn("O=Bad,C=FI"))]);
        assert!(excluded.excludes(&dn("CN=EE,O=Bad,C=FI")));
        assert!(!excluded.excludes(&dn("CN=EE,O=Good,C=FI")));
    }

    #[test]
    fn uri_and_ip_constraints() {
        let mut excluded = NameConstraintsSet::default();
        excluded.calculate_union(&alloc::vec![
            subtree(uri(".example.com")),
            subtree(ip(&[10, 0, 0, 0, 255, 0, 0, 0]))
        ]);
        assert!(excluded.excludes(&uri("https://www.example.com/path")));
        assert!(!excluded.excludes(&uri("https://example.org/")));
        assert!(excluded.excludes(&ip(&[10, 1, 2, 3])));
        assert!(!excluded.excludes(&ip(&[11, 1, 2, 3])));

        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&alloc::vec![subtree(ip(&[
            192, 168, 0, 0, 255, 255, 0, 0
        ]))]);
        permitted.calculate_intersection(&alloc::vec![subtree(ip(&[
            192, 168, 1, 0, 255, 255, 255, 0
        ]))]);
        assert!(permitted.permits(&ip(&[192, 168, 1, 9])));
        assert!(!permitted.permits(&ip(&[192, 168, 2, 9])));
    }

    #[test]
    fn unsupported_forms() {
        let rid = GeneralName::RegisteredId(ObjectIdentifier::new_unwrap("1.2.3"));
        let with_min = GeneralSubtree {
            base: rid.clone(),
            minimum: 1,
            maximum: None,
        };
        assert!(check_name_forms(&alloc::vec![with_min], 2).is_err());
        assert!(check_name_forms(&alloc::vec![subtree(rid.clone())], 2).is_ok());

        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&alloc::vec![subtree(rid.clone())]);
        assert!(!permitted.permits(&rid));
    }

    #[test]
    fn settings_conversion() {
        let settings = NameConstraintsSettings {
            rfc822_name: Some(alloc::vec!["example.com".to_string()]),
            dns_name: Some(alloc::vec![".example.com".to_string()]),
            directory_name: Some(alloc::vec!["O=Org,C=US".to_string()]),
            uniform_resource_identifier: None,
            ip_address: Some(alloc::vec!["10.0.0.0/8".to_string()]),
        };
        let ncs = NameConstraintsSet::try_from(&settings).unwrap();
        assert_eq!(1, ncs.directory_name.len());
        assert!(ncs.permits(&ip(&[10, 9, 9, 9])));
        let back = NameConstraintsSettings::from(&ncs);
        assert_eq!(settings.ip_address, back.ip_address);
        assert_eq!(settings.dns_name, back.dns_name);
        assert_eq!(settings.rfc822_name, back.rfc822_name);

        let bad = NameConstraintsSettings {
            ip_address: Some(alloc::vec!["10.0.0.0".to_string()]),
            ..Default::default()
        };
        assert!(NameConstraintsSet::try_from(&bad).is_err());
    }
}
