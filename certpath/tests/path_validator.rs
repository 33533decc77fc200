mod common;

use certpath::*;
use common::*;
use const_oid::db::rfc5912::ID_CE_SUBJECT_ALT_NAME;
use der::asn1::{Ia5String, Null, ObjectIdentifier};
use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages, SubjectAltName};

const ROOT: &str = "CN=Root,O=Test,C=US";
const CA: &str = "CN=CA,O=Test,C=US";
const EE: &str = "CN=EE,O=Test,C=US";

fn three_cert_path() -> (PDVCertificate, PDVCertificate, PDVCertificate) {
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).serial(2).sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).serial(3).sign("ca");
    (ta, ca, ee)
}

#[test]
fn valid_path() {
    let pe = test_environment();
    let (ta, ca, ee) = three_cert_path();
    let cp = path(&[&ta, &ca, &ee]);

    let result = validate_path(&pe, &config(), &cp).unwrap();
    assert_eq!(&ee, result.certificate());
    assert_eq!(
        ee.decoded_cert.tbs_certificate.subject_public_key_info,
        result.working_public_key
    );
    assert!(result.policies().is_empty());
    assert_eq!(3, result.certification_path.len());

    // same answer via the path itself
    assert_eq!(result, cp.validate(&pe, &config()).unwrap());
}

#[test]
fn validation_is_deterministic() {
    let pe = test_environment();
    let (ta, ca, ee) = three_cert_path();
    let cp = path(&[&ta, &ca, &ee]);
    let cfg = config();

    let r1 = validate_path(&pe, &cfg, &cp);
    let r2 = validate_path(&pe, &cfg, &cp);
    assert_eq!(r1, r2);

    let bad = path(&[&ta, &ee]);
    assert_eq!(validate_path(&pe, &cfg, &bad), validate_path(&pe, &cfg, &bad));
}

#[test]
fn trust_anchor_only() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let result = validate_path(&pe, &config(), &path(&[&ta])).unwrap();
    assert_eq!(&ta, result.certificate());
    assert!(result.policies().is_empty());
}

#[test]
fn intermediate_must_be_ca() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("ca");

    let not_ca = CertSpec::new(CA, "ca")
        .issuer(ROOT)
        .with_extension(basic_constraints(false, None))
        .sign("root");
    let r = validate_path(&pe, &config(), &path(&[&ta, &not_ca, &ee]));
    assert_eq!(1, failure_index(&r));
    assert_eq!(PathValidationStatus::NotACertificateAuthority, path_status(r));

    let no_bc = CertSpec::new(CA, "ca").issuer(ROOT).sign("root");
    let r = validate_path(&pe, &config(), &path(&[&ta, &no_bc, &ee]));
    assert_eq!(PathValidationStatus::NotACertificateAuthority, path_status(r));
}

#[test]
fn path_length_constraint() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca1 = CertSpec::ca("CN=CA1,O=Test,C=US", "ca1")
        .issuer(ROOT)
        .replace_extension(basic_constraints(true, Some(0)))
        .sign("root");
    let ca2 = CertSpec::ca("CN=CA2,O=Test,C=US", "ca2")
        .issuer("CN=CA1,O=Test,C=US")
        .sign("ca1");
    let ee = CertSpec::new(EE, "ee")
        .issuer("CN=CA2,O=Test,C=US")
        .sign("ca2");
    let ee_under_ca1 = CertSpec::new(EE, "ee")
        .issuer("CN=CA1,O=Test,C=US")
        .sign("ca1");

    assert!(validate_path(&pe, &config(), &path(&[&ta, &ca1, &ee_under_ca1])).is_ok());

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca1, &ca2, &ee]));
    assert_eq!(2, failure_index(&r));
    assert_eq!(PathValidationStatus::PathLengthExceeded, path_status(r));

    // configured maximum
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("ca");
    let cp = path(&[&ta, &ca, &ee]);
    assert!(validate_path(&pe, &PathValidationConfig::new(TOI, 1), &cp).is_ok());
    let r = validate_path(&pe, &PathValidationConfig::new(TOI, 0), &cp);
    assert_eq!(1, failure_index(&r));
    assert_eq!(PathValidationStatus::PathLengthExceeded, path_status(r));
}

#[test]
fn trust_anchor_path_length_constraint() {
    let pe = test_environment();
    let ta = CertSpec::ca(ROOT, "root")
        .replace_extension(basic_constraints(true, Some(0)))
        .sign("root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("ca");
    let cp = path(&[&ta, &ca, &ee]);

    let r = validate_path(&pe, &config(), &cp);
    assert_eq!(PathValidationStatus::PathLengthExceeded, path_status(r));

    let mut cfg = config();
    cfg.enforce_trust_anchor_constraints = false;
    assert!(validate_path(&pe, &cfg, &cp).is_ok());
}

#[test]
fn key_cert_sign_required() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca")
        .issuer(ROOT)
        .replace_extension(key_usage(KeyUsage(KeyUsages::DigitalSignature.into())))
        .sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("ca");

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &ee]));
    assert_eq!(PathValidationStatus::KeyUsageViolation, path_status(r));
}

#[test]
fn name_constraints_on_trust_anchor() {
    let pe = test_environment();
    let ca = CertSpec::ca("CN=CA", "ca")
        .with_extension(name_constraints(vec![dn_subtree("C=FI")], vec![]))
        .sign("ca");
    let ee_fi = CertSpec::new("CN=EE,C=FI", "ee").issuer("CN=CA").sign("ca");
    let ee = CertSpec::new("CN=EE", "ee").issuer("CN=CA").sign("ca");

    assert!(validate_path(&pe, &config(), &path(&[&ca, &ee_fi])).is_ok());

    let r = validate_path(&pe, &config(), &path(&[&ca, &ee]));
    assert_eq!(1, failure_index(&r));
    assert_eq!(PathValidationStatus::NameConstraintViolation, path_status(r));
}

#[test]
fn name_constraints_on_intermediate() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca")
        .issuer(ROOT)
        .with_extension(name_constraints(
            vec![dn_subtree("O=Test,C=US"), dns_subtree("example.com")],
            vec![dns_subtree("bad.example.com")],
        ))
        .sign("root");
    let san = |dns: &str| {
        extension(
            ID_CE_SUBJECT_ALT_NAME,
            false,
            &SubjectAltName(vec![GeneralName::DnsName(Ia5String::new(dns).unwrap())]),
        )
    };

    let good = CertSpec::new(EE, "ee")
        .issuer(CA)
        .with_extension(san("www.example.com"))
        .sign("ca");
    assert!(validate_path(&pe, &config(), &path(&[&ta, &ca, &good])).is_ok());

    let excluded = CertSpec::new(EE, "ee")
        .issuer(CA)
        .with_extension(san("host.bad.example.com"))
        .sign("ca");
    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &excluded]));
    assert_eq!(PathValidationStatus::NameConstraintViolation, path_status(r));

    let not_permitted = CertSpec::new(EE, "ee")
        .issuer(CA)
        .with_extension(san("example.org"))
        .sign("ca");
    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &not_permitted]));
    assert_eq!(PathValidationStatus::NameConstraintViolation, path_status(r));

    let wrong_dn = CertSpec::new("CN=EE,O=Other,C=US", "ee")
        .issuer(CA)
        .sign("ca");
    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &wrong_dn]));
    assert_eq!(PathValidationStatus::NameConstraintViolation, path_status(r));
}

#[test]
fn unsupported_name_form_with_minimum() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let rid = GeneralSubtree {
        base: GeneralName::RegisteredId(ObjectIdentifier::new_unwrap("1.2.3.4")),
        minimum: 1,
        maximum: None,
    };
    let ca = CertSpec::ca(CA, "ca")
        .issuer(ROOT)
        .with_extension(name_constraints(vec![rid], vec![]))
        .sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("ca");

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &ee]));
    assert_eq!(PathValidationStatus::UnsupportedNameForm, path_status(r));
}

#[test]
fn issuer_name_mismatch() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    // signed by the CA's key but naming someone else as issuer
    let ee = CertSpec::new(EE, "ee").issuer("CN=Someone else").sign("ca");

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &ee]));
    assert_eq!(2, failure_index(&r));
    assert_eq!(PathValidationStatus::IssuerMismatch, path_status(r));
}

#[test]
fn bad_signature() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    let ee = CertSpec::new(EE, "ee").issuer(CA).sign("not the ca");

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &ee]));
    assert_eq!(PathValidationStatus::SignatureInvalid, path_status(r));
}

#[test]
fn validity_period() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    let expired = CertSpec::new(EE, "ee")
        .issuer(CA)
        .validity(NOT_BEFORE, TOI - 1)
        .sign("ca");
    let future = CertSpec::new(EE, "ee")
        .issuer(CA)
        .validity(TOI + 1, NOT_AFTER)
        .sign("ca");

    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &expired]));
    assert_eq!(PathValidationStatus::Expired, path_status(r));
    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &future]));
    assert_eq!(PathValidationStatus::NotYetValid, path_status(r));

    // time of interest of zero disables the check
    let cfg = PathValidationConfig::new(0, PS_MAX_PATH_LENGTH_CONSTRAINT);
    assert!(validate_path(&pe, &cfg, &path(&[&ta, &ca, &expired])).is_ok());
}

#[test]
fn critical_extensions() {
    let pe = test_environment();
    let ta = trust_anchor(ROOT, "root");
    let ca = CertSpec::ca(CA, "ca").issuer(ROOT).sign("root");
    let unknown = ObjectIdentifier::new_unwrap("1.2.3.4.5");

    let critical = CertSpec::new(EE, "ee")
        .issuer(CA)
        .with_extension(extension(unknown, true, &Null))
        .sign("ca");
    let r = validate_path(&pe, &config(), &path(&[&ta, &ca, &critical]));
    match &r {
        Err(Error::PathValidation(pvf)) => {
            assert_eq!(PathValidationStatus::UnsupportedCriticalExtension, pvf.status);
            assert!(pvf.context.contains("1.2.3.4.5"));
        }
        _ => panic!("expected UnsupportedCriticalExtension"),
    }

    let non_critical = CertSpec::new(EE, "ee")
        .issuer(CA)
        .with_extension(extension(unknown, false, &Null))
        .sign("ca");
    assert!(validate_path(&pe, &config(), &path(&[&ta, &ca, &non_critical])).is_ok());
}

#[test]
fn environment_without_validators() {
    let mut pe = test_environment();
    pe.clear_validate_path_callbacks();
    let (ta, ca, ee) = three_cert_path();
    assert_eq!(
        Err(Error::Unrecognized),
        validate_path(&pe, &config(), &path(&[&ta, &ca, &ee]))
    );
}

#[test]
fn empty_path() {
    match CertificationPath::new(vec![]) {
        Err(e) => assert_eq!(
            Some(PathValidationStatus::MissingCertificate),
            e.path_validation_status()
        ),
        Ok(_) => panic!("expected MissingCertificate"),
    }
}
