//! Path validation using ECDSA P-256 signatures verified by the RustCrypto callbacks

mod common;

use certpath::*;
use common::*;
use der::asn1::{Any, BitString};
use der::Encode;
use hex_literal::hex;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;

const ROOT: &str = "CN=ECDSA Root,O=Test,C=US";
const EE: &str = "CN=ECDSA EE,O=Test,C=US";

fn root_key() -> SigningKey {
    SigningKey::from_slice(&hex!(
        "C9AFA9D845BA75166B5C215767B1D6934E50C3DB36E89B127B8A622B120F6721"
    ))
    .unwrap()
}

fn ee_key() -> SigningKey {
    SigningKey::from_slice(&hex!(
        "519B423D715F8B581F4FA8EE59F4771A5B44C8130B4E3EACCA54A56DDA72B464"
    ))
    .unwrap()
}

fn ecdsa_with_sha256() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    }
}

fn p256_spki(key: &SigningKey) -> SubjectPublicKeyInfoOwned {
    let point = key.verifying_key().to_encoded_point(false);
    SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: PKIXALG_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&PKIXALG_SECP256R1).unwrap()),
        },
        subject_public_key: BitString::from_bytes(point.as_bytes()).unwrap(),
    }
}

fn sign_p256(spec: &CertSpec, key: &SigningKey, signer: &SigningKey) -> PDVCertificate {
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::from(spec.serial),
        signature: ecdsa_with_sha256(),
        issuer: spec.issuer.clone(),
        validity: Validity {
            not_before: utc(spec.not_before),
            not_after: utc(spec.not_after),
        },
        subject: spec.subject.clone(),
        subject_public_key_info: p256_spki(key),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(spec.extensions.clone()),
    };
    let sig: Signature = signer.sign(&tbs.to_der().unwrap());
    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: ecdsa_with_sha256(),
        signature: BitString::from_bytes(sig.to_der().as_bytes()).unwrap(),
    };
    PDVCertificate::try_from(cert).unwrap()
}

#[test]
fn p256_path() {
    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let ta = sign_p256(&CertSpec::ca(ROOT, "unused"), &root_key(), &root_key());
    assert!(is_self_signed(&pe, &ta));

    let ee_spec = CertSpec::new(EE, "unused")
        .issuer(ROOT)
        .with_extension(key_usage(x509_cert::ext::pkix::KeyUsage(
            x509_cert::ext::pkix::KeyUsages::DigitalSignature.into(),
        )));
    let ee = sign_p256(&ee_spec, &ee_key(), &root_key());
    assert!(!is_self_signed(&pe, &ee));

    let result = validate_path(&pe, &config(), &path(&[&ta, &ee])).unwrap();
    assert_eq!(p256_spki(&ee_key()), result.working_public_key);

    // signed by the wrong key
    let forged = sign_p256(&ee_spec, &ee_key(), &ee_key());
    let r = validate_path(&pe, &config(), &path(&[&ta, &forged]));
    assert_eq!(PathValidationStatus::SignatureInvalid, path_status(r));

    // the test signature scheme is not known to the RustCrypto callbacks
    let other = CertSpec::new(EE, "ee").issuer(ROOT).sign("root");
    let r = validate_path(&pe, &config(), &path(&[&ta, &other]));
    assert_eq!(PathValidationStatus::SignatureInvalid, path_status(r));
}

#[test]
fn p256_path_building() {
    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let ta = sign_p256(&CertSpec::ca(ROOT, "unused"), &root_key(), &root_key());
    let ca_key = SigningKey::from_slice(&hex!(
        "0F56DB78CA460B055C500064824BED999A25AAF48EBB519AC201537B85479813"
    ))
    .unwrap();
    let ca = sign_p256(
        &CertSpec::ca("CN=ECDSA CA,O=Test,C=US", "unused").issuer(ROOT),
        &ca_key,
        &root_key(),
    );
    let ee = sign_p256(
        &CertSpec::new(EE, "unused").issuer("CN=ECDSA CA,O=Test,C=US"),
        &ee_key(),
        &ca_key,
    );

    let bundle = CertificateBundle::from(vec![ca.clone()]);
    let cp = build_path(&pe, &ta, &ee, &bundle).unwrap();
    assert_eq!(vec![ta, ca, ee], cp.certificates);
    assert!(cp.validate(&pe, &config()).is_ok());
}
