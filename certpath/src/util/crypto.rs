//! Provides implementations of crypto-related [`PkiEnvironment`] interfaces using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project for support.

use alloc::{format, vec::Vec};

use der::{asn1::ObjectIdentifier, Encode};
use p256::ecdsa::{
    signature::Verifier as Verifier256, Signature as Signature256, VerifyingKey as VerifyingKey256,
};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::util::error::{Error, Result};
use crate::{environment::pki_environment::*, log_message, util::pdv_alg_oids::*, PeLogLevels};

/// get_padding_scheme takes an AlgorithmIdentifier containing a signature algorithm and returns
/// a corresponding [`Pkcs1v15Sign`] instance.
///
/// At present, only the PKCS1v15Sign padding scheme is supported, relative to the
/// [`PKIXALG_SHA224_WITH_RSA_ENCRYPTION`], [`PKIXALG_SHA256_WITH_RSA_ENCRYPTION`],
/// [`PKIXALG_SHA384_WITH_RSA_ENCRYPTION`] and [`PKIXALG_SHA512_WITH_RSA_ENCRYPTION`] algorithm identifiers.
pub fn get_padding_scheme(signature_alg: &AlgorithmIdentifierOwned) -> Result<Pkcs1v15Sign> {
    match signature_alg.oid {
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha256>()),
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha384>()),
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha224>()),
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => Ok(Pkcs1v15Sign::new::<Sha512>()),
        _ => Err(Error::Unrecognized),
    }
}

/// get_hash_alg_from_sig_alg takes an ObjectIdentifier that notionally contains a signature algorithm,
/// i.e., PKIXALG_SHA256_WITH_RSA_ENCRYPTION or PKIXALG_ECDSA_WITH_SHA256, and returns the indicated hash
/// algorithm.
pub fn get_hash_alg_from_sig_alg(sig_alg: &ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    let oid = match *sig_alg {
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION | PKIXALG_ECDSA_WITH_SHA256 => PKIXALG_SHA256,
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => PKIXALG_SHA384,
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => PKIXALG_SHA224,
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => PKIXALG_SHA512,
        _ => return Err(Error::Unrecognized),
    };
    Ok(AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    })
}

/// is_rsa returns true is the presented OID is one of [`PKIXALG_SHA224_WITH_RSA_ENCRYPTION`],
/// [`PKIXALG_SHA256_WITH_RSA_ENCRYPTION`], [`PKIXALG_SHA384_WITH_RSA_ENCRYPTION`] or
/// [`PKIXALG_SHA512_WITH_RSA_ENCRYPTION`] and false otherwise.
pub(crate) fn is_rsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_SHA256_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA384_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA224_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA512_WITH_RSA_ENCRYPTION
}

/// is_ecdsa returns true is the presented OID is [`PKIXALG_ECDSA_WITH_SHA256`] and false otherwise.
pub(crate) fn is_ecdsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_ECDSA_WITH_SHA256
}

/// calculate_hash_rust_crypto implements the [`CalculateHash`](crate::CalculateHash) interface for
/// [`PkiEnvironment`] using implementations from the Rust Crypto project.
///
/// It supports [`PKIXALG_SHA224`], [`PKIXALG_SHA256`], [`PKIXALG_SHA384`] and [`PKIXALG_SHA512`].
pub fn calculate_hash_rust_crypto(
    _pe: &PkiEnvironment,
    hash_alg: &AlgorithmIdentifierOwned,
    buffer_to_hash: &[u8],
) -> Result<Vec<u8>> {
    match hash_alg.oid {
        PKIXALG_SHA224 => Ok(Sha224::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA256 => Ok(Sha256::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA384 => Ok(Sha384::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA512 => Ok(Sha512::digest(buffer_to_hash).to_vec()),
        _ => Err(Error::Unrecognized),
    }
}

fn get_named_curve_parameter(alg_id: &AlgorithmIdentifierOwned) -> Result<ObjectIdentifier> {
    match &alg_id.parameters {
        Some(params) => Ok(params.decode_as::<ObjectIdentifier>()?),
        None => Err(Error::ParseError),
    }
}

/// verify_signature_message_rust_crypto implements the [`VerifySignatureMessage`](crate::VerifySignatureMessage)
/// interface for [`PkiEnvironment`] using implementations from the [Rust Crypto](https://github.com/RustCrypto) project.
///
/// RSA PKCS #1 v1.5 signatures and P256 signatures are supported at present.
pub fn verify_signature_message_rust_crypto(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],                 // buffer to verify
    signature: &[u8],                         // signature
    signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
    spki: &SubjectPublicKeyInfoOwned,         // public key
) -> Result<()> {
    if is_rsa(&signature_alg.oid) {
        let enc_spki = spki.to_der()?;
        let rsa = RsaPublicKey::from_public_key_der(&enc_spki).map_err(|e| {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to parse RSA public key: {}", e).as_str(),
            );
            Error::ParseError
        })?;
        let hash_alg = get_hash_alg_from_sig_alg(&signature_alg.oid)?;
        let hash_to_verify = pe.calculate_hash(&hash_alg, message_to_verify)?;
        let ps = get_padding_scheme(signature_alg)?;
        return rsa
            .verify(ps, hash_to_verify.as_slice(), signature)
            .map_err(|_| Error::Unrecognized);
    } else if is_ecdsa(&signature_alg.oid) {
        let named_curve = get_named_curve_parameter(&spki.algorithm)?;
        if PKIXALG_SECP256R1 != named_curve {
            log_message(
                &PeLogLevels::PeError,
                format!("Unrecognized or unsupported named curve: {}", named_curve).as_str(),
            );
            return Err(Error::Unrecognized);
        }
        let ecdsa = VerifyingKey256::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|_| Error::ParseError)?;
        let s = Signature256::from_der(signature).map_err(|_| Error::ParseError)?;
        return ecdsa
            .verify(message_to_verify, &s)
            .map_err(|_| Error::Unrecognized);
    }
    log_message(
        &PeLogLevels::PeError,
        format!("Unrecognized signature algorithm: {}", signature_alg.oid).as_str(),
    );
    Err(Error::Unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PkiEnvironment;
    use hex_literal::hex;

    #[test]
    fn test_calculate_hash() {
        let mut pe = PkiEnvironment::default();
        pe.clear_all_callbacks();
        pe.add_calculate_hash_callback(calculate_hash_rust_crypto);

        let hash_algorithm = AlgorithmIdentifierOwned {
            oid: PKIXALG_SHA256,
            parameters: None,
        };
        let result = pe
            .calculate_hash(&hash_algorithm, "abc".as_bytes())
            .unwrap();
        assert_eq!(
            result,
            hex!("BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD")
        );

        let unknown = AlgorithmIdentifierOwned {
            oid: PKIXALG_RSA_ENCRYPTION,
            parameters: None,
        };
        assert!(pe.calculate_hash(&unknown, "abc".as_bytes()).is_err());
    }

    #[test]
    fn get_hash_alg_from_sig_alg_test() {
        assert_eq!(
            get_hash_alg_from_sig_alg(&PKIXALG_ECDSA_WITH_SHA256)
                .unwrap()
                .oid,
            PKIXALG_SHA256
        );
        assert_eq!(
            get_hash_alg_from_sig_alg(&PKIXALG_SHA224_WITH_RSA_ENCRYPTION)
                .unwrap()
                .oid,
            PKIXALG_SHA224
        );
        assert_eq!(
            get_hash_alg_from_sig_alg(&PKIXALG_SHA384_WITH_RSA_ENCRYPTION)
                .unwrap()
                .oid,
            PKIXALG_SHA384
        );
        assert_eq!(
            get_hash_alg_from_sig_alg(&PKIXALG_SHA512_WITH_RSA_ENCRYPTION)
                .unwrap()
                .oid,
            PKIXALG_SHA512
        );
        assert!(get_hash_alg_from_sig_alg(&PKIXALG_RSA_ENCRYPTION).is_err());
    }
}
