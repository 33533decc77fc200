//! Error types

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Reasons a certification path may fail validation
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum PathValidationStatus {
    /// IssuerMismatch occurs when the issuer name of a certificate does not match the subject name of
    /// the immediately superior certificate (i.e., the working issuer name).
    IssuerMismatch,
    /// SignatureInvalid occurs when the working public key does not verify the signature of the
    /// immediately subordinate certificate.
    SignatureInvalid,
    /// Expired occurs when a certificate contains a notAfter date that is before the time of interest.
    Expired,
    /// NotYetValid occurs when a certificate contains a notBefore date that is after the time of interest.
    NotYetValid,
    /// NameConstraintViolation occurs when a subject name or subject alternative name falls outside the
    /// permitted subtrees or within the excluded subtrees accumulated along the path.
    NameConstraintViolation,
    /// NotACertificateAuthority occurs when an intermediate certificate lacks a basicConstraints
    /// extension or features a basicConstraints extension with the cA field set to false.
    NotACertificateAuthority,
    /// PathLengthExceeded occurs when a path has more CA certificates than allowed by either the
    /// configured maximum or a pathLenConstraint asserted by a CA certificate in the path.
    PathLengthExceeded,
    /// KeyUsageViolation occurs when an intermediate CA certificate has a keyUsage extension that
    /// does not assert keyCertSign.
    KeyUsageViolation,
    /// PolicyRequiredButNoneValid occurs when explicit policy is required and the valid_policy_tree
    /// is NULL.
    PolicyRequiredButNoneValid,
    /// UnsupportedCriticalExtension occurs when a certificate features a critical extension that is
    /// not processed during certification path validation.
    UnsupportedCriticalExtension,
    /// PathBuildingFailed occurs when no chain connecting a trust anchor to a target could be found.
    PathBuildingFailed,
    /// InvalidPolicyMapping occurs when a policyMappings extension maps to or from anyPolicy.
    InvalidPolicyMapping,
    /// UnsupportedNameForm occurs when a nameConstraints extension features a subtree of an
    /// unsupported form with a nonzero minimum value.
    UnsupportedNameForm,
    /// MissingCertificate occurs when a certification path contains no certificates.
    MissingCertificate,
}

/// Reasons an attribute certificate may fail validation
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum AcValidationStatus {
    /// HolderMismatch occurs when the target of the holder path does not match the Holder field.
    HolderMismatch,
    /// IssuerMismatch occurs when the target of the issuer path does not match the AttCertIssuer field.
    IssuerMismatch,
    /// InvalidIssuerPath occurs when the issuer path fails validation or when the AC issuer
    /// certificate is not suitable for issuing attribute certificates.
    InvalidIssuerPath,
    /// InvalidHolderPath occurs when the holder path fails validation.
    InvalidHolderPath,
    /// SignatureInvalid occurs when the AC issuer public key does not verify the AC signature.
    SignatureInvalid,
    /// UnsupportedCriticalExtension occurs when the attribute certificate features a critical
    /// extension that is not recognized.
    UnsupportedCriticalExtension,
    /// Expired occurs when notAfterTime is before the time of interest.
    Expired,
    /// NotYetValid occurs when notBeforeTime is after the time of interest.
    NotYetValid,
    /// TargetMismatch occurs when none of the configured targets appear in the targetInformation
    /// extension of the attribute certificate.
    TargetMismatch,
    /// AttributeNotPermitted occurs when an attribute type is not allowed by aaControls.
    AttributeNotPermitted,
}

/// Describes a path validation failure, including the index of the certificate that failed (where
/// index 0 is the trust anchor) and some context useful for producing a diagnostic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathValidationFailure {
    /// Reason for the failure
    pub status: PathValidationStatus,
    /// Index of the certificate that failed within the certification path
    pub index: usize,
    /// Offending names, OIDs or counter values
    pub context: String,
}

impl PathValidationFailure {
    /// Creates a new PathValidationFailure
    pub fn new(status: PathValidationStatus, index: usize, context: impl Into<String>) -> Self {
        PathValidationFailure {
            status,
            index,
            context: context.into(),
        }
    }
}

/// Describes an attribute certificate validation failure
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AcValidationFailure {
    /// Reason for the failure
    pub status: AcValidationStatus,
    /// Offending names, OIDs or times
    pub context: String,
    /// Error encountered while validating the holder or issuer path, if any
    pub source: Option<Box<Error>>,
}

impl AcValidationFailure {
    /// Creates a new AcValidationFailure with no underlying error
    pub fn new(status: AcValidationStatus, context: impl Into<String>) -> Self {
        AcValidationFailure {
            status,
            context: context.into(),
            source: None,
        }
    }

    /// Creates a new AcValidationFailure wrapping an error returned by path validation
    pub fn with_source(status: AcValidationStatus, context: impl Into<String>, source: Error) -> Self {
        AcValidationFailure {
            status,
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Error type
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// PathValidationError encountered
    PathValidation(PathValidationFailure),
    /// No certification path could be built
    PathBuilding(String),
    /// Attribute certificate validation error encountered
    AcValidation(AcValidationFailure),
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// Unrecognized occurs when an error conditions does not match anything else here.
    Unrecognized,
    /// An artifact could not be parsed
    ParseError,
    /// A configuration error was detected. See textual log output for more details.
    Misconfiguration,
    /// Asn1Error is used to propagate error information from the der and x509-cert crates.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    StdIoError(std::io::ErrorKind),
}

impl Error {
    /// Shorthand for constructing an [`Error::PathValidation`] value
    pub fn path(status: PathValidationStatus, index: usize, context: impl Into<String>) -> Self {
        Error::PathValidation(PathValidationFailure::new(status, index, context))
    }

    /// Shorthand for constructing an [`Error::AcValidation`] value
    pub fn ac(status: AcValidationStatus, context: impl Into<String>) -> Self {
        Error::AcValidation(AcValidationFailure::new(status, context))
    }

    /// Returns the path validation status carried by this error, if any
    pub fn path_validation_status(&self) -> Option<PathValidationStatus> {
        match self {
            Error::PathValidation(pvf) => Some(pvf.status),
            Error::PathBuilding(_) => Some(PathValidationStatus::PathBuildingFailed),
            _ => None,
        }
    }

    /// Returns the attribute certificate validation status carried by this error, if any
    pub fn ac_validation_status(&self) -> Option<AcValidationStatus> {
        match self {
            Error::AcValidation(acf) => Some(acf.status),
            _ => None,
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl fmt::Display for PathValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationStatus::IssuerMismatch => write!(f, "IssuerMismatch"),
            PathValidationStatus::SignatureInvalid => write!(f, "SignatureInvalid"),
            PathValidationStatus::Expired => write!(f, "Expired"),
            PathValidationStatus::NotYetValid => write!(f, "NotYetValid"),
            PathValidationStatus::NameConstraintViolation => write!(f, "NameConstraintViolation"),
            PathValidationStatus::NotACertificateAuthority => {
                write!(f, "NotACertificateAuthority")
            }
            PathValidationStatus::PathLengthExceeded => write!(f, "PathLengthExceeded"),
            PathValidationStatus::KeyUsageViolation => write!(f, "KeyUsageViolation"),
            PathValidationStatus::PolicyRequiredButNoneValid => {
                write!(f, "PolicyRequiredButNoneValid")
            }
            PathValidationStatus::UnsupportedCriticalExtension => {
                write!(f, "UnsupportedCriticalExtension")
            }
            PathValidationStatus::PathBuildingFailed => write!(f, "PathBuildingFailed"),
            PathValidationStatus::InvalidPolicyMapping => write!(f, "InvalidPolicyMapping"),
            PathValidationStatus::UnsupportedNameForm => write!(f, "UnsupportedNameForm"),
            PathValidationStatus::MissingCertificate => write!(f, "MissingCertificate"),
        }
    }
}

impl fmt::Display for AcValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcValidationStatus::HolderMismatch => write!(f, "HolderMismatch"),
            AcValidationStatus::IssuerMismatch => write!(f, "IssuerMismatch"),
            AcValidationStatus::InvalidIssuerPath => write!(f, "InvalidIssuerPath"),
            AcValidationStatus::InvalidHolderPath => write!(f, "InvalidHolderPath"),
            AcValidationStatus::SignatureInvalid => write!(f, "SignatureInvalid"),
            AcValidationStatus::UnsupportedCriticalExtension => {
                write!(f, "UnsupportedCriticalExtension")
            }
            AcValidationStatus::Expired => write!(f, "Expired"),
            AcValidationStatus::NotYetValid => write!(f, "NotYetValid"),
            AcValidationStatus::TargetMismatch => write!(f, "TargetMismatch"),
            AcValidationStatus::AttributeNotPermitted => write!(f, "AttributeNotPermitted"),
        }
    }
}

impl fmt::Display for PathValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{} at certificate #{}", self.status, self.index)
        } else {
            write!(
                f,
                "{} at certificate #{}: {}",
                self.status, self.index, self.context
            )
        }
    }
}

impl fmt::Display for AcValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if !self.context.is_empty() {
            write!(f, ": {}", self.context)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PathValidation(err) => write!(f, "PathValidationError: {}", err),
            Error::PathBuilding(err) => write!(f, "PathBuildingError: {}", err),
            Error::AcValidation(err) => write!(f, "AcValidationError: {}", err),
            Error::NotFound => write!(f, "NotFound"),
            Error::Unrecognized => write!(f, "Unrecognized"),
            Error::ParseError => write!(f, "ParseError"),
            Error::Misconfiguration => write!(f, "Misconfiguration"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            Error::StdIoError(err) => write!(f, "StdError: {:?}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<PathValidationFailure> for Error {
    fn from(err: PathValidationFailure) -> Error {
        Error::PathValidation(err)
    }
}

impl From<AcValidationFailure> for Error {
    fn from(err: AcValidationFailure) -> Error {
        Error::AcValidation(err)
    }
}

/// Returns a short description of an error suitable for inclusion in another error's context
pub(crate) fn error_summary(err: &Error) -> String {
    match err {
        Error::PathValidation(pvf) => pvf.to_string(),
        _ => err.to_string(),
    }
}

#[test]
fn error_test() {
    use alloc::format;

    let _s = format!("{}", PathValidationStatus::IssuerMismatch);
    let _s = format!("{}", PathValidationStatus::SignatureInvalid);
    let _s = format!("{}", PathValidationStatus::Expired);
    let _s = format!("{}", PathValidationStatus::NotYetValid);
    let _s = format!("{}", PathValidationStatus::NameConstraintViolation);
    let _s = format!("{}", PathValidationStatus::NotACertificateAuthority);
    let _s = format!("{}", PathValidationStatus::PathLengthExceeded);
    let _s = format!("{}", PathValidationStatus::KeyUsageViolation);
    let _s = format!("{}", PathValidationStatus::PolicyRequiredButNoneValid);
    let _s = format!("{}", PathValidationStatus::UnsupportedCriticalExtension);
    let _s = format!("{}", PathValidationStatus::PathBuildingFailed);
    let _s = format!("{}", PathValidationStatus::InvalidPolicyMapping);
    let _s = format!("{}", PathValidationStatus::UnsupportedNameForm);
    let _s = format!("{:?}", PathValidationStatus::MissingCertificate);
    let _s = format!("{}", AcValidationStatus::HolderMismatch);
    let _s = format!("{}", AcValidationStatus::IssuerMismatch);
    let _s = format!("{}", AcValidationStatus::InvalidIssuerPath);
    let _s = format!("{}", AcValidationStatus::InvalidHolderPath);
    let _s = format!("{}", AcValidationStatus::SignatureInvalid);
    let _s = format!("{}", AcValidationStatus::UnsupportedCriticalExtension);
    let _s = format!("{}", AcValidationStatus::Expired);
    let _s = format!("{}", AcValidationStatus::NotYetValid);
    let _s = format!("{}", AcValidationStatus::TargetMismatch);
    let _s = format!("{:?}", AcValidationStatus::AttributeNotPermitted);
    let _s = format!("{}", Error::NotFound);
    let _s = format!("{}", Error::Unrecognized);
    let _s = format!("{}", Error::ParseError);
    let _s = format!("{}", Error::Misconfiguration);
    let _s = format!("{}", Error::PathBuilding("no path".to_string()));
    let _s = format!("{}", Error::StdIoError(std::io::ErrorKind::NotFound));

    let e = Error::path(PathValidationStatus::Expired, 2, "notAfter: 1000");
    assert_eq!(
        "PathValidationError: Expired at certificate #2: notAfter: 1000",
        format!("{}", e)
    );
    assert_eq!(
        Some(PathValidationStatus::Expired),
        e.path_validation_status()
    );
    assert_eq!(None, e.ac_validation_status());

    let ac = AcValidationFailure::with_source(AcValidationStatus::InvalidHolderPath, "", e);
    let ace = Error::AcValidation(ac);
    assert_eq!(
        Some(AcValidationStatus::InvalidHolderPath),
        ace.ac_validation_status()
    );
    assert!(format!("{}", ace).contains("Expired at certificate #2"));
    assert_eq!(
        Some(PathValidationStatus::PathBuildingFailed),
        Error::PathBuilding("x".to_string()).path_validation_status()
    );
}
