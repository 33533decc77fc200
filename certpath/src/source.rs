//! Sources of certificates used when building certification paths

pub mod cert_source;

pub use crate::source::cert_source::*;
