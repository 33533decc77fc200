//! Attribute certificate validation per [RFC 5755] layered on top of certification path validation
//!
//! [RFC 5755]: https://datatracker.ietf.org/doc/html/rfc5755

pub mod ac_settings;
pub mod ac_validator;
pub mod pdv_attribute_certificate;

pub use crate::ac::{ac_settings::*, ac_validator::*, pdv_attribute_certificate::*};
