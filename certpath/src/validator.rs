//! Certification path validation per RFC 5280 along with the structures it operates on

pub mod cert_path;
pub mod name_constraints_set;
pub mod path_results;
pub mod path_settings;
pub mod path_validator;
pub mod pdv_certificate;
pub mod pdv_extension;
pub mod policy_tree;
pub mod validator_state;

pub use crate::validator::{
    cert_path::*, name_constraints_set::*, path_results::*, path_settings::*, path_validator::*,
    pdv_certificate::*, pdv_extension::*, policy_tree::*, validator_state::*,
};
