//! Utility functions and types used throughout the crate

pub mod crypto;
pub mod error;
pub mod logging;
pub mod pdv_alg_oids;
pub mod pdv_utilities;

pub use crate::{
    util::crypto::*, util::error::*, util::logging::*, util::pdv_alg_oids::*,
    util::pdv_utilities::*,
};
