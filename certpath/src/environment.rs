//! Provides the [`PkiEnvironment`] switchboard of callbacks along with the function and trait
//! definitions it aggregates

pub mod pki_environment;
pub mod pki_environment_traits;

pub use crate::{environment::pki_environment::*, environment::pki_environment_traits::*};
