//! Built-in abilities for Toolstream agents.
//!
//! Each module exposes a constructor returning a ready [`Ability`];
//! [`default_registry`] bundles all of them.

pub mod current_time;
pub mod weather_lookup;

use toolstream_core::ability::{Ability, AbilityRegistry};
use toolstream_core::error::AbilityError;

/// Every built-in ability, in registration order.
pub fn all() -> Result<Vec<Ability>, AbilityError> {
    Ok(vec![weather_lookup::ability()?, current_time::ability()?])
}

/// Create a registry holding all built-in abilities.
pub fn default_registry() -> Result<AbilityRegistry, AbilityError> {
    Ok(all()?.into_iter().collect())
}
