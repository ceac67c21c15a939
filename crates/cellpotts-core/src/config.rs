//! Stepper configuration.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::model::ModelError;

/// Static configuration for a [`CellPotts`](crate::CellPotts) model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PottsConfig {
    /// Metropolis temperature; zero accepts only non-increasing moves.
    pub temperature: f64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Proposals per sweep; defaults to the number of occupied locations.
    pub moves_per_step: Option<usize>,
    /// Let a cell give up its last location and be removed.
    pub allow_cell_death: bool,
    /// Number of sweep summaries retained.
    pub history_capacity: usize,
}

impl Default for PottsConfig {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            rng_seed: None,
            moves_per_step: None,
            allow_cell_death: false,
            history_capacity: 256,
        }
    }
}

impl PottsConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_temperature(self.temperature)?;
        if self.moves_per_step == Some(0) {
            return Err(ModelError::InvalidConfig("moves_per_step must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(ModelError::InvalidConfig("history_capacity must be positive"));
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

pub(crate) fn validate_temperature(temperature: f64) -> Result<(), ModelError> {
    if !temperature.is_finite() || temperature < 0.0 {
        return Err(ModelError::InvalidConfig(
            "temperature must be finite and non-negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn defaults_validate() {
        assert!(PottsConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            PottsConfig {
                temperature: -1.0,
                ..PottsConfig::default()
            },
            PottsConfig {
                temperature: f64::INFINITY,
                ..PottsConfig::default()
            },
            PottsConfig {
                moves_per_step: Some(0),
                ..PottsConfig::default()
            },
            PottsConfig {
                history_capacity: 0,
                ..PottsConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(ModelError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PottsConfig =
            serde_json::from_str(r#"{"temperature": 5.0, "rng_seed": 7}"#).expect("parse");
        assert_eq!(config.temperature, 5.0);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.history_capacity, 256);
        assert!(!config.allow_cell_death);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let config = PottsConfig {
            rng_seed: Some(42),
            ..PottsConfig::default()
        };
        let a: u64 = config.seeded_rng().random();
        let b: u64 = config.seeded_rng().random();
        assert_eq!(a, b);
    }
}
