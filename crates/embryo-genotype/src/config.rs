//! Tunable probabilities and step sizes of the genetic operators
//!
//! Hard caps live in the crate root as constants; everything here may be
//! overridden from a configuration file.

use serde::{Deserialize, Serialize};

/// Errors raised by `OperatorConfig::validate`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Weight '{name}' must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("All {group} weights are zero")]
    AllWeightsZero { group: &'static str },

    #[error("Crossover fraction range {min}..={max} must lie within 0..=1 and not be inverted")]
    InvalidFractionRange { min: f64, max: f64 },

    #[error("Crossover tolerance must be within 0..1, got {0}")]
    InvalidTolerance(f64),

    #[error("Weight perturbation sigma must be finite and positive, got {0}")]
    InvalidSigma(f64),

    #[error("Connection offset step must be at least 1, got {0}")]
    InvalidOffsetStep(i32),
}

/// Roulette weights of the three mutation classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationWeights {
    pub add: f64,
    pub delete: f64,
    pub modify: f64,
}

impl Default for MutationWeights {
    fn default() -> Self {
        Self {
            add: 0.4,
            delete: 0.3,
            modify: 0.3,
        }
    }
}

impl MutationWeights {
    pub fn as_array(&self) -> [f64; 3] {
        [self.add, self.delete, self.modify]
    }
}

/// Roulette weights of the "add" sub-operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddWeights {
    pub division: f64,
    pub connection: f64,
    pub neuron_property: f64,
    pub repetition: f64,
    pub modifier: f64,
}

impl Default for AddWeights {
    fn default() -> Self {
        Self {
            division: 0.2,
            connection: 0.2,
            neuron_property: 0.1,
            repetition: 0.1,
            modifier: 0.4,
        }
    }
}

impl AddWeights {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.division,
            self.connection,
            self.neuron_property,
            self.repetition,
            self.modifier,
        ]
    }

    /// Weights that only ever insert a simple modifier
    pub fn modifier_only() -> Self {
        Self {
            division: 0.0,
            connection: 0.0,
            neuron_property: 0.0,
            repetition: 0.0,
            modifier: 1.0,
        }
    }
}

/// Configuration of mutation and crossover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub mutation: MutationWeights,
    pub add: AddWeights,
    /// Lower bound of the crossover target fraction
    pub crossover_min_fraction: f64,
    /// Upper bound of the crossover target fraction
    pub crossover_max_fraction: f64,
    /// Relative size tolerance around the crossover target
    pub crossover_tolerance: f64,
    /// Standard deviation of connection weight perturbation
    pub weight_sigma: f64,
    /// Largest change of a relative connection offset per modification
    pub offset_step: i32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            mutation: MutationWeights::default(),
            add: AddWeights::default(),
            crossover_min_fraction: 0.3,
            crossover_max_fraction: 0.7,
            crossover_tolerance: 0.1,
            weight_sigma: 0.5,
            offset_step: 1,
        }
    }
}

impl OperatorConfig {
    /// Check weights, ranges and step sizes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mutation = [
            ("mutation.add", self.mutation.add),
            ("mutation.delete", self.mutation.delete),
            ("mutation.modify", self.mutation.modify),
        ];
        let add = [
            ("add.division", self.add.division),
            ("add.connection", self.add.connection),
            ("add.neuron_property", self.add.neuron_property),
            ("add.repetition", self.add.repetition),
            ("add.modifier", self.add.modifier),
        ];
        for (group, weights) in [("mutation", &mutation[..]), ("add", &add[..])] {
            for &(name, value) in weights {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidWeight { name, value });
                }
            }
            if weights.iter().all(|&(_, value)| value == 0.0) {
                return Err(ConfigError::AllWeightsZero { group });
            }
        }

        let (min, max) = (self.crossover_min_fraction, self.crossover_max_fraction);
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(ConfigError::InvalidFractionRange { min, max });
        }
        if !(0.0..1.0).contains(&self.crossover_tolerance) {
            return Err(ConfigError::InvalidTolerance(self.crossover_tolerance));
        }
        if !self.weight_sigma.is_finite() || self.weight_sigma <= 0.0 {
            return Err(ConfigError::InvalidSigma(self.weight_sigma));
        }
        if self.offset_step < 1 {
            return Err(ConfigError::InvalidOffsetStep(self.offset_step));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OperatorConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.crossover_min_fraction, 0.3);
        assert_eq!(config.crossover_max_fraction, 0.7);
        assert_eq!(config.crossover_tolerance, 0.1);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = OperatorConfig::default();
        config.mutation.delete = -1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidWeight {
                name: "mutation.delete",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_all_zero_group_rejected() {
        let mut config = OperatorConfig::default();
        config.add = AddWeights {
            division: 0.0,
            connection: 0.0,
            neuron_property: 0.0,
            repetition: 0.0,
            modifier: 0.0,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::AllWeightsZero { group: "add" })
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config = OperatorConfig {
            crossover_min_fraction: 0.8,
            crossover_max_fraction: 0.2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFractionRange { .. })
        ));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: OperatorConfig =
            ron::from_str("(mutation: (add: 1.0, delete: 0.0, modify: 0.0), weight_sigma: 0.1)")
                .unwrap();
        assert_eq!(config.mutation.add, 1.0);
        assert_eq!(config.weight_sigma, 0.1);
        assert_eq!(config.add, AddWeights::default());
        assert_eq!(config.offset_step, 1);
    }
}
