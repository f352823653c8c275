//! Command-line configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `embryo.ron` file (or the file given with `--config`)
//! 3. Environment variables prefixed with `EMBRYO_`
//!
//! Example environment variable: `EMBRYO_OPERATORS__WEIGHT_SIGMA=0.25`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use embryo_alphabet::Alphabet;
use embryo_genotype::OperatorConfig;
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbryoConfig {
    #[serde(default)]
    pub operators: OperatorConfig,

    /// Seed for mutation and crossover; drawn at random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// RON file replacing the default alphabet
    #[serde(default)]
    pub alphabet_file: Option<PathBuf>,
}

impl EmbryoConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `embryo.ron`, or `path` when given (then it must exist)
    /// 3. Environment variables prefixed with `EMBRYO_` (highest priority)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = OperatorConfig::default();
        let file = match path {
            Some(path) => File::from(path).format(config::FileFormat::Ron).required(true),
            None => File::with_name("embryo")
                .format(config::FileFormat::Ron)
                .required(false),
        };

        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("operators.mutation.add", defaults.mutation.add)?
            .set_default("operators.mutation.delete", defaults.mutation.delete)?
            .set_default("operators.mutation.modify", defaults.mutation.modify)?
            .set_default("operators.add.division", defaults.add.division)?
            .set_default("operators.add.connection", defaults.add.connection)?
            .set_default("operators.add.neuron_property", defaults.add.neuron_property)?
            .set_default("operators.add.repetition", defaults.add.repetition)?
            .set_default("operators.add.modifier", defaults.add.modifier)?
            .set_default(
                "operators.crossover_min_fraction",
                defaults.crossover_min_fraction,
            )?
            .set_default(
                "operators.crossover_max_fraction",
                defaults.crossover_max_fraction,
            )?
            .set_default("operators.crossover_tolerance", defaults.crossover_tolerance)?
            .set_default("operators.weight_sigma", defaults.weight_sigma)?
            .set_default("operators.offset_step", i64::from(defaults.offset_step))?
            // Layer 2: Config file
            .add_source(file)
            // Layer 3: Environment variables (EMBRYO_OPERATORS__WEIGHT_SIGMA, etc.)
            .add_source(Environment::with_prefix("EMBRYO").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config
            .operators
            .validate()
            .context("Invalid operator configuration")?;
        Ok(config)
    }

    /// Alphabet to parse genotypes with
    pub fn alphabet(&self) -> Result<Alphabet> {
        let Some(path) = &self.alphabet_file else {
            return Ok(Alphabet::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alphabet file {}", path.display()))?;
        let loaded: Alphabet = ron::from_str(&text)
            .with_context(|| format!("Failed to parse alphabet file {}", path.display()))?;
        Alphabet::new(loaded.properties, loaded.neurons).context("Inconsistent alphabet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("embryo-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).expect("Failed to write temp file");
        path
    }

    #[test]
    fn test_default_config() {
        let config = EmbryoConfig::default();
        assert_eq!(config.operators, OperatorConfig::default());
        assert_eq!(config.seed, None);
        assert!(config.alphabet_file.is_none());
    }

    #[test]
    fn test_load_config_with_defaults() {
        // Should load defaults when no config file exists
        let config = EmbryoConfig::load(None).expect("Failed to load config");
        assert_eq!(config.operators.crossover_min_fraction, 0.3);
        assert_eq!(config.operators.mutation.add, 0.4);
        assert_eq!(config.operators.offset_step, 1);
    }

    #[test]
    fn test_load_config_file_overrides_defaults() {
        let path = temp_file(
            "override.ron",
            "(seed: Some(7), operators: (weight_sigma: 0.25, mutation: (add: 1.0, delete: 0.0, modify: 0.0)))",
        );
        let config = EmbryoConfig::load(Some(&path)).expect("Failed to load config");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.operators.weight_sigma, 0.25);
        assert_eq!(config.operators.mutation.add, 1.0);
        assert_eq!(config.operators.crossover_max_fraction, 0.7);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("embryo-does-not-exist.ron");
        assert!(EmbryoConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_operators_are_rejected() {
        let path = temp_file("invalid.ron", "(operators: (crossover_min_fraction: 0.9))");
        assert!(EmbryoConfig::load(Some(&path)).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_alphabet_from_file() {
        let alphabet = Alphabet::default();
        let path = temp_file(
            "alphabet.ron",
            &ron::to_string(&alphabet).expect("Failed to serialize alphabet"),
        );
        let config = EmbryoConfig {
            alphabet_file: Some(path.clone()),
            ..Default::default()
        };
        let loaded = config.alphabet().expect("Failed to load alphabet");
        assert_eq!(loaded.properties.symbols(), alphabet.properties.symbols());
        let _ = std::fs::remove_file(path);
    }
}
