//! Alphabet and property model for developmental genotypes
//!
//! This crate provides the read-only tables the genotype core consumes:
//! - Structural symbols of the encoding (`STRUCTURAL_SYMBOLS`)
//! - Simple modifiers and the genetic property model (`PropertyModel`, `GeneProps`)
//! - Neuron properties adjusted by `:+!:`-style tokens (`NeuronProps`)
//! - The neuron-class registry (`NeuronRegistry`)
//!
//! Both tables are injected configuration: `Alphabet::default()` provides
//! the standard set and the whole bundle can be loaded from RON.

mod neurons;
mod props;

pub use neurons::{ClassFilter, DEFAULT_NEURON_CLASS, NeuronClass, NeuronRegistry};
pub use props::{
    Direction, GeneProperty, GeneProps, Modifier, NeuronProperty, NeuronProps, PropertyModel,
    PropertyRule, Sign, Step, perturb,
};

use serde::{Deserialize, Serialize};

/// Symbols with a fixed structural meaning; never usable as modifiers
pub const STRUCTURAL_SYMBOLS: &[char] = &['<', '>', '#', '[', ']', ':', '"', 'X', 'N'];

/// Check whether a character is one of the fixed structural symbols
pub fn is_structural(c: char) -> bool {
    STRUCTURAL_SYMBOLS.contains(&c)
}

/// Errors raised when an injected table is inconsistent
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlphabetError {
    #[error("Modifier '{0}' is defined more than once")]
    DuplicateModifier(char),

    #[error("Modifier '{0}' collides with a structural symbol")]
    StructuralModifier(char),

    #[error("Modifier '{0}' must be an ASCII letter")]
    InvalidModifier(char),

    #[error("Property {0:?} has no rule")]
    MissingRule(GeneProperty),

    #[error("Rule for {property:?} is inconsistent: {message}")]
    InvalidRule {
        property: GeneProperty,
        message: String,
    },

    #[error("Neuron class name must not be empty")]
    EmptyClassName,

    #[error("Neuron class '{0}' is registered more than once")]
    DuplicateClass(String),
}

/// Complete alphabet handed to the parser, interpreter and operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alphabet {
    pub properties: PropertyModel,
    pub neurons: NeuronRegistry,
}

impl Alphabet {
    /// Bundle a property model and a registry after checking both
    pub fn new(properties: PropertyModel, neurons: NeuronRegistry) -> Result<Self, AlphabetError> {
        properties.validate()?;
        Ok(Self {
            properties,
            neurons,
        })
    }

    /// Whether `c` is a simple modifier symbol
    pub fn is_modifier(&self, c: char) -> bool {
        self.properties.modifier(c).is_some()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            properties: PropertyModel::default(),
            neurons: NeuronRegistry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_alphabet_is_consistent() {
        let alphabet = Alphabet::default();
        assert!(alphabet.properties.validate().is_ok());
        assert!(alphabet.is_modifier('L'));
        assert!(alphabet.is_modifier('l'));
        assert!(!alphabet.is_modifier('X'));
        assert!(alphabet.neurons.find("N").is_some());
    }

    #[test]
    fn test_structural_symbols() {
        for c in ['<', '>', '#', 'X', 'N', '[', ':'] {
            assert!(is_structural(c));
        }
        assert!(!is_structural('L'));
        assert!(!is_structural('|'));
    }

    #[test]
    fn test_alphabet_ron_roundtrip() {
        let alphabet = Alphabet::default();
        let text = ron::to_string(&alphabet).expect("serialize");
        let loaded: Alphabet = ron::from_str(&text).expect("deserialize");
        assert_eq!(
            loaded.neurons.classes().len(),
            alphabet.neurons.classes().len()
        );
        assert_eq!(loaded.properties.symbols(), alphabet.properties.symbols());
    }
}
