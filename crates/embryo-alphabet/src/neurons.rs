//! Neuron class registry
//!
//! Classes are identified by name inside genotypes. The registry answers
//! whether a class accepts inputs or produces output, resolves the longest
//! class name at a text position and picks random classes for mutation.

use ahash::HashMap;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::AlphabetError;

/// Class given to neurons that never name one explicitly
pub const DEFAULT_NEURON_CLASS: &str = "N";

/// Descriptor of one neuron class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronClass {
    pub name: String,
    pub accepts_inputs: bool,
    pub has_output: bool,
    #[serde(default)]
    pub description: String,
}

impl NeuronClass {
    pub fn new(name: &str, accepts_inputs: bool, has_output: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            accepts_inputs,
            has_output,
            description: description.to_string(),
        }
    }

    /// Sensors take no inputs and feed a signal into the network
    pub fn is_sensor(&self) -> bool {
        !self.accepts_inputs && self.has_output
    }
}

/// Input/output constraint used when drawing a random class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassFilter {
    pub accepts_inputs: Option<bool>,
    pub has_output: Option<bool>,
}

impl ClassFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn sensor() -> Self {
        Self {
            accepts_inputs: Some(false),
            has_output: Some(true),
        }
    }

    pub fn matches(&self, class: &NeuronClass) -> bool {
        self.accepts_inputs.is_none_or(|v| v == class.accepts_inputs)
            && self.has_output.is_none_or(|v| v == class.has_output)
    }
}

/// Registry of known neuron classes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<NeuronClass>", into = "Vec<NeuronClass>")]
pub struct NeuronRegistry {
    classes: Vec<NeuronClass>,
    by_name: HashMap<String, usize>,
}

impl NeuronRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            classes: Vec::new(),
            by_name: HashMap::default(),
        }
    }

    /// Build a registry from an explicit class list
    pub fn from_classes(classes: Vec<NeuronClass>) -> Result<Self, AlphabetError> {
        let mut registry = Self::empty();
        for class in classes {
            registry.register(class)?;
        }
        Ok(registry)
    }

    fn register_defaults(&mut self) {
        let defaults = [
            NeuronClass::new(DEFAULT_NEURON_CLASS, true, true, "Standard neuron"),
            NeuronClass::new("|", true, false, "Bending muscle"),
            NeuronClass::new("@", true, false, "Rotation muscle"),
            NeuronClass::new("G", false, true, "Gyroscope (equilibrium sensor)"),
            NeuronClass::new("T", false, true, "Touch sensor"),
            NeuronClass::new("S", false, true, "Smell sensor"),
            NeuronClass::new("*", false, true, "Constant output"),
            NeuronClass::new("Sin", false, true, "Sine generator"),
            NeuronClass::new("Thr", true, true, "Threshold neuron"),
        ];
        for class in defaults {
            // Defaults are distinct and non-empty
            if let Err(e) = self.register(class) {
                log::error!("Failed to register default neuron class: {}", e);
            }
        }
    }

    /// Add a class; names must be unique and non-empty
    pub fn register(&mut self, class: NeuronClass) -> Result<(), AlphabetError> {
        if class.name.is_empty() {
            return Err(AlphabetError::EmptyClassName);
        }
        if self.by_name.contains_key(&class.name) {
            return Err(AlphabetError::DuplicateClass(class.name));
        }
        self.by_name.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&NeuronClass> {
        self.by_name.get(name).map(|&idx| &self.classes[idx])
    }

    pub fn classes(&self) -> &[NeuronClass] {
        &self.classes
    }

    /// Longest registered class name that `text` starts with
    pub fn longest_prefix(&self, text: &str) -> Option<&NeuronClass> {
        self.classes
            .iter()
            .filter(|c| text.starts_with(c.name.as_str()))
            .max_by_key(|c| c.name.len())
    }

    /// Whether some other class name extends `name`
    pub fn has_extension_of(&self, name: &str) -> bool {
        self.classes
            .iter()
            .any(|c| c.name.len() > name.len() && c.name.starts_with(name))
    }

    pub fn sensors(&self) -> impl Iterator<Item = &NeuronClass> {
        self.classes.iter().filter(|c| c.is_sensor())
    }

    /// Draw a random class satisfying `filter`
    pub fn random_class<R: Rng + ?Sized>(
        &self,
        filter: ClassFilter,
        rng: &mut R,
    ) -> Option<&NeuronClass> {
        let candidates: Vec<&NeuronClass> =
            self.classes.iter().filter(|c| filter.matches(c)).collect();
        candidates.choose(rng).copied()
    }
}

impl Default for NeuronRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_defaults();
        registry
    }
}

impl TryFrom<Vec<NeuronClass>> for NeuronRegistry {
    type Error = AlphabetError;

    fn try_from(classes: Vec<NeuronClass>) -> Result<Self, Self::Error> {
        Self::from_classes(classes)
    }
}

impl From<NeuronRegistry> for Vec<NeuronClass> {
    fn from(registry: NeuronRegistry) -> Self {
        registry.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_default_registry_lookup() {
        let registry = NeuronRegistry::default();
        let neuron = registry.find("N").expect("standard neuron");
        assert!(neuron.accepts_inputs);
        assert!(neuron.has_output);

        let touch = registry.find("T").expect("touch sensor");
        assert!(touch.is_sensor());

        let muscle = registry.find("|").expect("muscle");
        assert!(!muscle.is_sensor());
        assert!(registry.find("Nope").is_none());
    }

    #[test]
    fn test_longest_prefix_prefers_longer_names() {
        let registry = NeuronRegistry::default();
        assert_eq!(registry.longest_prefix("Thr>").map(|c| c.name.as_str()), Some("Thr"));
        assert_eq!(registry.longest_prefix("T>").map(|c| c.name.as_str()), Some("T"));
        assert_eq!(registry.longest_prefix("Sin:").map(|c| c.name.as_str()), Some("Sin"));
        assert!(registry.longest_prefix("Z").is_none());
    }

    #[test]
    fn test_extension_detection() {
        let registry = NeuronRegistry::default();
        assert!(registry.has_extension_of("T"));
        assert!(registry.has_extension_of("S"));
        assert!(!registry.has_extension_of("G"));
        assert!(!registry.has_extension_of("Thr"));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = NeuronRegistry::default();
        let result = registry.register(NeuronClass::new("G", false, true, ""));
        assert_eq!(result, Err(AlphabetError::DuplicateClass("G".to_string())));
        assert_eq!(
            registry.register(NeuronClass::new("", true, true, "")),
            Err(AlphabetError::EmptyClassName)
        );
    }

    #[test]
    fn test_random_sensor_is_always_a_sensor() {
        let registry = NeuronRegistry::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(99);
        for _ in 0..50 {
            let class = registry
                .random_class(ClassFilter::sensor(), &mut rng)
                .expect("default registry has sensors");
            assert!(class.is_sensor());
        }
    }

    #[test]
    fn test_random_class_with_impossible_filter() {
        let registry = NeuronRegistry::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let filter = ClassFilter {
            accepts_inputs: Some(false),
            has_output: Some(false),
        };
        assert!(registry.random_class(filter, &mut rng).is_none());
    }
}
