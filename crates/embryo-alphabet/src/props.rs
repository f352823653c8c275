//! Genetic properties carried by developing cells
//!
//! Simple modifier letters (`L`, `l`, `W`, ...) nudge one continuous property
//! of a cell. Each property has a rule describing its range, how strongly a
//! modifier moves it and how much of it a daughter cell inherits.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{AlphabetError, is_structural};

/// Continuous genetic property adjusted by simple modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneProperty {
    Length,
    Curvedness,
    Weight,
    Friction,
    Twist,
    Rotation,
    MusclePower,
    Assimilation,
    Stamina,
    Ingestion,
}

impl GeneProperty {
    pub const ALL: [GeneProperty; 10] = [
        GeneProperty::Length,
        GeneProperty::Curvedness,
        GeneProperty::Weight,
        GeneProperty::Friction,
        GeneProperty::Twist,
        GeneProperty::Rotation,
        GeneProperty::MusclePower,
        GeneProperty::Assimilation,
        GeneProperty::Stamina,
        GeneProperty::Ingestion,
    ];

    /// Members of the biological group, renormalized to sum to 1.0
    pub const BIOLOGICAL: [GeneProperty; 4] = [
        GeneProperty::MusclePower,
        GeneProperty::Assimilation,
        GeneProperty::Stamina,
        GeneProperty::Ingestion,
    ];

    pub fn is_biological(&self) -> bool {
        Self::BIOLOGICAL.contains(self)
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            GeneProperty::Length => "length",
            GeneProperty::Curvedness => "curvedness",
            GeneProperty::Weight => "weight",
            GeneProperty::Friction => "friction",
            GeneProperty::Twist => "twist",
            GeneProperty::Rotation => "rotation",
            GeneProperty::MusclePower => "muscle power",
            GeneProperty::Assimilation => "assimilation",
            GeneProperty::Stamina => "stamina",
            GeneProperty::Ingestion => "ingestion",
        }
    }
}

impl std::fmt::Display for GeneProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Property snapshot held by each developmental cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneProps {
    pub length: f64,
    pub curvedness: f64,
    pub weight: f64,
    pub friction: f64,
    pub twist: f64,
    pub rotation: f64,
    pub muscle_power: f64,
    pub assimilation: f64,
    pub stamina: f64,
    pub ingestion: f64,
}

impl GeneProps {
    pub fn get(&self, property: GeneProperty) -> f64 {
        match property {
            GeneProperty::Length => self.length,
            GeneProperty::Curvedness => self.curvedness,
            GeneProperty::Weight => self.weight,
            GeneProperty::Friction => self.friction,
            GeneProperty::Twist => self.twist,
            GeneProperty::Rotation => self.rotation,
            GeneProperty::MusclePower => self.muscle_power,
            GeneProperty::Assimilation => self.assimilation,
            GeneProperty::Stamina => self.stamina,
            GeneProperty::Ingestion => self.ingestion,
        }
    }

    pub fn set(&mut self, property: GeneProperty, value: f64) {
        let slot = match property {
            GeneProperty::Length => &mut self.length,
            GeneProperty::Curvedness => &mut self.curvedness,
            GeneProperty::Weight => &mut self.weight,
            GeneProperty::Friction => &mut self.friction,
            GeneProperty::Twist => &mut self.twist,
            GeneProperty::Rotation => &mut self.rotation,
            GeneProperty::MusclePower => &mut self.muscle_power,
            GeneProperty::Assimilation => &mut self.assimilation,
            GeneProperty::Stamina => &mut self.stamina,
            GeneProperty::Ingestion => &mut self.ingestion,
        };
        *slot = value;
    }

    /// Sum of the biological group
    pub fn biological_total(&self) -> f64 {
        GeneProperty::BIOLOGICAL.iter().map(|&p| self.get(p)).sum()
    }

    /// Rescale the biological group so it sums to 1.0
    pub fn normalize_biology(&mut self) {
        let total = self.biological_total();
        if total <= f64::EPSILON || !total.is_finite() {
            for property in GeneProperty::BIOLOGICAL {
                self.set(property, 0.25);
            }
            return;
        }
        for property in GeneProperty::BIOLOGICAL {
            let value = self.get(property);
            self.set(property, value / total);
        }
    }
}

impl Default for GeneProps {
    fn default() -> Self {
        Self {
            length: 1.0,
            curvedness: 0.0,
            weight: 1.0,
            friction: 0.4,
            twist: 0.0,
            rotation: 0.0,
            muscle_power: 0.25,
            assimilation: 0.25,
            stamina: 0.25,
            ingestion: 0.25,
        }
    }
}

/// Direction of a simple modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Increase,
    Decrease,
}

/// How far one modifier moves a property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Move a fraction of the remaining distance to the range bound
    Relative { increase: f64, decrease: f64 },
    /// Add or subtract a fixed amount, clamped to the range
    Additive { amount: f64 },
}

/// Behaviour of one property under modifiers and propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRule {
    pub property: GeneProperty,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: Step,
    /// Share of the deviation from `default` a daughter cell inherits
    pub carry: f64,
}

impl PropertyRule {
    fn adjust(&self, value: f64, direction: Direction) -> f64 {
        let next = match (self.step, direction) {
            (Step::Relative { increase, .. }, Direction::Increase) => {
                value + (self.max - value) * increase
            }
            (Step::Relative { decrease, .. }, Direction::Decrease) => {
                value - (value - self.min) * decrease
            }
            (Step::Additive { amount }, Direction::Increase) => value + amount,
            (Step::Additive { amount }, Direction::Decrease) => value - amount,
        };
        next.clamp(self.min, self.max)
    }

    fn propagate(&self, value: f64) -> f64 {
        (self.default + (value - self.default) * self.carry).clamp(self.min, self.max)
    }
}

/// One entry of the simple modifier alphabet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub symbol: char,
    pub property: GeneProperty,
    pub direction: Direction,
}

/// Simple modifier alphabet plus the rules of every property it touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyModel {
    pub modifiers: Vec<Modifier>,
    pub rules: Vec<PropertyRule>,
}

impl PropertyModel {
    /// Look up a modifier by its symbol
    pub fn modifier(&self, symbol: char) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.symbol == symbol)
    }

    /// All modifier symbols in table order
    pub fn symbols(&self) -> Vec<char> {
        self.modifiers.iter().map(|m| m.symbol).collect()
    }

    pub fn rule(&self, property: GeneProperty) -> Option<&PropertyRule> {
        self.rules.iter().find(|r| r.property == property)
    }

    /// Property snapshot of a freshly created cell
    pub fn initial(&self) -> GeneProps {
        let mut props = GeneProps::default();
        for rule in &self.rules {
            props.set(rule.property, rule.default);
        }
        props.normalize_biology();
        props
    }

    /// Apply a simple modifier in place. Returns false for unknown symbols.
    pub fn apply(&self, props: &mut GeneProps, symbol: char) -> bool {
        let Some(modifier) = self.modifier(symbol) else {
            return false;
        };
        let Some(rule) = self.rule(modifier.property) else {
            return false;
        };
        let value = rule.adjust(props.get(modifier.property), modifier.direction);
        props.set(modifier.property, value);
        if modifier.property.is_biological() {
            props.normalize_biology();
        }
        true
    }

    /// Snapshot inherited by a daughter cell
    pub fn propagate(&self, props: &GeneProps) -> GeneProps {
        let mut next = props.clone();
        for rule in &self.rules {
            next.set(rule.property, rule.propagate(props.get(rule.property)));
        }
        next.normalize_biology();
        next
    }

    /// Check the table for collisions and malformed rules
    pub fn validate(&self) -> Result<(), AlphabetError> {
        let mut seen = Vec::with_capacity(self.modifiers.len());
        for modifier in &self.modifiers {
            if !modifier.symbol.is_ascii_alphabetic() {
                return Err(AlphabetError::InvalidModifier(modifier.symbol));
            }
            if is_structural(modifier.symbol) {
                return Err(AlphabetError::StructuralModifier(modifier.symbol));
            }
            if seen.contains(&modifier.symbol) {
                return Err(AlphabetError::DuplicateModifier(modifier.symbol));
            }
            seen.push(modifier.symbol);
            if self.rule(modifier.property).is_none() {
                return Err(AlphabetError::MissingRule(modifier.property));
            }
        }
        for rule in &self.rules {
            if !(rule.min <= rule.default && rule.default <= rule.max) {
                return Err(AlphabetError::InvalidRule {
                    property: rule.property,
                    message: format!(
                        "default {} outside [{}, {}]",
                        rule.default, rule.min, rule.max
                    ),
                });
            }
            if !(0.0..=1.0).contains(&rule.carry) {
                return Err(AlphabetError::InvalidRule {
                    property: rule.property,
                    message: format!("carry {} outside [0, 1]", rule.carry),
                });
            }
        }
        Ok(())
    }
}

impl Default for PropertyModel {
    fn default() -> Self {
        use Direction::{Decrease, Increase};
        use GeneProperty::*;

        let pairs = [
            ('L', 'l', Length),
            ('C', 'c', Curvedness),
            ('W', 'w', Weight),
            ('F', 'f', Friction),
            ('Q', 'q', Twist),
            ('R', 'r', Rotation),
            ('M', 'm', MusclePower),
            ('A', 'a', Assimilation),
            ('S', 's', Stamina),
            ('I', 'i', Ingestion),
        ];
        let mut modifiers = Vec::with_capacity(pairs.len() * 2);
        for (up, down, property) in pairs {
            modifiers.push(Modifier {
                symbol: up,
                property,
                direction: Increase,
            });
            modifiers.push(Modifier {
                symbol: down,
                property,
                direction: Decrease,
            });
        }

        let relative = |increase, decrease| Step::Relative { increase, decrease };
        let mut rules = vec![
            PropertyRule {
                property: Length,
                default: 1.0,
                min: 0.33,
                max: 2.0,
                step: relative(0.3, 0.3),
                carry: 0.5,
            },
            PropertyRule {
                property: Curvedness,
                default: 0.0,
                min: -2.0,
                max: 2.0,
                step: relative(0.25, 0.25),
                carry: 0.66,
            },
            PropertyRule {
                property: Weight,
                default: 1.0,
                min: 0.5,
                max: 2.0,
                step: relative(0.3, 0.3),
                carry: 0.5,
            },
            PropertyRule {
                property: Friction,
                default: 0.4,
                min: 0.0,
                max: 4.0,
                step: relative(0.2, 0.2),
                carry: 0.8,
            },
            PropertyRule {
                property: Twist,
                default: 0.0,
                min: -1.58,
                max: 1.58,
                step: relative(0.3, 0.3),
                carry: 0.66,
            },
            PropertyRule {
                property: Rotation,
                default: 0.0,
                min: -std::f64::consts::PI,
                max: std::f64::consts::PI,
                step: Step::Additive {
                    amount: std::f64::consts::FRAC_PI_4,
                },
                carry: 0.0,
            },
        ];
        for property in GeneProperty::BIOLOGICAL {
            rules.push(PropertyRule {
                property,
                default: 0.25,
                min: 0.0,
                max: 1.0,
                step: relative(0.8, 0.4),
                carry: 0.8,
            });
        }

        Self { modifiers, rules }
    }
}

/// Perturb a numeric value with Gaussian noise of standard deviation `sigma`
pub fn perturb<R: Rng + ?Sized>(value: f64, sigma: f64, rng: &mut R) -> f64 {
    match Normal::new(0.0, sigma) {
        Ok(normal) => value + normal.sample(rng),
        Err(_) => value,
    }
}

/// Sign of a neuron property token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn symbol(&self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Sign::Plus),
            '-' => Some(Sign::Minus),
            _ => None,
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        }
    }
}

/// Neuron property adjusted by `:<sign><property>:` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronProperty {
    Force,
    Inertia,
    Sigmoid,
}

impl NeuronProperty {
    pub const ALL: [NeuronProperty; 3] = [
        NeuronProperty::Force,
        NeuronProperty::Inertia,
        NeuronProperty::Sigmoid,
    ];

    pub fn symbol(&self) -> char {
        match self {
            NeuronProperty::Force => '!',
            NeuronProperty::Inertia => '=',
            NeuronProperty::Sigmoid => '/',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '!' => Some(NeuronProperty::Force),
            '=' => Some(NeuronProperty::Inertia),
            '/' => Some(NeuronProperty::Sigmoid),
            _ => None,
        }
    }
}

/// Per-neuron dynamics parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronProps {
    pub force: f64,
    pub inertia: f64,
    pub sigmoid: f64,
}

impl NeuronProps {
    pub fn apply(&mut self, property: NeuronProperty, sign: Sign) {
        match (property, sign) {
            (NeuronProperty::Force, Sign::Plus) => self.force += (1.0 - self.force) * 0.2,
            (NeuronProperty::Force, Sign::Minus) => self.force -= self.force * 0.2,
            (NeuronProperty::Inertia, Sign::Plus) => self.inertia += (1.0 - self.inertia) * 0.2,
            (NeuronProperty::Inertia, Sign::Minus) => self.inertia -= self.inertia * 0.2,
            (NeuronProperty::Sigmoid, Sign::Plus) => self.sigmoid *= 1.4,
            (NeuronProperty::Sigmoid, Sign::Minus) => self.sigmoid /= 1.4,
        }
    }
}

impl Default for NeuronProps {
    fn default() -> Self {
        Self {
            force: 0.04,
            inertia: 0.8,
            sigmoid: 2.0,
        }
    }
}
