//! Structural mutation of genotypes
//!
//! A mutation picks one of three classes by roulette (add a node, delete a
//! node, modify a node) and applies a single local edit to a copy of the
//! program tree. The copy is written back to text and validated; repairable
//! results are accepted in their repaired form. A failed attempt throws the
//! copy away and starts again from the original, up to
//! `MAX_MUTATION_ATTEMPTS` times.

use embryo_alphabet::{Alphabet, ClassFilter, NeuronProperty, Sign, perturb};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;

use crate::config::OperatorConfig;
use crate::error::{GenoError, GenoResult};
use crate::parser::parse;
use crate::tree::{CellKind, GenoTree, LinkSource, NodeId, NodeKind};
use crate::validate::validate;
use crate::{DELETE_DRAWS, MAX_MUTATION_ATTEMPTS, MAX_REPEAT_COUNT, MIN_REPEAT_COUNT};

/// Which edit a mutation performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    AddDivision,
    AddConnection,
    AddNeuronProperty,
    AddRepetition,
    AddModifier,
    Delete,
    SwapBranches,
    ModifyConnection,
    ModifyRepetition,
}

impl MutationKind {
    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::AddDivision => "add division",
            MutationKind::AddConnection => "add connection",
            MutationKind::AddNeuronProperty => "add neuron property",
            MutationKind::AddRepetition => "add repetition",
            MutationKind::AddModifier => "add modifier",
            MutationKind::Delete => "delete",
            MutationKind::SwapBranches => "swap branches",
            MutationKind::ModifyConnection => "modify connection",
            MutationKind::ModifyRepetition => "modify repetition",
        }
    }
}

/// Accepted mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Mutated {
    /// Valid genotype text
    pub text: String,
    /// Share of the genotype touched by the edit, in 0..=1
    pub change: f64,
    pub kind: MutationKind,
}

/// Mutate with the default operator configuration
pub fn mutate<R: Rng + ?Sized>(alphabet: &Alphabet, text: &str, rng: &mut R) -> GenoResult<Mutated> {
    mutate_with(alphabet, &OperatorConfig::default(), text, rng)
}

/// Mutate a genotype once.
///
/// The only error is `OperationFailed`; text that does not parse fails
/// without any attempt being made.
pub fn mutate_with<R: Rng + ?Sized>(
    alphabet: &Alphabet,
    config: &OperatorConfig,
    text: &str,
    rng: &mut R,
) -> GenoResult<Mutated> {
    let original = parse(alphabet, text).map_err(|e| {
        log::debug!("Cannot mutate {:?}: {}", text, e);
        GenoError::OperationFailed { attempts: 0 }
    })?;
    let mutator = Mutator::new(alphabet, config).ok_or_else(|| {
        log::warn!("Mutation weights are unusable: {:?}", config.mutation);
        GenoError::OperationFailed { attempts: 0 }
    })?;

    for attempt in 1..=MAX_MUTATION_ATTEMPTS {
        let mut candidate = original.clone();
        let Some((kind, change)) = mutator.apply(&mut candidate, rng) else {
            log::debug!("Mutation attempt {}: no applicable edit", attempt);
            continue;
        };

        let written = candidate.write(alphabet);
        match validate(alphabet, &written) {
            Ok(validation) => {
                log::debug!(
                    "Mutation attempt {}: {} accepted ({:?})",
                    attempt,
                    kind.name(),
                    validation
                );
                return Ok(Mutated {
                    text: validation.text(&written).to_string(),
                    change,
                    kind,
                });
            }
            Err(e) => {
                log::debug!("Mutation attempt {}: {} rejected: {}", attempt, kind.name(), e);
            }
        }
    }

    log::warn!(
        "Mutation of {:?} failed after {} attempts",
        text,
        MAX_MUTATION_ATTEMPTS
    );
    Err(GenoError::OperationFailed {
        attempts: MAX_MUTATION_ATTEMPTS,
    })
}

#[derive(Debug, Clone, Copy)]
enum MutationClass {
    Add,
    Delete,
    Modify,
}

const CLASSES: [MutationClass; 3] = [MutationClass::Add, MutationClass::Delete, MutationClass::Modify];

const ADD_KINDS: [MutationKind; 5] = [
    MutationKind::AddDivision,
    MutationKind::AddConnection,
    MutationKind::AddNeuronProperty,
    MutationKind::AddRepetition,
    MutationKind::AddModifier,
];

struct Mutator<'a> {
    alphabet: &'a Alphabet,
    config: &'a OperatorConfig,
    classes: WeightedIndex<f64>,
    adds: Option<WeightedIndex<f64>>,
}

impl<'a> Mutator<'a> {
    fn new(alphabet: &'a Alphabet, config: &'a OperatorConfig) -> Option<Self> {
        let classes = WeightedIndex::new(config.mutation.as_array()).ok()?;
        let adds = WeightedIndex::new(config.add.as_array()).ok();
        Some(Self {
            alphabet,
            config,
            classes,
            adds,
        })
    }

    /// One random edit; returns what was done and the change fraction
    fn apply<R: Rng + ?Sized>(
        &self,
        tree: &mut GenoTree,
        rng: &mut R,
    ) -> Option<(MutationKind, f64)> {
        match CLASSES[self.classes.sample(rng)] {
            MutationClass::Add => {
                let kind = ADD_KINDS[self.adds.as_ref()?.sample(rng)];
                self.add(tree, kind, rng)?;
                Some((kind, 1.0 / tree.count() as f64))
            }
            MutationClass::Delete => {
                let before = tree.count();
                let removed = delete(tree, rng)?;
                Some((MutationKind::Delete, removed as f64 / before as f64))
            }
            MutationClass::Modify => {
                let kind = self.modify(tree, rng)?;
                Some((kind, 1.0 / tree.count() as f64))
            }
        }
    }

    fn add<R: Rng + ?Sized>(&self, tree: &mut GenoTree, kind: MutationKind, rng: &mut R) -> Option<()> {
        let target = *tree.program_nodes().choose(rng)?;
        let pos = tree.node(target).pos;
        match kind {
            MutationKind::AddDivision => {
                let division = tree.insert_before(target, NodeKind::Division)?;
                let cell = if rng.random_bool(0.5) {
                    CellKind::Stick
                } else {
                    CellKind::Neuron
                };
                let branch = tree.add_node(NodeKind::Differentiate(cell), pos);
                let end = tree.add_node(NodeKind::Terminal, pos);
                tree.attach(branch, 0, end);
                tree.attach(division, 1, branch);
                if rng.random_bool(0.5) {
                    tree.swap_children(division);
                }
            }
            MutationKind::AddConnection => {
                let source = self.random_source(rng)?;
                let weight = round_weight(perturb(0.0, self.config.weight_sigma * 2.0, rng));
                tree.insert_before(target, NodeKind::Connection { source, weight })?;
            }
            MutationKind::AddNeuronProperty => {
                let sign = if rng.random_bool(0.5) {
                    Sign::Plus
                } else {
                    Sign::Minus
                };
                let property = *NeuronProperty::ALL.choose(rng)?;
                tree.insert_before(target, NodeKind::NeuronProperty { sign, property })?;
            }
            MutationKind::AddRepetition => {
                let repetition = tree.insert_before(target, NodeKind::Repetition { count: 2 })?;
                let end = tree.add_node(NodeKind::Terminal, pos);
                tree.attach(repetition, 1, end);
            }
            MutationKind::AddModifier => {
                let symbol = *self.alphabet.properties.symbols().choose(rng)?;
                tree.insert_before(target, NodeKind::Modifier(symbol))?;
            }
            _ => return None,
        }
        Some(())
    }

    fn random_source<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<LinkSource> {
        if rng.random_bool(0.5) {
            let step = self.config.offset_step.max(1);
            Some(LinkSource::Relative(rng.random_range(-step..=step)))
        } else {
            let class = self
                .alphabet
                .neurons
                .random_class(ClassFilter::sensor(), rng)?;
            Some(LinkSource::Sensor(class.name.clone()))
        }
    }

    fn modify<R: Rng + ?Sized>(&self, tree: &mut GenoTree, rng: &mut R) -> Option<MutationKind> {
        let candidates: Vec<NodeId> = tree
            .program_nodes()
            .into_iter()
            .filter(|&id| tree.node(id).kind.is_structurally_mutable())
            .collect();
        let target = *candidates.choose(rng)?;

        match tree.node(target).kind.clone() {
            NodeKind::Division => {
                tree.swap_children(target);
                Some(MutationKind::SwapBranches)
            }
            NodeKind::Repetition { count } => {
                *tree.kind_mut(target) = NodeKind::Repetition {
                    count: step_count(count, rng),
                };
                Some(MutationKind::ModifyRepetition)
            }
            NodeKind::Connection { source, weight } => {
                // 0: source only, 1: weight only, 2: both
                let what = rng.random_range(0..3);
                let source = if what != 1 {
                    self.walk_source(&source, rng)
                } else {
                    source
                };
                let weight = if what != 0 {
                    let next = perturb(weight, self.config.weight_sigma, rng);
                    if next.is_finite() {
                        round_weight(next)
                    } else {
                        weight
                    }
                } else {
                    weight
                };
                *tree.kind_mut(target) = NodeKind::Connection { source, weight };
                Some(MutationKind::ModifyConnection)
            }
            _ => None,
        }
    }

    /// Small random walk of a connection source
    fn walk_source<R: Rng + ?Sized>(&self, source: &LinkSource, rng: &mut R) -> LinkSource {
        match source {
            LinkSource::Relative(offset) => {
                let step = rng.random_range(1..=self.config.offset_step.max(1));
                let delta = if rng.random_bool(0.5) { step } else { -step };
                LinkSource::Relative(offset.saturating_add(delta))
            }
            LinkSource::Sensor(_) => self
                .random_source(rng)
                .unwrap_or_else(|| source.clone()),
        }
    }
}

/// Remove a random node that has at least one child
fn delete<R: Rng + ?Sized>(tree: &mut GenoTree, rng: &mut R) -> Option<usize> {
    let nodes = tree.program_nodes();
    for _ in 0..DELETE_DRAWS {
        let id = *nodes.choose(rng)?;
        let node = tree.node(id);
        if node.parent().is_none() || node.child_count() == 0 {
            continue;
        }
        let keep = if node.child_count() == 2 {
            rng.random_range(0..2)
        } else {
            0
        };
        return tree.remove_node(id, keep);
    }
    None
}

/// Repetition count moved by one, staying inside the legal range
fn step_count<R: Rng + ?Sized>(count: u8, rng: &mut R) -> u8 {
    let up = match count {
        c if c <= MIN_REPEAT_COUNT => true,
        c if c >= MAX_REPEAT_COUNT => false,
        _ => rng.random_bool(0.5),
    };
    let next = if up {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    };
    next.clamp(MIN_REPEAT_COUNT, MAX_REPEAT_COUNT)
}

/// Keep written weights short
fn round_weight(weight: f64) -> f64 {
    (weight * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AddWeights, MutationWeights};
    use crate::validate::check_validity;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn only(add: f64, delete: f64, modify: f64) -> OperatorConfig {
        OperatorConfig {
            mutation: MutationWeights {
                add,
                delete,
                modify,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_add_modifier_inserts_one_node() {
        let alphabet = Alphabet::default();
        let config = OperatorConfig {
            add: AddWeights::modifier_only(),
            ..only(1.0, 0.0, 0.0)
        };
        for seed in 0..20 {
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            let mutated = mutate_with(&alphabet, &config, "X>", &mut rng).unwrap();
            assert_eq!(mutated.kind, MutationKind::AddModifier);
            assert_eq!(mutated.text.len(), 3);
            assert!((mutated.change - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mutations_stay_valid() {
        let alphabet = Alphabet::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let mut text = "<X>N[G:1]>".to_string();
        for _ in 0..100 {
            match mutate(&alphabet, &text, &mut rng) {
                Ok(mutated) => {
                    assert_eq!(check_validity(&alphabet, &mutated.text), Ok(()));
                    assert!(mutated.change > 0.0 && mutated.change <= 1.0);
                    text = mutated.text;
                }
                Err(e) => assert!(matches!(e, GenoError::OperationFailed { .. })),
            }
        }
    }

    #[test]
    fn test_delete_fraction() {
        let alphabet = Alphabet::default();
        let config = only(0.0, 1.0, 0.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        // only L and X have a child; either removal leaves a valid genotype
        let mutated = mutate_with(&alphabet, &config, "LLX>", &mut rng).unwrap();
        assert_eq!(mutated.kind, MutationKind::Delete);
        assert!((mutated.change - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_delete_of_only_differentiation_is_repaired() {
        let alphabet = Alphabet::default();
        let config = only(0.0, 1.0, 0.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        // removing X leaves an undifferentiated terminal, which repair restores
        let result = mutate_with(&alphabet, &config, "X>", &mut rng).unwrap();
        assert_eq!(result.text, "X>");
    }

    #[test]
    fn test_modify_without_mutable_nodes_fails() {
        let alphabet = Alphabet::default();
        let config = only(0.0, 0.0, 1.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        assert_eq!(
            mutate_with(&alphabet, &config, "LX>", &mut rng),
            Err(GenoError::OperationFailed {
                attempts: MAX_MUTATION_ATTEMPTS
            })
        );
    }

    #[test]
    fn test_modify_repetition_stays_in_range() {
        let alphabet = Alphabet::default();
        let config = only(0.0, 0.0, 1.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        let mut text = "#19X>>".to_string();
        for _ in 0..60 {
            let mutated = mutate_with(&alphabet, &config, &text, &mut rng).unwrap();
            assert_eq!(mutated.kind, MutationKind::ModifyRepetition);
            let tree = parse(&alphabet, &mutated.text).unwrap();
            let rep = tree.program().unwrap();
            let NodeKind::Repetition { count } = tree.node(rep).kind else {
                panic!("expected a repetition");
            };
            assert!((MIN_REPEAT_COUNT..=MAX_REPEAT_COUNT).contains(&count));
            text = mutated.text;
        }
    }

    #[test]
    fn test_step_count_bounds() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(step_count(MIN_REPEAT_COUNT, &mut rng), 2);
            assert_eq!(step_count(MAX_REPEAT_COUNT, &mut rng), 18);
            let next = step_count(10, &mut rng);
            assert!(next == 9 || next == 11);
        }
    }

    #[test]
    fn test_swap_branches() {
        let alphabet = Alphabet::default();
        let config = only(0.0, 0.0, 1.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let mutated = mutate_with(&alphabet, &config, "<X>LN>", &mut rng).unwrap();
        assert_eq!(mutated.kind, MutationKind::SwapBranches);
        assert_eq!(mutated.text, "<LN>X>");
    }

    #[test]
    fn test_mutation_is_deterministic() {
        let alphabet = Alphabet::default();
        let run = |seed| {
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            let mut text = "<N[G:0.5]>X>".to_string();
            let mut history = Vec::new();
            for _ in 0..20 {
                if let Ok(mutated) = mutate(&alphabet, &text, &mut rng) {
                    text = mutated.text.clone();
                    history.push(mutated);
                }
            }
            history
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_unparsable_input_fails_without_attempts() {
        let alphabet = Alphabet::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        for text in ["<X>", "", "X>>", "#20X>>", "X"] {
            assert_eq!(
                mutate(&alphabet, text, &mut rng),
                Err(GenoError::OperationFailed { attempts: 0 }),
                "{}",
                text
            );
        }
    }
}
