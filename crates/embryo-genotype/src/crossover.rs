//! Subtree-swapping crossover
//!
//! Each parent gives up one subtree whose size is close to a random fraction
//! of the parent's node count. The two subtrees trade places, producing one
//! offspring per parent. Offspring are not validated here.
//!
//! Failures never escape as errors: a child that cannot be produced is
//! reported as `OperationFailed` in its slot of the outcome.

use embryo_alphabet::Alphabet;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::CROSSOVER_DRAWS;
use crate::config::OperatorConfig;
use crate::error::{GenoError, GenoResult};
use crate::parser::parse;
use crate::tree::{GenoTree, NodeId};

/// Offspring produced by `crossover`; either side may carry `OperationFailed`
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverOutcome {
    /// First parent with the second parent's subtree, and its change fraction
    pub first: GenoResult<(String, f64)>,
    /// Second parent with the first parent's subtree, and its change fraction
    pub second: GenoResult<(String, f64)>,
}

/// Inclusive node-count band around `fraction` of `total`.
///
/// Both ends are truncated; the band always holds at least one size.
pub fn size_band(total: usize, fraction: f64, tolerance: f64) -> (usize, usize) {
    let target = fraction * total as f64;
    let lo = ((target * (1.0 - tolerance)) as usize).max(1);
    let hi = ((target * (1.0 + tolerance)) as usize).max(lo);
    (lo, hi)
}

/// Pick a subtree whose size falls in the band of a freshly drawn fraction
fn select_subtree<R: Rng + ?Sized>(
    tree: &GenoTree,
    config: &OperatorConfig,
    rng: &mut R,
) -> Option<(NodeId, f64)> {
    let total = tree.count();
    let nodes = tree.program_nodes();
    let sizes = tree.subtree_sizes(tree.root());
    for _ in 0..CROSSOVER_DRAWS {
        let fraction =
            rng.random_range(config.crossover_min_fraction..=config.crossover_max_fraction);
        let (lo, hi) = size_band(total, fraction, config.crossover_tolerance);
        let candidates: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&id| (lo..=hi).contains(&sizes[id.index()]))
            .collect();
        if let Some(&id) = candidates.choose(rng) {
            return Some((id, fraction));
        }
        log::debug!("No subtree of size {}..={} out of {}", lo, hi, total);
    }
    None
}

/// Offspring of `receiver` with `donor`'s subtree in place of `slot`
fn offspring(
    alphabet: &Alphabet,
    receiver: &GenoTree,
    slot: NodeId,
    donor: &GenoTree,
    donated: NodeId,
) -> (String, f64) {
    let mut child = receiver.clone();
    let copy = child.graft(donor, donated);
    child.replace_subtree(slot, copy);
    let change = donor.subtree_size(donated) as f64 / child.count() as f64;
    (child.write(alphabet), change)
}

impl CrossoverOutcome {
    fn failed(attempts: usize) -> Self {
        Self {
            first: Err(GenoError::OperationFailed { attempts }),
            second: Err(GenoError::OperationFailed { attempts }),
        }
    }
}

/// Cross two genotypes.
///
/// Each child needs a subtree from both parents, so an unusable
/// configuration, an unparsable parent or an empty size band fails both.
pub fn crossover<R: Rng + ?Sized>(
    alphabet: &Alphabet,
    config: &OperatorConfig,
    first: &str,
    second: &str,
    rng: &mut R,
) -> CrossoverOutcome {
    if let Err(e) = config.validate() {
        log::warn!("Crossover configuration is unusable: {}", e);
        return CrossoverOutcome::failed(0);
    }
    let (a, b) = match (parse(alphabet, first), parse(alphabet, second)) {
        (Ok(a), Ok(b)) => (a, b),
        (a, b) => {
            for e in [a.err(), b.err()].into_iter().flatten() {
                log::debug!("Crossover parent does not parse: {}", e);
            }
            return CrossoverOutcome::failed(0);
        }
    };

    let (Some((from_a, fraction_a)), Some((from_b, fraction_b))) = (
        select_subtree(&a, config, rng),
        select_subtree(&b, config, rng),
    ) else {
        log::warn!("Crossover found no subtree in the target size band");
        return CrossoverOutcome::failed(CROSSOVER_DRAWS);
    };

    log::debug!(
        "Crossover swaps {} nodes (fraction {:.2}) with {} nodes (fraction {:.2})",
        a.subtree_size(from_a),
        fraction_a,
        b.subtree_size(from_b),
        fraction_b
    );
    CrossoverOutcome {
        first: Ok(offspring(alphabet, &a, from_a, &b, from_b)),
        second: Ok(offspring(alphabet, &b, from_b, &a, from_a)),
    }
}
