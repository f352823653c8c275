//! Validation and bounded repair
//!
//! `check_validity` parses and develops without touching the genotype.
//! `validate` additionally applies the repair staged by a semantic failure,
//! writes the tree back to text and starts over, for at most
//! `MAX_REPAIR_ROUNDS` edits. Syntax errors and exhausted caps are never
//! repaired.

use embryo_alphabet::Alphabet;

use crate::MAX_REPAIR_ROUNDS;
use crate::develop::grow;
use crate::error::{GenoError, GenoResult};
use crate::parser::parse;
use crate::phenotype::Phenotype;

/// Successful outcome of `validate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Genotype develops as written
    Valid,
    /// Genotype needed repairs; this is the repaired text
    Repaired(String),
}

impl Validation {
    /// Text that is known to develop: the repaired one or `original`
    pub fn text<'a>(&'a self, original: &'a str) -> &'a str {
        match self {
            Validation::Valid => original,
            Validation::Repaired(text) => text,
        }
    }
}

/// Parse and fully develop a genotype, reporting the first error
pub fn check_validity(alphabet: &Alphabet, text: &str) -> GenoResult<()> {
    let tree = parse(alphabet, text)?;
    grow(&tree, alphabet).map(|_| ()).map_err(|failure| failure.error)
}

/// Develop a genotype into its exported phenotype
pub fn develop(alphabet: &Alphabet, text: &str) -> GenoResult<Phenotype> {
    let tree = parse(alphabet, text)?;
    let organism = grow(&tree, alphabet).map_err(|failure| failure.error)?;
    Ok(Phenotype::from_organism(&organism))
}

/// Validate a genotype, repairing semantic errors when possible.
///
/// On failure the error of the first round is returned, whatever later
/// rounds ran into.
pub fn validate(alphabet: &Alphabet, text: &str) -> GenoResult<Validation> {
    let mut tree = parse(alphabet, text)?;
    let mut first_error: Option<GenoError> = None;

    for round in 0..=MAX_REPAIR_ROUNDS {
        let failure = match grow(&tree, alphabet) {
            Ok(_) if round == 0 => return Ok(Validation::Valid),
            Ok(_) => return Ok(Validation::Repaired(tree.write(alphabet))),
            Err(failure) => failure,
        };
        let original = first_error.get_or_insert_with(|| failure.error.clone()).clone();

        if round == MAX_REPAIR_ROUNDS || !matches!(failure.error, GenoError::Semantic { .. }) {
            return Err(original);
        }
        let Some(repair) = failure.repair else {
            return Err(original);
        };
        log::debug!("Repair round {}: {} -> {:?}", round + 1, failure.error, repair);
        if !repair.apply(&mut tree) {
            return Err(original);
        }

        let repaired = tree.write(alphabet);
        tree = match parse(alphabet, &repaired) {
            Ok(tree) => tree,
            Err(e) => {
                log::debug!("Repaired genotype {:?} no longer parses: {}", repaired, e);
                return Err(original);
            }
        };
    }

    Err(first_error.unwrap_or_else(|| GenoError::semantic(0, "repair did not converge")))
}
