//! Developmental genotype encoding
//!
//! This crate implements:
//! - A recursive-descent parser turning genotype text into a program tree
//! - A developmental interpreter growing cells and neural links from that tree
//! - A validator that repairs semantically invalid genotypes in bounded rounds
//! - Mutation and crossover operators that keep genotypes valid
//!
//! Every stochastic entry point takes an explicit `rand::Rng`, so a seeded
//! generator reproduces results exactly.

pub mod config;
pub mod crossover;
pub mod develop;
pub mod error;
pub mod mutation;
pub mod parser;
pub mod phenotype;
pub mod style;
pub mod tree;
pub mod validate;
mod writer;

// Re-export main types for convenience
pub use config::{AddWeights, ConfigError, MutationWeights, OperatorConfig};
pub use crossover::{CrossoverOutcome, crossover};
pub use develop::{Cell, DevFailure, LinkTarget, NeuralLink, Organism, RepairAction, grow};
pub use error::{GenoError, GenoResult, Limit};
pub use mutation::{MutationKind, Mutated, mutate, mutate_with};
pub use parser::parse;
pub use phenotype::{Phenotype, PhenotypeCell, PhenotypeLink};
pub use style::{Style, style};
pub use tree::{CellKind, GenoNode, GenoTree, LinkSource, NodeId, NodeKind};
pub use validate::{Validation, check_validity, develop, validate};

/// Hard cap on cells in one organism
pub const MAX_CELLS: usize = 100;

/// Hard cap on neural inputs of a single cell
pub const MAX_LINKS_PER_CELL: usize = 100;

/// Maximum nesting of repetitions active in one cell
pub const MAX_REPEAT_DEPTH: usize = 4;

/// Deepest nesting of first branches the parser accepts
pub const MAX_NESTING_DEPTH: usize = 256;

/// Smallest repetition count
pub const MIN_REPEAT_COUNT: u8 = 1;

/// Largest repetition count
pub const MAX_REPEAT_COUNT: u8 = 19;

/// Repair rounds `validate` attempts before giving up
pub const MAX_REPAIR_ROUNDS: usize = 20;

/// Fresh copies a mutation tries before reporting failure
pub const MAX_MUTATION_ATTEMPTS: usize = 20;

/// Random draws when looking for a node to delete
pub const DELETE_DRAWS: usize = 10;

/// Random draws when looking for a crossover subtree
pub const CROSSOVER_DRAWS: usize = 20;
