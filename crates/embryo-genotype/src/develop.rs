//! Developmental interpreter
//!
//! Cells walk the program tree one node per step. Development runs in global
//! passes: each pass steps every cell that was active when the pass began,
//! until every cell has reached its final terminal. A division spawns a new
//! cell that starts stepping in the next pass.
//!
//! Semantic failures carry the offending node's source offset and, where one
//! exists, a single structural edit (`RepairAction`) that the validator can
//! apply before trying again.

use embryo_alphabet::{Alphabet, DEFAULT_NEURON_CLASS, GeneProps, NeuronProps};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{GenoError, Limit};
use crate::tree::{CellKind, GenoTree, LinkSource, NodeId, NodeKind};
use crate::{MAX_CELLS, MAX_LINKS_PER_CELL, MAX_REPEAT_DEPTH};

/// Where a neural input comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// Output of another cell, by creation index
    Cell(usize),
    /// Sensor class feeding the neuron directly
    Sensor(String),
}

/// Resolved neural input of a neuron cell
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralLink {
    pub source: LinkTarget,
    pub weight: f64,
    /// Connection node that created the link
    pub node: NodeId,
}

/// Single structural edit proposed for a semantic error
#[derive(Debug, Clone, PartialEq)]
pub enum RepairAction {
    /// Remove `node`, keeping its `keep` child in its place
    Remove { node: NodeId, keep: usize },
    /// Insert a new node of `kind` in front of `node`
    InsertBefore { node: NodeId, kind: NodeKind },
}

impl RepairAction {
    /// Apply the edit to `tree`; false if the node is no longer attached
    pub fn apply(&self, tree: &mut GenoTree) -> bool {
        match self {
            RepairAction::Remove { node, keep } => tree.remove_node(*node, *keep).is_some(),
            RepairAction::InsertBefore { node, kind } => {
                tree.insert_before(*node, kind.clone()).is_some()
            }
        }
    }
}

/// Development stopped early: the error and an optional staged repair
#[derive(Debug, Clone, PartialEq)]
pub struct DevFailure {
    pub error: GenoError,
    pub repair: Option<RepairAction>,
}

impl DevFailure {
    fn fatal(error: GenoError) -> Self {
        Self {
            error,
            repair: None,
        }
    }

    fn repairable(error: GenoError, repair: RepairAction) -> Self {
        Self {
            error,
            repair: Some(repair),
        }
    }

    fn remove(offset: usize, node: NodeId, message: impl Into<String>) -> Self {
        Self::repairable(
            GenoError::semantic(offset, message),
            RepairAction::Remove { node, keep: 0 },
        )
    }

    fn insert(offset: usize, node: NodeId, kind: CellKind, message: impl Into<String>) -> Self {
        Self::repairable(
            GenoError::semantic(offset, message),
            RepairAction::InsertBefore {
                node,
                kind: NodeKind::Differentiate(kind),
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RepeatFrame {
    node: NodeId,
    remaining: u8,
}

/// One developmental cell
#[derive(Debug, Clone)]
pub struct Cell {
    /// Creation index inside the organism
    pub index: usize,
    /// Cell that spawned this one by division
    pub parent: Option<usize>,
    /// `None` until the cell differentiates
    pub kind: Option<CellKind>,
    /// Explicit neuron class; neurons without one use `DEFAULT_NEURON_CLASS`
    pub class: Option<String>,
    pub props: GeneProps,
    pub neuron: NeuronProps,
    pub inputs: Vec<NeuralLink>,
    /// Number of divisions this cell performed
    pub branch_count: u32,
    /// Branch slot given by the parent at division
    pub angle_slot: u32,
    /// Smallest and largest genotype offsets interpreted by this cell
    pub provenance: (usize, usize),
    cursor: Option<NodeId>,
    active: bool,
    repeats: SmallVec<[RepeatFrame; MAX_REPEAT_DEPTH]>,
}

impl Cell {
    fn embryo(cursor: NodeId, props: GeneProps, offset: usize) -> Self {
        Self {
            index: 0,
            parent: None,
            kind: None,
            class: None,
            props,
            neuron: NeuronProps::default(),
            inputs: Vec::new(),
            branch_count: 0,
            angle_slot: 0,
            provenance: (offset, offset),
            cursor: Some(cursor),
            active: true,
            repeats: SmallVec::new(),
        }
    }

    /// Neuron class name, falling back to the default class for neurons
    pub fn class_name(&self) -> Option<&str> {
        match self.kind {
            Some(CellKind::Neuron) => Some(self.class.as_deref().unwrap_or(DEFAULT_NEURON_CLASS)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn touch(&mut self, offset: usize) {
        self.provenance.0 = self.provenance.0.min(offset);
        self.provenance.1 = self.provenance.1.max(offset);
    }
}

/// Fully developed set of cells
#[derive(Debug, Clone)]
pub struct Organism {
    cells: Vec<Cell>,
}

impl Organism {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn link_count(&self) -> usize {
        self.cells.iter().map(|c| c.inputs.len()).sum()
    }
}

enum Step {
    Advanced,
    Waiting(NodeId),
}

/// Grow an organism from a program tree
pub fn grow(tree: &GenoTree, alphabet: &Alphabet) -> Result<Organism, DevFailure> {
    let program = tree
        .program()
        .ok_or_else(|| DevFailure::fatal(GenoError::semantic(0, "genotype has no program")))?;
    let mut development = Development {
        tree,
        alphabet,
        cells: vec![Cell::embryo(
            program,
            alphabet.properties.initial(),
            tree.node(program).pos,
        )],
    };
    development.run()?;
    development.check_links()?;
    Ok(Organism {
        cells: development.cells,
    })
}

struct Development<'a> {
    tree: &'a GenoTree,
    alphabet: &'a Alphabet,
    cells: Vec<Cell>,
}

impl<'a> Development<'a> {
    fn run(&mut self) -> Result<(), DevFailure> {
        let mut passes = 0usize;
        loop {
            let active: Vec<usize> = self
                .cells
                .iter()
                .filter(|c| c.active)
                .map(|c| c.index)
                .collect();
            if active.is_empty() {
                log::trace!("Development finished after {} passes", passes);
                return Ok(());
            }
            passes += 1;

            let mut advanced = false;
            let mut first_waiting = None;
            for idx in active {
                match self.step(idx)? {
                    Step::Advanced => advanced = true,
                    Step::Waiting(node) => {
                        first_waiting.get_or_insert(node);
                    }
                }
            }

            if !advanced && let Some(node) = first_waiting {
                return Err(DevFailure::remove(
                    self.tree.node(node).pos,
                    node,
                    "connections wait on each other and can never resolve",
                ));
            }
        }
    }

    /// Child `slot` of `node`, or a fatal error for a malformed tree
    fn next(&self, node: NodeId, slot: usize) -> Result<NodeId, DevFailure> {
        self.tree.node(node).child(slot).ok_or_else(|| {
            DevFailure::fatal(GenoError::semantic(
                self.tree.node(node).pos,
                "node is missing a child",
            ))
        })
    }

    fn advance(&mut self, idx: usize, node: NodeId, slot: usize) -> Result<Step, DevFailure> {
        let next = self.next(node, slot)?;
        let cell = &mut self.cells[idx];
        cell.touch(self.tree.node(node).pos);
        cell.cursor = Some(next);
        Ok(Step::Advanced)
    }

    /// Tokens that only make sense on a neuron
    fn require_neuron(&self, idx: usize, node: NodeId, what: &str) -> Result<(), DevFailure> {
        let offset = self.tree.node(node).pos;
        match self.cells[idx].kind {
            Some(CellKind::Neuron) => Ok(()),
            None => Err(DevFailure::insert(
                offset,
                node,
                CellKind::Neuron,
                format!("{} on a cell that is not a neuron yet", what),
            )),
            Some(CellKind::Stick) => {
                Err(DevFailure::remove(offset, node, format!("{} on a stick", what)))
            }
        }
    }

    fn step(&mut self, idx: usize) -> Result<Step, DevFailure> {
        let Some(node) = self.cells[idx].cursor else {
            self.cells[idx].active = false;
            return Ok(Step::Advanced);
        };
        let tree = self.tree;
        let offset = tree.node(node).pos;

        match &tree.node(node).kind {
            NodeKind::Root => self.advance(idx, node, 0),
            NodeKind::Terminal => self.terminal(idx, node),
            NodeKind::Division => self.divide(idx, node),
            NodeKind::Repetition { count } => {
                let cell = &mut self.cells[idx];
                if cell.repeats.len() >= MAX_REPEAT_DEPTH {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("repetitions nested deeper than {}", MAX_REPEAT_DEPTH),
                    ));
                }
                cell.repeats.push(RepeatFrame {
                    node,
                    remaining: *count,
                });
                self.advance(idx, node, 0)
            }
            NodeKind::Modifier(symbol) => {
                let cell = &mut self.cells[idx];
                if !self.alphabet.properties.apply(&mut cell.props, *symbol) {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("'{}' is not a modifier", symbol),
                    ));
                }
                self.advance(idx, node, 0)
            }
            NodeKind::Differentiate(kind) => {
                let cell = &mut self.cells[idx];
                match cell.kind {
                    None => cell.kind = Some(*kind),
                    Some(current) if current == *kind => {}
                    Some(current) => {
                        return Err(DevFailure::remove(
                            offset,
                            node,
                            format!(
                                "cell already differentiated as '{}'",
                                current.symbol()
                            ),
                        ));
                    }
                }
                self.advance(idx, node, 0)
            }
            NodeKind::NeuronProperty { sign, property } => {
                self.require_neuron(idx, node, "neuron property")?;
                self.cells[idx].neuron.apply(*property, *sign);
                self.advance(idx, node, 0)
            }
            NodeKind::ClassName(name) => {
                self.require_neuron(idx, node, "neuron class")?;
                if self.alphabet.neurons.find(name).is_none() {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("unknown neuron class '{}'", name),
                    ));
                }
                let cell = &mut self.cells[idx];
                if let Some(existing) = &cell.class {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("neuron class already set to '{}'", existing),
                    ));
                }
                cell.class = Some(name.clone());
                self.advance(idx, node, 0)
            }
            NodeKind::Connection { source, weight } => self.connect(idx, node, source, *weight),
        }
    }

    fn terminal(&mut self, idx: usize, node: NodeId) -> Result<Step, DevFailure> {
        let tree = self.tree;
        let offset = tree.node(node).pos;
        let cell = &mut self.cells[idx];
        cell.touch(offset);

        if let Some(frame) = cell.repeats.last_mut() {
            frame.remaining = frame.remaining.saturating_sub(1);
            let repeat = frame.node;
            let slot = if frame.remaining > 0 {
                0
            } else {
                cell.repeats.pop();
                1
            };
            let next = self.next(repeat, slot)?;
            self.cells[idx].cursor = Some(next);
            return Ok(Step::Advanced);
        }

        if cell.kind.is_none() {
            return Err(DevFailure::insert(
                offset,
                node,
                CellKind::Stick,
                "branch ends before the cell differentiates",
            ));
        }
        cell.cursor = None;
        cell.active = false;
        Ok(Step::Advanced)
    }

    fn divide(&mut self, idx: usize, node: NodeId) -> Result<Step, DevFailure> {
        let offset = self.tree.node(node).pos;
        if self.cells[idx].kind == Some(CellKind::Stick) {
            return Err(DevFailure::remove(offset, node, "a stick cannot divide"));
        }
        if self.cells.len() >= MAX_CELLS {
            return Err(DevFailure::fatal(GenoError::ResourceExhausted {
                offset,
                limit: Limit::Cells,
            }));
        }
        let first = self.next(node, 0)?;
        let second = self.next(node, 1)?;
        let second_offset = self.tree.node(second).pos;

        let index = self.cells.len();
        let props = self.alphabet.properties.propagate(&self.cells[idx].props);
        let cell = &mut self.cells[idx];
        cell.props = props.clone();
        cell.branch_count += 1;
        cell.touch(offset);
        cell.cursor = Some(first);

        let daughter = Cell {
            index,
            parent: Some(idx),
            kind: cell.kind,
            class: cell.class.clone(),
            props,
            neuron: cell.neuron.clone(),
            inputs: Vec::new(),
            branch_count: 0,
            angle_slot: cell.branch_count,
            provenance: (second_offset, second_offset),
            cursor: Some(second),
            active: true,
            repeats: cell.repeats.clone(),
        };
        self.cells.push(daughter);
        Ok(Step::Advanced)
    }

    fn connect(
        &mut self,
        idx: usize,
        node: NodeId,
        source: &LinkSource,
        weight: f64,
    ) -> Result<Step, DevFailure> {
        let offset = self.tree.node(node).pos;
        self.require_neuron(idx, node, "connection")?;
        if self.cells[idx].inputs.len() >= MAX_LINKS_PER_CELL {
            return Err(DevFailure::fatal(GenoError::ResourceExhausted {
                offset,
                limit: Limit::LinksPerCell,
            }));
        }

        let target = match source {
            LinkSource::Sensor(name) => match self.alphabet.neurons.find(name) {
                Some(class) if class.is_sensor() => LinkTarget::Sensor(name.clone()),
                Some(_) => {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("'{}' is not a sensor", name),
                    ));
                }
                None => {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("unknown sensor '{}'", name),
                    ));
                }
            },
            LinkSource::Relative(delta) => {
                let target = idx as i64 + i64::from(*delta);
                if target < 0 || target >= self.cells.len() as i64 {
                    return Err(DevFailure::remove(
                        offset,
                        node,
                        format!("connection offset {} points outside the organism", delta),
                    ));
                }
                let target = target as usize;
                match self.cells[target].kind {
                    None => return Ok(Step::Waiting(node)),
                    Some(CellKind::Stick) => {
                        return Err(DevFailure::remove(
                            offset,
                            node,
                            "connection source is a stick",
                        ));
                    }
                    Some(CellKind::Neuron) => LinkTarget::Cell(target),
                }
            }
        };

        self.cells[idx].inputs.push(NeuralLink {
            source: target,
            weight,
            node,
        });
        self.advance(idx, node, 0)
    }

    /// Final check of every link against the neuron classes it joins
    fn check_links(&self) -> Result<(), DevFailure> {
        let registry = &self.alphabet.neurons;
        for cell in &self.cells {
            let Some(first) = cell.inputs.first() else {
                continue;
            };
            let class = cell.class_name().unwrap_or(DEFAULT_NEURON_CLASS);
            if !registry.find(class).is_some_and(|c| c.accepts_inputs) {
                return Err(DevFailure::remove(
                    self.tree.node(first.node).pos,
                    first.node,
                    format!("neuron class '{}' takes no inputs", class),
                ));
            }
            for link in &cell.inputs {
                if let LinkTarget::Cell(source) = link.source {
                    let source_class = self.cells[source]
                        .class_name()
                        .unwrap_or(DEFAULT_NEURON_CLASS);
                    if !registry.find(source_class).is_some_and(|c| c.has_output) {
                        return Err(DevFailure::remove(
                            self.tree.node(link.node).pos,
                            link.node,
                            format!("neuron class '{}' has no output", source_class),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn grow_text(text: &str) -> Result<Organism, DevFailure> {
        let alphabet = Alphabet::default();
        let tree = parse(&alphabet, text).unwrap();
        grow(&tree, &alphabet)
    }

    fn error_of(text: &str) -> GenoError {
        grow_text(text).unwrap_err().error
    }

    #[test]
    fn test_single_stick() {
        let organism = grow_text("X>").unwrap();
        assert_eq!(organism.cell_count(), 1);
        let cell = &organism.cells()[0];
        assert_eq!(cell.kind, Some(CellKind::Stick));
        assert_eq!(cell.parent, None);
        assert!(cell.inputs.is_empty());
        assert!(!cell.is_active());
        assert_eq!(cell.provenance, (0, 1));
    }

    #[test]
    fn test_division_spawns_daughter() {
        let organism = grow_text("<X>N>").unwrap();
        assert_eq!(organism.cell_count(), 2);
        let (mother, daughter) = (&organism.cells()[0], &organism.cells()[1]);
        assert_eq!(mother.kind, Some(CellKind::Stick));
        assert_eq!(daughter.kind, Some(CellKind::Neuron));
        assert_eq!(daughter.parent, Some(0));
        assert_eq!(mother.branch_count, 1);
        assert_eq!(daughter.angle_slot, 1);
    }

    #[test]
    fn test_stick_cannot_divide() {
        let failure = grow_text("X<X>X>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
        assert!(matches!(
            failure.repair,
            Some(RepairAction::Remove { keep: 0, .. })
        ));
    }

    #[test]
    fn test_undifferentiated_terminal() {
        let failure = grow_text("L>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
        assert!(matches!(
            failure.repair,
            Some(RepairAction::InsertBefore {
                kind: NodeKind::Differentiate(CellKind::Stick),
                ..
            })
        ));
    }

    #[test]
    fn test_modifiers_change_properties() {
        let plain = grow_text("X>").unwrap();
        let long = grow_text("LLX>").unwrap();
        assert!(long.cells()[0].props.length > plain.cells()[0].props.length);

        let strong = grow_text("MX>").unwrap();
        let props = &strong.cells()[0].props;
        assert!(props.muscle_power > 0.25);
        assert!((props.biological_total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_repetition_repeats_fragment() {
        let once = grow_text("LX>").unwrap();
        let thrice = grow_text("#3LX>>").unwrap();
        assert!(thrice.cells()[0].props.length > once.cells()[0].props.length);
        assert_eq!(thrice.cell_count(), 1);
    }

    #[test]
    fn test_repetition_of_division_multiplies_cells() {
        // daughters inherit the pending repetition, so each round doubles the cells
        let organism = grow_text("N#3<>N>>").unwrap();
        assert_eq!(organism.cell_count(), 8);
        assert!(organism.cells().iter().all(|c| c.kind == Some(CellKind::Neuron)));
    }

    #[test]
    fn test_repetition_depth_limit() {
        assert!(grow_text("#2#2#2#2X>>>>X>").is_ok());
        let failure = grow_text("#2#2#2#2#2X>>>>>X>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 8, .. }));
    }

    #[test]
    fn test_neuron_tokens_on_undifferentiated_cell() {
        let failure = grow_text("[G]X>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 0, .. }));
        assert!(matches!(
            failure.repair,
            Some(RepairAction::InsertBefore {
                kind: NodeKind::Differentiate(CellKind::Neuron),
                ..
            })
        ));
    }

    #[test]
    fn test_neuron_tokens_on_stick() {
        let failure = grow_text("X:+!:>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
        assert!(matches!(failure.repair, Some(RepairAction::Remove { .. })));
    }

    #[test]
    fn test_redifferentiation() {
        assert!(grow_text("XX>").is_ok());
        let failure = grow_text("XN>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
    }

    #[test]
    fn test_sensor_connection() {
        let organism = grow_text("N[G:2]>").unwrap();
        let cell = &organism.cells()[0];
        assert_eq!(cell.inputs.len(), 1);
        assert_eq!(cell.inputs[0].source, LinkTarget::Sensor("G".to_string()));
        assert_eq!(cell.inputs[0].weight, 2.0);
    }

    #[test]
    fn test_connection_to_non_sensor_class() {
        let failure = grow_text("N[Thr]>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
    }

    #[test]
    fn test_relative_connection_forward_reference() {
        // cell 0 reaches its link before cell 1 has differentiated
        let organism = grow_text("<N[1:0.5]>LLN>").unwrap();
        let mother = &organism.cells()[0];
        assert_eq!(mother.inputs.len(), 1);
        assert_eq!(mother.inputs[0].source, LinkTarget::Cell(1));
    }

    #[test]
    fn test_relative_connection_out_of_range() {
        let failure = grow_text("N[5]>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 1, .. }));
    }

    #[test]
    fn test_relative_connection_to_stick() {
        let failure = grow_text("<N[1]>X>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 2, .. }));
    }

    #[test]
    fn test_class_assignment() {
        let organism = grow_text("N|[G]>").unwrap();
        assert_eq!(organism.cells()[0].class_name(), Some("|"));
        let failure = grow_text("N|@>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 2, .. }));
    }

    #[test]
    fn test_links_checked_against_classes() {
        // a sensor class takes no inputs
        let failure = grow_text("NG[T]>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 2, .. }));

        // a muscle has no output to feed another neuron
        let failure = grow_text("<N|>N[-1]>").unwrap_err();
        assert!(matches!(failure.error, GenoError::Semantic { offset: 5, .. }));
    }

    #[test]
    fn test_cell_cap() {
        let failure = grow_text("N#19<>N>>").unwrap_err();
        assert!(matches!(
            failure.error,
            GenoError::ResourceExhausted {
                limit: Limit::Cells,
                ..
            }
        ));
        assert!(failure.repair.is_none());
    }

    #[test]
    fn test_link_cap() {
        let failure = grow_text("N#19#19[G]>>X>").unwrap_err();
        assert!(matches!(
            failure.error,
            GenoError::ResourceExhausted {
                limit: Limit::LinksPerCell,
                ..
            }
        ));
    }

    #[test]
    fn test_repair_action_apply() {
        let alphabet = Alphabet::default();
        let mut tree = parse(&alphabet, "L>").unwrap();
        let failure = grow(&tree, &alphabet).unwrap_err();
        assert!(failure.repair.unwrap().apply(&mut tree));
        assert_eq!(tree.write(&alphabet), "LX>");
    }
}
